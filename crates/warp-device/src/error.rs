//! Error types for device operations

/// Result type for device operations
pub type Result<T> = std::result::Result<T, Error>;

/// Device operation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Device queue initialization failed
    #[error("Failed to initialize device queue {device}: {message}")]
    DeviceInit {
        /// Device name
        device: String,
        /// Error message
        message: String,
    },

    /// Device memory allocation failed
    #[error("Out of device memory on {device}: {requested} bytes requested, {available} bytes available")]
    OutOfDeviceMemory {
        /// Device name
        device: String,
        /// Requested size
        requested: usize,
        /// Remaining capacity
        available: usize,
    },

    /// An asynchronous copy or kernel failed on the device
    #[error("Device execution failed on {device} during {operation}: {message}")]
    DeviceExecution {
        /// Device name
        device: String,
        /// Operation label (copy-in, kernel name, copy-out, ...)
        operation: String,
        /// Error message
        message: String,
    },

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The queue worker is gone and can no longer accept work
    #[error("Device queue {0} is closed")]
    QueueClosed(String),
}

impl Error {
    /// Create an out-of-memory error
    #[inline]
    pub fn out_of_memory(device: impl Into<String>, requested: usize, available: usize) -> Self {
        Self::OutOfDeviceMemory {
            device: device.into(),
            requested,
            available,
        }
    }

    /// Check if error is recoverable by retrying with a smaller request
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfDeviceMemory { .. })
    }

    /// Check if error was raised asynchronously by the device
    pub fn is_device_execution(&self) -> bool {
        matches!(self, Self::DeviceExecution { .. })
    }
}

/// Failure recorded on an event by the device worker
///
/// Carried by failed events and turned into [`Error::DeviceExecution`] when
/// the event is joined with `wait_and_throw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFault {
    /// Device that reported the failure
    pub device: String,
    /// Operation that failed
    pub operation: String,
    /// Failure description
    pub message: String,
}

impl DeviceFault {
    /// Create a new fault
    pub fn new(
        device: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<DeviceFault> for Error {
    fn from(fault: DeviceFault) -> Self {
        Error::DeviceExecution {
            device: fault.device,
            operation: fault.operation,
            message: fault.message,
        }
    }
}
