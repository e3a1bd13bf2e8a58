//! Error types for batched digest operations

use thiserror::Error;

/// Result type for digest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Digest engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid algorithm, key or runner configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Runner configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Runner configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device error (allocation, execution, queue setup)
    #[error(transparent)]
    Device(#[from] warp_device::Error),
}

impl Error {
    /// Create an invalid configuration error
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Check if a device ran out of memory while dispatching
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            Self::Device(warp_device::Error::OutOfDeviceMemory { .. })
        )
    }

    /// Check if a queued copy or kernel failed on a device
    pub fn is_device_execution(&self) -> bool {
        matches!(self, Self::Device(e) if e.is_device_execution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid("sha3 width 100");
        assert_eq!(err.to_string(), "Invalid configuration: sha3 width 100");

        let err: Error = warp_device::Error::out_of_memory("gpu0", 64, 32).into();
        assert!(err.to_string().contains("gpu0"));
    }

    #[test]
    fn test_error_classification() {
        let oom: Error = warp_device::Error::out_of_memory("gpu0", 64, 32).into();
        assert!(oom.is_out_of_memory());
        assert!(!oom.is_device_execution());

        let fault = warp_device::DeviceFault::new("gpu0", "kernel:md5", "fault");
        let exec: Error = warp_device::Error::from(fault).into();
        assert!(exec.is_device_execution());
        assert!(!Error::invalid("x").is_out_of_memory());
    }
}
