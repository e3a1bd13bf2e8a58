//! In-order device queues
//!
//! A [`Queue`] owns one worker thread that executes submitted operations in
//! submission order. Submission never blocks: every operation returns an
//! [`Event`] immediately, and operations wait on their explicit dependency
//! events (possibly from other queues) before running.

use crate::buffer::HostBuffer;
use crate::error::{DeviceFault, Error, Result};
use crate::event::{join_all, Event};
use crate::memory::{DeviceMemory, MemoryKind, MemoryLedger, MemoryStats};
use bytes::Bytes;
use crossbeam_channel::{self as channel, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, trace};

/// Device type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Host CPU
    #[default]
    Cpu,
    /// Discrete or integrated GPU
    Gpu,
    /// Other accelerator (FPGA, DPU, ...)
    Accelerator,
}

impl DeviceType {
    /// Check if this is an offload device (not the host CPU)
    #[must_use]
    pub fn is_offload(&self) -> bool {
        !matches!(self, DeviceType::Cpu)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => write!(f, "CPU"),
            DeviceType::Gpu => write!(f, "GPU"),
            DeviceType::Accelerator => write!(f, "Accelerator"),
        }
    }
}

/// Device information reported by a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Device type
    pub device_type: DeviceType,
    /// Memory capacity in bytes, `None` if unbounded
    pub memory_capacity: Option<usize>,
}

/// Queue construction options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Device name, used in logs and errors
    pub name: String,
    /// Device type
    pub device_type: DeviceType,
    /// Limit on live device memory in bytes
    pub memory_capacity: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "cpu0".to_string(),
            device_type: DeviceType::Cpu,
            memory_capacity: None,
        }
    }
}

impl QueueConfig {
    /// Create a configuration for the named device
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the device type
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Limit live device memory
    pub fn with_memory_capacity(mut self, bytes: usize) -> Self {
        self.memory_capacity = Some(bytes);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::DeviceInit {
                device: self.name.clone(),
                message: "device name must not be empty".to_string(),
            });
        }
        if self.memory_capacity == Some(0) {
            return Err(Error::DeviceInit {
                device: self.name.clone(),
                message: "memory_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

type Work = Box<dyn FnOnce() -> std::result::Result<(), String> + Send + 'static>;

struct Job {
    label: String,
    deps: Vec<Event>,
    event: Event,
    work: Work,
}

enum QueueMsg {
    Job(Job),
    Shutdown,
}

struct QueueInner {
    info: DeviceInfo,
    ledger: Arc<MemoryLedger>,
    tx: Sender<QueueMsg>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let _ = self.tx.send(QueueMsg::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            if thread::current().id() != self.worker_id {
                let _ = handle.join();
            }
        }
        debug!(device = %self.info.name, "device queue closed");
    }
}

/// In-order queue bound to one device
///
/// Cloning yields another handle to the same queue and worker.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl Queue {
    /// Create a queue and start its worker
    ///
    /// # Errors
    /// Returns [`Error::DeviceInit`] if the configuration is invalid or the
    /// worker thread cannot be started.
    pub fn new(config: QueueConfig) -> Result<Self> {
        config.validate()?;

        let (tx, rx) = channel::unbounded();
        let device = config.name.clone();
        let worker = thread::Builder::new()
            .name(format!("warp-device-{}", config.name))
            .spawn(move || worker_loop(device, rx))
            .map_err(|e| Error::DeviceInit {
                device: config.name.clone(),
                message: format!("failed to spawn queue worker: {}", e),
            })?;
        let worker_id = worker.thread().id();

        debug!(
            device = %config.name,
            device_type = %config.device_type,
            memory_capacity = ?config.memory_capacity,
            "device queue created"
        );

        Ok(Self {
            inner: Arc::new(QueueInner {
                ledger: Arc::new(MemoryLedger::new(&config.name, config.memory_capacity)),
                info: DeviceInfo {
                    name: config.name,
                    device_type: config.device_type,
                    memory_capacity: config.memory_capacity,
                },
                tx,
                worker: Mutex::new(Some(worker)),
                worker_id,
            }),
        })
    }

    /// Create an unbounded CPU queue
    pub fn cpu(name: impl Into<String>) -> Result<Self> {
        Self::new(QueueConfig::new(name))
    }

    /// Device information
    pub fn info(&self) -> &DeviceInfo {
        &self.inner.info
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.inner.info.name
    }

    /// Allocate `len` bytes of `kind` memory on this device
    ///
    /// # Errors
    /// Returns [`Error::OutOfDeviceMemory`] if the capacity limit would be
    /// exceeded and [`Error::InvalidOperation`] for zero-length requests.
    pub fn malloc(&self, kind: MemoryKind, len: usize) -> Result<DeviceMemory> {
        self.inner.ledger.allocate(kind, len)
    }

    /// Allocation ledger snapshot
    pub fn memory_stats(&self) -> MemoryStats {
        self.inner.ledger.stats()
    }

    /// Enqueue `work` after `deps`
    ///
    /// The work runs on the queue worker once every dependency has resolved.
    /// If a dependency failed the work is skipped and the returned event
    /// carries the upstream fault. An `Err` or a panic from the work fails
    /// the event with a fault labelled `label`.
    pub fn submit<F>(&self, label: impl Into<String>, deps: &[Event], work: F) -> Event
    where
        F: FnOnce() -> std::result::Result<(), String> + Send + 'static,
    {
        let label = label.into();
        let event = Event::pending();
        trace!(device = %self.name(), op = %label, deps = deps.len(), "submit");

        let job = Job {
            label,
            deps: deps.to_vec(),
            event: event.clone(),
            work: Box::new(work),
        };
        match self.inner.tx.send(QueueMsg::Job(job)) {
            Ok(()) => event,
            Err(channel::SendError(msg)) => {
                let label = match msg {
                    QueueMsg::Job(job) => job.label,
                    QueueMsg::Shutdown => String::new(),
                };
                Event::failed(DeviceFault::new(
                    self.name(),
                    label,
                    Error::QueueClosed(self.name().to_string()).to_string(),
                ))
            }
        }
    }

    /// Enqueue a host-to-device copy of `src` into `dst` at `offset`
    pub fn memcpy_to_device(
        &self,
        dst: &DeviceMemory,
        offset: usize,
        src: Bytes,
        deps: &[Event],
    ) -> Event {
        let view = dst.view();
        self.submit("memcpy:h2d", deps, move || {
            let mut region = view.write();
            let end = offset
                .checked_add(src.len())
                .filter(|&end| end <= region.len())
                .ok_or_else(|| {
                    format!(
                        "copy of {} bytes at {} exceeds device allocation of {} bytes",
                        src.len(),
                        offset,
                        region.len()
                    )
                })?;
            region[offset..end].copy_from_slice(&src);
            Ok(())
        })
    }

    /// Enqueue a device-to-host copy of the first `len` bytes of `src`
    /// into `dst` at `offset`
    pub fn memcpy_to_host(
        &self,
        dst: &HostBuffer,
        offset: usize,
        src: &DeviceMemory,
        len: usize,
        deps: &[Event],
    ) -> Event {
        let view = src.view();
        let dst = dst.clone();
        self.submit("memcpy:d2h", deps, move || {
            let region = view.read();
            let bytes = region.get(..len).ok_or_else(|| {
                format!(
                    "copy of {} bytes exceeds device allocation of {} bytes",
                    len,
                    region.len()
                )
            })?;
            if dst.write_at(offset, bytes) {
                Ok(())
            } else {
                Err(format!(
                    "copy of {} bytes at {} exceeds host buffer of {} bytes",
                    len,
                    offset,
                    dst.len()
                ))
            }
        })
    }

    /// Block until every operation submitted so far has resolved
    pub fn synchronize(&self) {
        self.submit("synchronize", &[], || Ok(())).wait();
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("info", &self.inner.info).finish()
    }
}

fn worker_loop(device: String, rx: Receiver<QueueMsg>) {
    for msg in rx {
        let job = match msg {
            QueueMsg::Job(job) => job,
            QueueMsg::Shutdown => break,
        };

        if let Some(fault) = join_all(&job.deps) {
            trace!(device = %device, op = %job.label, "skipped after upstream failure");
            job.event.resolve(Err(fault));
            continue;
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(job.work)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(DeviceFault::new(&device, &job.label, message)),
            Err(payload) => Err(DeviceFault::new(
                &device,
                &job.label,
                panic_message(payload.as_ref()),
            )),
        };
        if let Err(fault) = &outcome {
            debug!(device = %device, op = %job.label, error = %fault.message, "device operation failed");
        }
        job.event.resolve(outcome);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "device task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Once;
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    fn setup_test_logger() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .with_test_writer()
                .try_init();
        });
    }

    #[test]
    fn test_queue_config_validate() {
        assert!(QueueConfig::new("gpu0").validate().is_ok());
        assert!(QueueConfig::new("").validate().is_err());
        assert!(QueueConfig::new("gpu0")
            .with_memory_capacity(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_queue_info() {
        setup_test_logger();
        let queue = Queue::new(
            QueueConfig::new("gpu1")
                .with_device_type(DeviceType::Gpu)
                .with_memory_capacity(1024),
        )
        .unwrap();
        assert_eq!(queue.name(), "gpu1");
        assert_eq!(queue.info().device_type, DeviceType::Gpu);
        assert!(queue.info().device_type.is_offload());
        assert_eq!(queue.memory_stats().capacity, Some(1024));
    }

    #[test]
    fn test_in_order_execution() {
        setup_test_logger();
        let queue = Queue::cpu("cpu0").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut events = Vec::new();
        for i in 0..16 {
            let counter = Arc::clone(&counter);
            events.push(queue.submit("step", &[], move || {
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                if seen == i {
                    Ok(())
                } else {
                    Err(format!("ran {} at position {}", i, seen))
                }
            }));
        }
        for event in events {
            event.wait_and_throw().unwrap();
        }
    }

    #[test]
    fn test_cross_queue_dependency() {
        setup_test_logger();
        let a = Queue::cpu("a").unwrap();
        let b = Queue::cpu("b").unwrap();
        let flag = Arc::new(AtomicUsize::new(0));

        let slow = {
            let flag = Arc::clone(&flag);
            a.submit("slow", &[], move || {
                thread::sleep(Duration::from_millis(20));
                flag.store(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let check = {
            let flag = Arc::clone(&flag);
            b.submit("check", &[slow], move || {
                if flag.load(Ordering::SeqCst) == 1 {
                    Ok(())
                } else {
                    Err("dependency not satisfied".to_string())
                }
            })
        };
        check.wait_and_throw().unwrap();
    }

    #[test]
    fn test_failure_propagates() {
        setup_test_logger();
        let queue = Queue::cpu("cpu0").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let first = queue.submit("kernel:bad", &[], || Err("bad input".to_string()));
        let second = {
            let ran = Arc::clone(&ran);
            queue.submit("copy-out", &[first.clone()], move || {
                ran.store(1, Ordering::SeqCst);
                Ok(())
            })
        };

        let err = second.wait_and_throw().unwrap_err();
        assert!(err.is_device_execution());
        assert!(err.to_string().contains("kernel:bad"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panic_becomes_fault() {
        setup_test_logger();
        let queue = Queue::cpu("cpu0").unwrap();
        let event = queue.submit("kernel:panic", &[], || panic!("index out of bounds"));
        let err = event.wait_and_throw().unwrap_err();
        assert!(err.to_string().contains("index out of bounds"));

        // Worker survives
        queue.submit("after", &[], || Ok(())).wait_and_throw().unwrap();
    }

    #[test]
    fn test_memcpy_round_trip() {
        setup_test_logger();
        let queue = Queue::cpu("cpu0").unwrap();
        let mem = queue.malloc(MemoryKind::Device, 8).unwrap();
        let host = HostBuffer::zeroed(10);

        let h2d = queue.memcpy_to_device(&mem, 2, Bytes::from_static(b"abcd"), &[]);
        let d2h = queue.memcpy_to_host(&host, 1, &mem, 8, &[h2d]);
        d2h.wait_and_throw().unwrap();
        assert_eq!(host.to_vec(), b"\0\0\0abcd\0\0\0".to_vec());
    }

    #[test]
    fn test_memcpy_out_of_range() {
        setup_test_logger();
        let queue = Queue::cpu("cpu0").unwrap();
        let mem = queue.malloc(MemoryKind::Device, 4).unwrap();
        let event = queue.memcpy_to_device(&mem, 2, Bytes::from_static(b"abcd"), &[]);
        assert!(event.wait_and_throw().is_err());

        let host = HostBuffer::zeroed(2);
        let event = queue.memcpy_to_host(&host, 0, &mem, 4, &[]);
        assert!(event.wait_and_throw().is_err());
    }

    #[test]
    fn test_synchronize() {
        setup_test_logger();
        let queue = Queue::cpu("cpu0").unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = Arc::clone(&done);
            queue.submit("work", &[], move || {
                thread::sleep(Duration::from_millis(2));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        queue.synchronize();
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_memory_stats_track_queue_allocations() {
        setup_test_logger();
        let queue = Queue::cpu("cpu0").unwrap();
        let clone = queue.clone();
        let mem = clone.malloc(MemoryKind::Shared, 64).unwrap();
        assert_eq!(queue.memory_stats().live_bytes, 64);
        drop(mem);
        assert_eq!(queue.memory_stats().live_allocations, 0);
        assert_eq!(queue.memory_stats().frees, 1);
    }
}
