//! Per-device constant-data cache

use crate::algorithm::Algorithm;
use crate::error::Result;
use crate::kernels;
use bytes::Bytes;
use tracing::debug;
use warp_device::{DeviceMemory, DeviceView, Event, MemoryKind, Queue};

/// Read-only kernel tables staged once on one device
///
/// Staging enqueues an asynchronous upload and returns immediately; the
/// upload event is a dependency of every launch that reads the tables.
/// MD5 and SHA-1 stage nothing and get an empty, already-ready entry.
pub struct ConstantCache {
    algorithm: Algorithm,
    memory: Option<DeviceMemory>,
    ready: Event,
}

impl ConstantCache {
    /// Upload the tables for `algorithm` to `queue`'s device
    ///
    /// `key` is folded into the Blake2b keyed context and ignored otherwise.
    ///
    /// # Errors
    /// Fails if device memory for the tables cannot be allocated.
    pub fn stage(algorithm: Algorithm, key: &[u8], queue: &Queue) -> Result<Self> {
        let blob = kernels::constants_for(algorithm, key);
        if blob.is_empty() {
            return Ok(Self::empty(algorithm));
        }

        let len = blob.len();
        let memory = queue.malloc(MemoryKind::Device, len)?;
        let ready = queue.memcpy_to_device(&memory, 0, Bytes::from(blob), &[]);
        debug!(device = %queue.name(), %algorithm, bytes = len, "staging kernel constants");

        Ok(Self {
            algorithm,
            memory: Some(memory),
            ready,
        })
    }

    /// Cache entry with nothing staged
    pub fn empty(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            memory: None,
            ready: Event::complete(),
        }
    }

    /// Algorithm the tables belong to
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Upload event
    pub fn ready(&self) -> &Event {
        &self.ready
    }

    /// Device view of the staged tables, `None` if nothing is staged
    pub fn view(&self) -> Option<DeviceView> {
        self.memory.as_ref().map(DeviceMemory::view)
    }

    /// Staged size in bytes
    pub fn staged_bytes(&self) -> usize {
        self.memory.as_ref().map_or(0, DeviceMemory::len)
    }
}

impl std::fmt::Debug for ConstantCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantCache")
            .field("algorithm", &self.algorithm)
            .field("staged_bytes", &self.staged_bytes())
            .finish()
    }
}

impl Drop for ConstantCache {
    fn drop(&mut self) {
        // Never free tables under an in-flight upload
        self.ready.wait();
    }
}
