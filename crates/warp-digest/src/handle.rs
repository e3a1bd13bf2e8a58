//! Completion handles
//!
//! A [`Handle`] owns the device memory of every in-flight sub-batch of one
//! `hash` call. Joining the handle blocks until the last device-to-host copy
//! has finished and only then releases the memory, so a device never loses
//! an allocation that queued work still reads or writes.

use crate::cache::ConstantCache;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::warn;
use warp_device::{DeviceMemory, Event};

/// One runner's share of an in-flight batch
#[derive(Debug)]
pub struct HandleItem {
    input: DeviceMemory,
    output: DeviceMemory,
    event: Event,
    // Staged tables stay alive until the batch is joined
    _constants: Arc<ConstantCache>,
}

impl HandleItem {
    pub(crate) fn new(
        input: DeviceMemory,
        output: DeviceMemory,
        event: Event,
        constants: Arc<ConstantCache>,
    ) -> Self {
        Self {
            input,
            output,
            event,
            _constants: constants,
        }
    }

    /// Completion event of the last pipeline step
    pub fn event(&self) -> &Event {
        &self.event
    }

    fn release(mut self) -> Result<()> {
        let input = self.input.release();
        let output = self.output.release();
        input?;
        output?;
        Ok(())
    }
}

/// Completion handle of a batched hash
///
/// Not `Clone`. After [`wait`](Handle::wait) or
/// [`wait_and_throw`](Handle::wait_and_throw) the handle is empty; joining
/// again is a no-op.
#[derive(Debug, Default)]
#[must_use = "dropping a handle blocks until the batch is done"]
pub struct Handle {
    items: Vec<HandleItem>,
}

impl Handle {
    /// An already-complete handle
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_items(items: Vec<HandleItem>) -> Self {
        Self { items }
    }

    /// Number of sub-batches still owned
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check whether every sub-batch has resolved, without blocking
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|item| item.event.is_resolved())
    }

    /// Block until every sub-batch is done and release device memory
    ///
    /// Device errors are discarded.
    pub fn wait(&mut self) {
        for item in &self.items {
            item.event.wait();
        }
        for item in self.items.drain(..) {
            if let Err(e) = item.release() {
                warn!(error = %e, "failed to release batch memory");
            }
        }
    }

    /// Block until every sub-batch is done, release device memory, then
    /// report the first failure
    ///
    /// All sub-batches are joined and released even when an earlier one
    /// failed.
    ///
    /// # Errors
    /// Returns the first device execution error, or a release error if no
    /// sub-batch failed.
    pub fn wait_and_throw(&mut self) -> Result<()> {
        let mut first: Option<Error> = None;
        for item in &self.items {
            if let Err(e) = item.event.wait_and_throw() {
                first.get_or_insert(e.into());
            }
        }
        for item in self.items.drain(..) {
            if let Err(e) = item.release() {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.items.is_empty() {
            return;
        }
        if let Err(e) = self.wait_and_throw() {
            warn!(error = %e, "batch failed and its handle was dropped without being joined");
        }
    }
}
