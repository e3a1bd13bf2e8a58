//! Completion events for asynchronous device operations
//!
//! Every operation enqueued on a [`Queue`](crate::Queue) returns an [`Event`].
//! Events are cheap to clone and can be passed as dependencies to later
//! operations, on the same queue or on another one. A failed event carries
//! the [`DeviceFault`] that caused it; operations depending on a failed event
//! do not run and inherit the fault.

use crate::error::{DeviceFault, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// Observable state of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    /// Operation queued or running
    Pending,
    /// Operation finished successfully
    Complete,
    /// Operation failed, or one of its dependencies failed
    Failed(DeviceFault),
}

struct EventInner {
    status: Mutex<EventStatus>,
    ready: Condvar,
}

/// Completion event of one device operation
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    fn with_status(status: EventStatus) -> Self {
        Self {
            inner: Arc::new(EventInner {
                status: Mutex::new(status),
                ready: Condvar::new(),
            }),
        }
    }

    /// Create an event that is already satisfied
    ///
    /// Used for skipped pipeline stages so later stages can depend on them
    /// at zero cost.
    pub fn complete() -> Self {
        Self::with_status(EventStatus::Complete)
    }

    /// Create an event that has already failed with `fault`
    pub fn failed(fault: DeviceFault) -> Self {
        Self::with_status(EventStatus::Failed(fault))
    }

    pub(crate) fn pending() -> Self {
        Self::with_status(EventStatus::Pending)
    }

    /// Resolve a pending event and wake every waiter
    pub(crate) fn resolve(&self, outcome: std::result::Result<(), DeviceFault>) {
        let mut status = self.inner.status.lock();
        debug_assert_eq!(*status, EventStatus::Pending, "event resolved twice");
        *status = match outcome {
            Ok(()) => EventStatus::Complete,
            Err(fault) => EventStatus::Failed(fault),
        };
        self.inner.ready.notify_all();
    }

    /// Current status without blocking
    pub fn status(&self) -> EventStatus {
        self.inner.status.lock().clone()
    }

    /// Check whether the event is resolved, successfully or not
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.inner.status.lock(), EventStatus::Pending)
    }

    /// Block until resolved and return the fault, if any
    pub fn join(&self) -> Option<DeviceFault> {
        let mut status = self.inner.status.lock();
        while *status == EventStatus::Pending {
            self.inner.ready.wait(&mut status);
        }
        match &*status {
            EventStatus::Failed(fault) => Some(fault.clone()),
            _ => None,
        }
    }

    /// Block until resolved, ignoring device errors
    pub fn wait(&self) {
        let _ = self.join();
    }

    /// Block until resolved and re-raise a device error
    ///
    /// # Errors
    /// Returns [`Error::DeviceExecution`](crate::Error::DeviceExecution) if the
    /// operation or any of its dependencies failed.
    pub fn wait_and_throw(&self) -> Result<()> {
        match self.join() {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("status", &self.status()).finish()
    }
}

/// Block on every dependency and return the first fault
pub(crate) fn join_all(deps: &[Event]) -> Option<DeviceFault> {
    let mut first = None;
    for dep in deps {
        if let Some(fault) = dep.join() {
            first.get_or_insert(fault);
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_complete_event() {
        let event = Event::complete();
        assert!(event.is_resolved());
        event.wait();
        assert!(event.wait_and_throw().is_ok());
    }

    #[test]
    fn test_failed_event() {
        let event = Event::failed(DeviceFault::new("cpu0", "copy-in", "boom"));
        event.wait();
        let err = event.wait_and_throw().unwrap_err();
        assert!(err.is_device_execution());
        // Failure is sticky
        assert!(event.wait_and_throw().is_err());
    }

    #[test]
    fn test_resolve_wakes_waiters() {
        let event = Event::pending();
        let waiter = {
            let event = event.clone();
            thread::spawn(move || event.wait_and_throw())
        };
        thread::sleep(Duration::from_millis(10));
        assert!(!event.is_resolved());
        event.resolve(Ok(()));
        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(event.status(), EventStatus::Complete);
    }

    #[test]
    fn test_join_all_reports_first_fault() {
        let deps = vec![
            Event::complete(),
            Event::failed(DeviceFault::new("a", "op1", "first")),
            Event::failed(DeviceFault::new("b", "op2", "second")),
        ];
        let fault = join_all(&deps).unwrap();
        assert_eq!(fault.message, "first");
        assert!(join_all(&[Event::complete()]).is_none());
    }
}
