//! Device queues, events and owned device memory for warp
//!
//! This crate provides the device-side primitives the batched digest engine
//! runs on:
//! - In-order queues with one worker per device
//! - Completion events usable as cross-queue dependencies
//! - Exclusively owned device allocations released exactly once
//! - A per-queue allocation ledger for observing releases
//!
//! Queues execute work on the host CPU, which keeps the asynchronous
//! copy/compute/copy model portable. Failures inside a queued operation are
//! never raised at submission; they are recorded on the operation's
//! [`Event`] and surface when the event is joined with
//! [`Event::wait_and_throw`].
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use warp_device::{HostBuffer, MemoryKind, Queue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = Queue::cpu("cpu0")?;
//! let mem = queue.malloc(MemoryKind::Device, 4)?;
//! let out = HostBuffer::zeroed(4);
//!
//! let copied_in = queue.memcpy_to_device(&mem, 0, Bytes::from_static(b"warp"), &[]);
//! let copied_out = queue.memcpy_to_host(&out, 0, &mem, 4, &[copied_in]);
//! copied_out.wait_and_throw()?;
//! assert_eq!(out.to_vec(), b"warp".to_vec());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod buffer;
pub mod error;
pub mod event;
pub mod memory;
pub mod queue;

pub use buffer::HostBuffer;
pub use error::{DeviceFault, Error, Result};
pub use event::{Event, EventStatus};
pub use memory::{DeviceMemory, DeviceView, MemoryKind, MemoryStats};
pub use queue::{DeviceInfo, DeviceType, Queue, QueueConfig};
