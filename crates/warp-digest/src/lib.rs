//! Batched multi-device digests for warp
//!
//! Hashes large batches of fixed-size records with MD2, MD5, SHA-1, SHA-256,
//! Keccak, SHA-3 or Blake2b, spreading each batch over several device queues:
//! - Weighted partitioning of a batch across runners of unequal throughput
//! - Per-device copy in, kernel, copy out pipeline that never blocks the caller
//! - Completion handles that own device memory until joined
//! - Kernel constant tables staged once per device
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use warp_device::{HostBuffer, Queue};
//! use warp_digest::{Algorithm, Hasher, Runner};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runners = vec![Runner::new(Queue::cpu("cpu0")?, 1.0)];
//! let hasher = Hasher::new(Algorithm::Sha3 { bits: 256 }, &runners)?;
//!
//! let records = 4;
//! let input = Bytes::from(vec![0u8; 64 * records]);
//! let output = HostBuffer::zeroed(32 * records);
//! hasher.compute(&input, 64, &output, records as u32)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod algorithm;
pub mod cache;
pub mod compute;
pub mod config;
mod dispatch;
pub mod error;
pub mod handle;
pub mod hasher;
pub mod kernels;
pub mod partition;
pub mod runner;

pub use algorithm::Algorithm;
pub use cache::ConstantCache;
pub use compute::{compute, compute_on_device};
pub use config::{DispatchConfig, RunnerConfig};
pub use error::{Error, Result};
pub use handle::{Handle, HandleItem};
pub use hasher::Hasher;
pub use kernels::{launch, HashKernel};
pub use partition::{partition, BatchSlice};
pub use runner::Runner;
