//! Synchronous single-queue conveniences

use crate::algorithm::Algorithm;
use crate::cache::ConstantCache;
use crate::error::Result;
use crate::hasher::{validate_algorithm, Hasher};
use crate::kernels;
use crate::runner::Runner;
use bytes::Bytes;
use warp_device::{DeviceMemory, HostBuffer, Queue};

/// Hash a batch on one queue, copying through device memory, and block
///
/// Stages the constant tables, runs the copy, compute, copy pipeline and
/// joins it. `key` is only accepted for Blake2b.
///
/// # Errors
/// Configuration, allocation or device execution errors.
pub fn compute(
    queue: &Queue,
    algorithm: Algorithm,
    input: &Bytes,
    record_len: u32,
    output: &HostBuffer,
    batch_count: u32,
    key: &[u8],
) -> Result<()> {
    let hasher = Hasher::with_key(algorithm, &[Runner::new(queue.clone(), 1.0)], key)?;
    hasher.compute(input, record_len, output, batch_count)
}

/// Hash a batch that already lives in device-accessible memory, and block
///
/// No host copies are made: records are read from `device_in` and digests
/// written to `device_out`, both allocated on `queue`.
///
/// # Errors
/// Configuration or allocation errors, and a device execution error if
/// either buffer is too small for the batch.
pub fn compute_on_device(
    queue: &Queue,
    algorithm: Algorithm,
    device_in: &DeviceMemory,
    record_len: u32,
    device_out: &DeviceMemory,
    batch_count: u32,
    key: &[u8],
) -> Result<()> {
    validate_algorithm(algorithm, key)?;
    if batch_count == 0 {
        return Ok(());
    }

    let cache = ConstantCache::stage(algorithm, key, queue)?;
    kernels::launch(
        queue,
        &[],
        device_in,
        device_out,
        record_len as usize,
        batch_count as usize,
        &cache,
    )
    .wait_and_throw()?;
    Ok(())
}
