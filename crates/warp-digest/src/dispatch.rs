//! Per-device copy, compute, copy pipeline

use crate::cache::ConstantCache;
use crate::error::Result;
use crate::handle::HandleItem;
use crate::kernels;
use crate::partition::BatchSlice;
use crate::runner::Runner;
use bytes::Bytes;
use std::sync::Arc;
use tracing::trace;
use warp_device::{DeviceFault, Event, HostBuffer, MemoryKind};

/// Enqueue one runner's share of a batch
///
/// Allocates device input and output, then chains host-to-device copy,
/// kernel launch and device-to-host copy on the runner's queue. Returns as
/// soon as the work is enqueued; the item owns both allocations and the
/// event of the final copy.
///
/// # Errors
/// Only allocation failures are reported here. Copy and kernel failures are
/// carried by the returned item's event.
pub(crate) fn dispatch(
    runner: &Runner,
    slice: &BatchSlice,
    input: &Bytes,
    record_len: usize,
    output: &HostBuffer,
    cache: &Arc<ConstantCache>,
) -> Result<HandleItem> {
    let queue = &runner.queue;
    let out_size = cache.algorithm().output_size();

    // Zero-length records still need a valid device pointer
    let device_in = queue.malloc(
        MemoryKind::Device,
        record_len.saturating_mul(slice.count).max(1),
    )?;
    let device_out = queue.malloc(MemoryKind::Device, out_size.saturating_mul(slice.count))?;

    trace!(
        device = %queue.name(),
        runner = slice.runner,
        offset = slice.offset,
        count = slice.count,
        "dispatching sub-batch"
    );

    let copied_in = if record_len == 0 {
        Event::complete()
    } else {
        let start = slice.offset * record_len;
        let end = slice.end() * record_len;
        if end <= input.len() {
            queue.memcpy_to_device(&device_in, 0, input.slice(start..end), &[])
        } else {
            Event::failed(DeviceFault::new(
                queue.name(),
                "memcpy:h2d",
                format!(
                    "records {}..{} need {} input bytes, {} given",
                    slice.offset,
                    slice.end(),
                    end,
                    input.len()
                ),
            ))
        }
    };

    let computed = kernels::launch(
        queue,
        &[copied_in],
        &device_in,
        &device_out,
        record_len,
        slice.count,
        cache,
    );

    let copied_out = queue.memcpy_to_host(
        output,
        slice.offset * out_size,
        &device_out,
        out_size * slice.count,
        &[computed],
    );

    Ok(HandleItem::new(
        device_in,
        device_out,
        copied_out,
        Arc::clone(cache),
    ))
}
