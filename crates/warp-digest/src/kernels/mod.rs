//! Per-algorithm hash kernels
//!
//! A kernel hashes one record per work item. Its round constants are not
//! compiled into the launch: they are staged once per device by the
//! [`ConstantCache`](crate::ConstantCache) and decoded on the device side by
//! [`HashKernel::load`] at the start of each launch, the way a GPU kernel
//! reads constant memory.
//!
//! Launches are enqueued on a [`Queue`] and never block the caller. Records
//! within a launch are processed in parallel with `rayon`.

mod blake2b;
mod keccak;
mod md2;
mod md5;
mod sha1;
mod sha256;

pub use self::blake2b::{Blake2bKernel, Blake2bTables};
pub use self::keccak::KeccakKernel;
pub use self::md2::Md2Kernel;
pub use self::md5::Md5Kernel;
pub use self::sha1::Sha1Kernel;
pub use self::sha256::{Sha256Kernel, Sha256Tables};

use crate::algorithm::Algorithm;
use crate::cache::ConstantCache;
use rayon::prelude::*;
use tracing::trace;
use warp_device::{DeviceMemory, DeviceView, Event, Queue};

/// A batched digest kernel
pub trait HashKernel: Send + Sync + 'static {
    /// Decoded constant tables
    type Tables: Sync;

    /// Digest size in bytes
    fn output_size(&self) -> usize;

    /// Table blob staged to device memory once per device
    ///
    /// Kernels without tables stage nothing.
    fn constants(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Decode staged tables on the device
    fn load(&self, staged: &[u8]) -> Result<Self::Tables, String>;

    /// Hash one record into `out`
    ///
    /// `out` is exactly [`output_size`](Self::output_size) bytes.
    fn digest(&self, tables: &Self::Tables, record: &[u8], out: &mut [u8]);
}

/// Table blob for `algorithm`, keyed where applicable
pub(crate) fn constants_for(algorithm: Algorithm, key: &[u8]) -> Vec<u8> {
    match algorithm {
        Algorithm::Md2 => Md2Kernel.constants(),
        Algorithm::Md5 => Md5Kernel.constants(),
        Algorithm::Sha1 => Sha1Kernel.constants(),
        Algorithm::Sha256 => Sha256Kernel.constants(),
        Algorithm::Keccak { bits } => KeccakKernel::keccak(bits).constants(),
        Algorithm::Sha3 { bits } => KeccakKernel::sha3(bits).constants(),
        Algorithm::Blake2b { bits } => Blake2bKernel::with_key(bits, key).constants(),
    }
}

/// Enqueue the kernel for the cache's algorithm
///
/// The launch depends on `deps` and on the cache's staging event. Reads
/// `batch_count` records of `record_len` bytes from `device_in` and writes
/// `batch_count` digests to `device_out`. Undersized or aliasing buffers fail
/// the returned event.
pub fn launch(
    queue: &Queue,
    deps: &[Event],
    device_in: &DeviceMemory,
    device_out: &DeviceMemory,
    record_len: usize,
    batch_count: usize,
    cache: &ConstantCache,
) -> Event {
    let mut all_deps = Vec::with_capacity(deps.len() + 1);
    all_deps.extend_from_slice(deps);
    all_deps.push(cache.ready().clone());

    let launch = Launch {
        queue,
        deps: &all_deps,
        input: device_in.view(),
        output: device_out.view(),
        constants: cache.view(),
        record_len,
        batch_count,
    };

    let algorithm = cache.algorithm();
    match algorithm {
        Algorithm::Md2 => launch.run(algorithm, Md2Kernel),
        Algorithm::Md5 => launch.run(algorithm, Md5Kernel),
        Algorithm::Sha1 => launch.run(algorithm, Sha1Kernel),
        Algorithm::Sha256 => launch.run(algorithm, Sha256Kernel),
        Algorithm::Keccak { bits } => launch.run(algorithm, KeccakKernel::keccak(bits)),
        Algorithm::Sha3 { bits } => launch.run(algorithm, KeccakKernel::sha3(bits)),
        Algorithm::Blake2b { bits } => launch.run(algorithm, Blake2bKernel::new(bits)),
    }
}

struct Launch<'a> {
    queue: &'a Queue,
    deps: &'a [Event],
    input: DeviceView,
    output: DeviceView,
    constants: Option<DeviceView>,
    record_len: usize,
    batch_count: usize,
}

impl Launch<'_> {
    fn run<K: HashKernel>(self, algorithm: Algorithm, kernel: K) -> Event {
        trace!(
            device = %self.queue.name(),
            %algorithm,
            record_len = self.record_len,
            batch_count = self.batch_count,
            "kernel launch"
        );
        let Launch {
            queue,
            deps,
            input,
            output,
            constants,
            record_len,
            batch_count,
        } = self;
        queue.submit(format!("kernel:{}", algorithm), deps, move || {
            execute(&kernel, &input, &output, constants.as_ref(), record_len, batch_count)
        })
    }
}

/// Kernel body, runs on the queue worker
fn execute<K: HashKernel>(
    kernel: &K,
    input: &DeviceView,
    output: &DeviceView,
    constants: Option<&DeviceView>,
    record_len: usize,
    batch_count: usize,
) -> Result<(), String> {
    if batch_count == 0 {
        return Ok(());
    }
    if input.same_region(output) {
        return Err("input and output alias the same allocation".to_string());
    }

    let tables = match constants {
        Some(view) => kernel.load(&view.read())?,
        None => kernel.load(&[])?,
    };

    let out_size = kernel.output_size();
    let in_needed = record_len
        .checked_mul(batch_count)
        .ok_or_else(|| "input size overflows".to_string())?;
    let out_needed = out_size
        .checked_mul(batch_count)
        .ok_or_else(|| "output size overflows".to_string())?;

    let input = input.read();
    let mut output = output.write();
    if input.len() < in_needed {
        return Err(format!(
            "input allocation holds {} bytes, {} records of {} bytes need {}",
            input.len(),
            batch_count,
            record_len,
            in_needed
        ));
    }
    if output.len() < out_needed {
        return Err(format!(
            "output allocation holds {} bytes, {} digests of {} bytes need {}",
            output.len(),
            batch_count,
            out_size,
            out_needed
        ));
    }

    let digests = output[..out_needed].par_chunks_mut(out_size);
    if record_len == 0 {
        digests.for_each(|out| kernel.digest(&tables, &[], out));
    } else {
        digests
            .zip(input[..in_needed].par_chunks(record_len))
            .for_each(|(out, record)| kernel.digest(&tables, record, out));
    }
    Ok(())
}

/// Split a staged blob into fixed-width little-endian words
pub(crate) fn read_words<const N: usize, const W: usize>(
    staged: &[u8],
    name: &str,
) -> Result<[[u8; W]; N], String> {
    let needed = N * W;
    if staged.len() < needed {
        return Err(format!(
            "{} tables hold {} bytes, {} expected",
            name,
            staged.len(),
            needed
        ));
    }
    let mut words = [[0u8; W]; N];
    for (word, chunk) in words.iter_mut().zip(staged.chunks_exact(W)) {
        word.copy_from_slice(chunk);
    }
    Ok(words)
}
