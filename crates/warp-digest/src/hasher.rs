//! Multi-device hasher facade

use crate::algorithm::{Algorithm, BLAKE2B_MAX_KEY};
use crate::cache::ConstantCache;
use crate::dispatch::dispatch;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::partition::partition;
use crate::runner::{validate_runners, Runner};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;
use warp_device::HostBuffer;

/// Hashes batches of fixed-size records across a set of runners
///
/// Construction validates the configuration and stages each runner's
/// constant tables; nothing blocks. Each [`hash`](Hasher::hash) call splits
/// the batch by runner weight and pipelines every share on its own queue.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use warp_device::{HostBuffer, Queue};
/// use warp_digest::{Algorithm, Hasher, Runner};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let runners = vec![
///     Runner::new(Queue::cpu("cpu0")?, 1.0),
///     Runner::new(Queue::cpu("cpu1")?, 3.0),
/// ];
/// let hasher = Hasher::new(Algorithm::Sha256, &runners)?;
///
/// let input = Bytes::from(b"abc".repeat(8));
/// let output = HostBuffer::zeroed(8 * 32);
/// let mut handle = hasher.hash(&input, 3, &output, 8)?;
/// handle.wait_and_throw()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Hasher {
    algorithm: Algorithm,
    runners: Vec<Runner>,
    caches: Vec<Arc<ConstantCache>>,
}

impl Hasher {
    /// Create an unkeyed hasher
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for an unsupported output
    /// width or runner list, and a device error if staging fails.
    pub fn new(algorithm: Algorithm, runners: &[Runner]) -> Result<Self> {
        Self::with_key(algorithm, runners, &[])
    }

    /// Create a hasher bound to `key`
    ///
    /// Only Blake2b accepts a key, of at most 64 bytes. An empty key means
    /// unkeyed hashing.
    ///
    /// # Errors
    /// As [`Hasher::new`], plus [`Error::InvalidConfiguration`] for a key
    /// the algorithm does not accept.
    pub fn with_key(algorithm: Algorithm, runners: &[Runner], key: &[u8]) -> Result<Self> {
        validate_algorithm(algorithm, key)?;
        validate_runners(runners)?;

        let caches = runners
            .iter()
            .map(|runner| ConstantCache::stage(algorithm, key, &runner.queue).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            %algorithm,
            runners = runners.len(),
            keyed = !key.is_empty(),
            "hasher created"
        );

        Ok(Self {
            algorithm,
            runners: runners.to_vec(),
            caches,
        })
    }

    /// Configured algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Digest size in bytes per record
    pub fn output_size(&self) -> usize {
        self.algorithm.output_size()
    }

    /// Runners in dispatch order
    pub fn runners(&self) -> &[Runner] {
        &self.runners
    }

    /// Hash `batch_count` records of `record_len` bytes asynchronously
    ///
    /// `input` must hold `record_len * batch_count` bytes and `output`
    /// `output_size() * batch_count`. Digest `i` is written at
    /// `i * output_size()`. The returned handle owns all device memory of
    /// the batch; results are only valid after it is joined.
    ///
    /// A zero batch returns an empty handle without touching any device.
    ///
    /// # Errors
    /// Fails with a device error if a runner cannot allocate its share.
    /// Shares already dispatched are joined and released first.
    pub fn hash(
        &self,
        input: &Bytes,
        record_len: u32,
        output: &HostBuffer,
        batch_count: u32,
    ) -> Result<Handle> {
        if batch_count == 0 {
            return Ok(Handle::empty());
        }

        let record_len = record_len as usize;
        let weights: Vec<f64> = self.runners.iter().map(|r| r.weight).collect();
        let slices = partition(&weights, batch_count as usize);

        let mut items = Vec::with_capacity(slices.len());
        for slice in slices.iter().filter(|s| !s.is_empty()) {
            let runner = &self.runners[slice.runner];
            let cache = &self.caches[slice.runner];
            match dispatch(runner, slice, input, record_len, output, cache) {
                Ok(item) => items.push(item),
                Err(e) => {
                    Handle::from_items(items).wait();
                    return Err(e);
                }
            }
        }

        Ok(Handle::from_items(items))
    }

    /// Hash a batch and block until done
    ///
    /// # Errors
    /// Any dispatch error, or the first device error of the batch.
    pub fn compute(
        &self,
        input: &Bytes,
        record_len: u32,
        output: &HostBuffer,
        batch_count: u32,
    ) -> Result<()> {
        self.hash(input, record_len, output, batch_count)?
            .wait_and_throw()
    }
}

/// Check output width and key before touching a device
pub(crate) fn validate_algorithm(algorithm: Algorithm, key: &[u8]) -> Result<()> {
    algorithm.validate()?;
    if key.is_empty() {
        return Ok(());
    }
    if !algorithm.is_keyed() {
        return Err(Error::invalid(format!("{} does not take a key", algorithm)));
    }
    if key.len() > BLAKE2B_MAX_KEY {
        return Err(Error::invalid(format!(
            "{} key of {} bytes exceeds {} bytes",
            algorithm,
            key.len(),
            BLAKE2B_MAX_KEY
        )));
    }
    Ok(())
}
