//! Runners: a device queue and its share of the work

use crate::error::{Error, Result};
use warp_device::Queue;

/// A device queue with a relative throughput weight
#[derive(Debug, Clone)]
pub struct Runner {
    /// Queue the runner dispatches to
    pub queue: Queue,
    /// Relative share of each batch
    pub weight: f64,
}

impl Runner {
    /// Create a runner
    pub fn new(queue: Queue, weight: f64) -> Self {
        Self { queue, weight }
    }
}

/// Check a runner list before any device work
///
/// Needs at least one runner and finite, non-negative weights with a
/// positive sum.
pub(crate) fn validate_runners(runners: &[Runner]) -> Result<()> {
    if runners.is_empty() {
        return Err(Error::invalid("at least one runner is required"));
    }
    for runner in runners {
        if !runner.weight.is_finite() || runner.weight < 0.0 {
            return Err(Error::invalid(format!(
                "runner {} has invalid weight {}",
                runner.queue.name(),
                runner.weight
            )));
        }
    }
    let total: f64 = runners.iter().map(|r| r.weight).sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(Error::invalid("runner weights must sum to a positive value"));
    }
    Ok(())
}
