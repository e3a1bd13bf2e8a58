//! Weighted batch partitioning

/// Contiguous share of a batch assigned to one runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSlice {
    /// Runner index
    pub runner: usize,
    /// First record of the share
    pub offset: usize,
    /// Number of records
    pub count: usize,
}

impl BatchSlice {
    /// One past the last record
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.count
    }

    /// Whether the runner gets no work
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Split `batch` records across runners in proportion to `weights`
///
/// Returns one slice per weight, in order, covering `[0, batch)` exactly
/// once. Boundaries are `floor(batch * w_i / W)` accumulated over the
/// runners, clamped to `batch`, and the last boundary is always `batch`.
/// Rounding may give a zero-weight runner a record or two.
///
/// Weights must be finite and non-negative with a positive sum; the facade
/// validates this before partitioning.
pub fn partition(weights: &[f64], batch: usize) -> Vec<BatchSlice> {
    let total: f64 = weights.iter().sum();
    let mut slices = Vec::with_capacity(weights.len());
    let mut prev = 0usize;

    for (runner, &weight) in weights.iter().enumerate() {
        let boundary = if runner + 1 == weights.len() {
            batch
        } else {
            let share = (batch as f64 * weight / total) as usize;
            share.saturating_add(prev).min(batch)
        };
        slices.push(BatchSlice {
            runner,
            offset: prev,
            count: boundary - prev,
        });
        prev = boundary;
    }

    slices
}
