use crate::config::validate_threshold;
use crate::error::HeatResult;

/// Slack added to the threshold so rounding noise cannot flip a verdict.
pub const STABILITY_EPSILON: f64 = 1e-12;

/// Decides whether a sweep changed any free cell by more than the threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceDetector {
    threshold: f64,
}

impl ConvergenceDetector {
    pub fn new(threshold: f64) -> HeatResult<Self> {
        validate_threshold(threshold)?;
        Ok(ConvergenceDetector { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[inline]
    pub fn is_cell_stable(&self, old: f64, new: f64) -> bool {
        (new - old).abs() <= self.threshold + STABILITY_EPSILON
    }

    /// Aggregate check over two full buffers. Fixed cells are skipped.
    pub fn is_stable(&self, old: &[f64], new: &[f64], fixed: &[bool]) -> bool {
        debug_assert_eq!(old.len(), new.len());
        old.iter()
            .zip(new)
            .zip(fixed)
            .filter(|(_, &f)| !f)
            .all(|((&o, &n), _)| self.is_cell_stable(o, n))
    }
}

/// Merge of partial stability verdicts: stable only if every part is.
#[inline]
pub fn combine(flags: impl IntoIterator<Item = bool>) -> bool {
    flags.into_iter().all(|f| f)
}
