//! Error budget applied before sources are marked as processed.

/// Run-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Tasks written to a store.
    pub delivered: u64,
    /// Tasks dropped after exhausting their retries.
    pub failed: u64,
    /// Lines that never became a task.
    pub rejected: u64,
}

impl Totals {
    pub fn processed(&self) -> u64 {
        self.delivered + self.failed + self.rejected
    }

    pub fn errors(&self) -> u64 {
        self.failed + self.rejected
    }
}

/// Outcome of the error-rate check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Nothing reached a store or was rejected; no decision is made.
    NothingProcessed,
    /// Error rate below the threshold: commit.
    Accept { error_rate: f64 },
    /// Error rate at or above the threshold: leave sources for the next run.
    Reject { error_rate: f64 },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accept { .. })
    }
}

/// Compare `errors / processed` against `max_error_rate`.
pub fn evaluate(processed: u64, errors: u64, max_error_rate: f64) -> GateDecision {
    if processed == 0 {
        return GateDecision::NothingProcessed;
    }
    let error_rate = errors as f64 / processed as f64;
    if error_rate < max_error_rate {
        GateDecision::Accept { error_rate }
    } else {
        GateDecision::Reject { error_rate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_accepts() {
        assert!(evaluate(100, 9, 0.1).is_accepted());
        assert!(evaluate(100, 0, 0.1).is_accepted());
    }

    #[test]
    fn at_or_above_threshold_rejects() {
        assert!(matches!(evaluate(100, 11, 0.1), GateDecision::Reject { .. }));
        assert!(matches!(evaluate(100, 10, 0.1), GateDecision::Reject { .. }));
        assert!(matches!(evaluate(1, 1, 0.1), GateDecision::Reject { error_rate } if error_rate == 1.0));
    }

    #[test]
    fn zero_processed_makes_no_decision() {
        assert_eq!(evaluate(0, 0, 0.1), GateDecision::NothingProcessed);
    }

    #[test]
    fn totals_roll_up() {
        let totals = Totals {
            delivered: 1,
            failed: 2,
            rejected: 3,
        };
        assert_eq!(totals.processed(), 6);
        assert_eq!(totals.errors(), 5);
    }
}
