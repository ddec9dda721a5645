//! Transaction outcomes.

use std::fmt;

/// Fault counts accumulated across every attempt of one transaction.
///
/// Counters never reset mid-transaction; a transaction that recovered on
/// its third attempt still reports the two failures that preceded it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultTally {
    /// Transient faults on reads, verify reads included.
    pub read_faults: u32,
    /// Transient faults on writes.
    pub write_faults: u32,
    /// Readbacks that arrived intact but did not match expectations.
    pub data_mismatches: u32,
}

impl FaultTally {
    /// True when no attempt misbehaved.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.read_faults == 0 && self.write_faults == 0 && self.data_mismatches == 0
    }
}

impl fmt::Display for FaultTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} write faults, {} read faults, {} mismatches",
            self.write_faults, self.read_faults, self.data_mismatches
        )
    }
}

/// Terminal classification of one transaction.
///
/// A transaction that consumed retries but ultimately landed is still
/// [`Success`](Self::Success); its tally says what the success cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOutcome {
    /// The final read returned the expected data.
    Success {
        /// Bytes the final read returned.
        payload: Vec<u8>,
        /// What the success cost.
        tally: FaultTally,
    },
    /// Every attempt of a read transaction faulted at the bus level.
    TransientFault {
        /// Accumulated counts.
        tally: FaultTally,
    },
    /// Data kept arriving but never matched within the budget.
    DataMismatch {
        /// Accumulated counts.
        tally: FaultTally,
    },
    /// A write-verify transaction exhausted every retry round.
    Uncorrectable {
        /// Accumulated counts.
        tally: FaultTally,
    },
}

impl TxnOutcome {
    /// Whether the transaction ultimately landed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The transaction's accumulated fault counts.
    #[must_use]
    pub const fn tally(&self) -> FaultTally {
        match self {
            Self::Success { tally, .. }
            | Self::TransientFault { tally }
            | Self::DataMismatch { tally }
            | Self::Uncorrectable { tally } => *tally,
        }
    }

    /// Short name for logs and tables.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::TransientFault { .. } => "transient fault",
            Self::DataMismatch { .. } => "data mismatch",
            Self::Uncorrectable { .. } => "uncorrectable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_is_uniform_across_variants() {
        let tally = FaultTally {
            read_faults: 2,
            write_faults: 1,
            data_mismatches: 3,
        };
        let outcomes = [
            TxnOutcome::Success {
                payload: vec![1, 2],
                tally,
            },
            TxnOutcome::TransientFault { tally },
            TxnOutcome::DataMismatch { tally },
            TxnOutcome::Uncorrectable { tally },
        ];
        for outcome in &outcomes {
            assert_eq!(outcome.tally(), tally);
        }
    }

    #[test]
    fn clean_tally_reports_clean() {
        assert!(FaultTally::default().is_clean());
        let dirty = FaultTally {
            read_faults: 1,
            ..FaultTally::default()
        };
        assert!(!dirty.is_clean());
    }

    #[test]
    fn only_success_is_success() {
        let tally = FaultTally::default();
        assert!(TxnOutcome::Success {
            payload: vec![],
            tally
        }
        .is_success());
        assert!(!TxnOutcome::Uncorrectable { tally }.is_success());
    }
}
