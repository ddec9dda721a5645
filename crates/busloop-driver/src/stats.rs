//! Per-device run statistics.

use std::fmt;

use serde::Serialize;

use crate::outcome::TxnOutcome;

/// Cumulative counters for one device over one run.
///
/// Counters only ever increase; [`record`](Self::record) folds one
/// terminal transaction outcome in. Read-only runs simply never touch
/// `write_faults` or `uncorrectable_errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Transactions attempted (every terminal outcome counts one).
    pub messages_attempted: u64,
    /// Transient read faults summed over all transactions.
    pub read_faults: u64,
    /// Transient write faults summed over all transactions.
    pub write_faults: u64,
    /// Readbacks that arrived intact but wrong.
    pub data_mismatches: u64,
    /// Transactions that exhausted every retry round.
    pub uncorrectable_errors: u64,
}

impl RunStats {
    /// Folds one transaction outcome into the counters.
    pub fn record(&mut self, outcome: &TxnOutcome) {
        let tally = outcome.tally();
        self.messages_attempted += 1;
        self.read_faults += u64::from(tally.read_faults);
        self.write_faults += u64::from(tally.write_faults);
        self.data_mismatches += u64::from(tally.data_mismatches);
        if matches!(outcome, TxnOutcome::Uncorrectable { .. }) {
            self.uncorrectable_errors += 1;
        }
    }

    /// Adds another device's counters into this one.
    pub fn merge(&mut self, other: &RunStats) {
        self.messages_attempted += other.messages_attempted;
        self.read_faults += other.read_faults;
        self.write_faults += other.write_faults;
        self.data_mismatches += other.data_mismatches;
        self.uncorrectable_errors += other.uncorrectable_errors;
    }

    /// Everything that went wrong, summed.
    #[must_use]
    pub const fn error_total(&self) -> u64 {
        self.read_faults + self.write_faults + self.data_mismatches + self.uncorrectable_errors
    }

    /// True when the run saw no faults of any kind.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.error_total() == 0
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} messages, {} read faults, {} write faults, {} mismatches, {} uncorrectable",
            self.messages_attempted,
            self.read_faults,
            self.write_faults,
            self.data_mismatches,
            self.uncorrectable_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::FaultTally;

    fn costly_success() -> TxnOutcome {
        TxnOutcome::Success {
            payload: vec![100, 10, 11, 12, 33],
            tally: FaultTally {
                read_faults: 1,
                write_faults: 2,
                data_mismatches: 0,
            },
        }
    }

    #[test]
    fn record_accumulates_tallies() {
        let mut stats = RunStats::default();
        stats.record(&costly_success());
        stats.record(&costly_success());
        assert_eq!(stats.messages_attempted, 2);
        assert_eq!(stats.read_faults, 2);
        assert_eq!(stats.write_faults, 4);
        assert_eq!(stats.uncorrectable_errors, 0);
    }

    #[test]
    fn only_uncorrectable_bumps_the_last_counter() {
        let mut stats = RunStats::default();
        stats.record(&TxnOutcome::Uncorrectable {
            tally: FaultTally {
                read_faults: 0,
                write_faults: 0,
                data_mismatches: 16,
            },
        });
        stats.record(&TxnOutcome::DataMismatch {
            tally: FaultTally {
                read_faults: 0,
                write_faults: 0,
                data_mismatches: 4,
            },
        });
        assert_eq!(stats.uncorrectable_errors, 1);
        assert_eq!(stats.data_mismatches, 20);
        assert_eq!(stats.messages_attempted, 2);
    }

    #[test]
    fn merge_sums_every_counter() {
        let mut a = RunStats {
            messages_attempted: 10,
            read_faults: 1,
            write_faults: 2,
            data_mismatches: 3,
            uncorrectable_errors: 4,
        };
        let b = a;
        a.merge(&b);
        assert_eq!(a.messages_attempted, 20);
        assert_eq!(a.error_total(), 20);
        assert!(!a.is_clean());
        assert!(RunStats::default().is_clean());
    }
}
