//! Transaction sequence numbering.

/// Wrapping 8-bit sequence counter for tagged protocol variants.
///
/// One counter lives for the whole process and is owned by the transaction
/// engine; nothing else hands out sequence numbers. The engine draws a new
/// value once per *logical* write transaction — physical retries of the
/// same transaction re-send the same byte, so a stale readback from the
/// previous transaction can never match the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    value: u8,
}

impl SequenceCounter {
    /// Counter starting at zero; the first [`next`](Self::next) returns 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Counter with an explicit starting value.
    #[must_use]
    pub const fn starting_at(value: u8) -> Self {
        Self { value }
    }

    /// Advances the counter and returns the updated value, wrapping 255→0.
    pub fn next(&mut self) -> u8 {
        self.value = self.value.wrapping_add(1);
        self.value
    }

    /// The most recently issued value.
    #[must_use]
    pub const fn current(&self) -> u8 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_draws_advance_by_k_mod_256() {
        let mut seq = SequenceCounter::new();
        for k in 1..=600u32 {
            let got = seq.next();
            assert_eq!(u32::from(got), k % 256);
        }
    }

    #[test]
    fn wraps_at_255() {
        let mut seq = SequenceCounter::starting_at(255);
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn full_cycle_returns_to_start() {
        let mut seq = SequenceCounter::starting_at(17);
        for _ in 0..256 {
            seq.next();
        }
        assert_eq!(seq.current(), 17);
    }
}
