//! Frame checksums.
//!
//! Every write frame carries a trailing checksum byte so the peripheral
//! (and the verify read) can detect corruption. Two formulas exist in the
//! field; both are byte sums mod 256, they differ in what is folded in and
//! whether the sum is negated.

/// Checksum formula variants observed across peripheral firmware revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumKind {
    /// Plain byte sum mod 256 — the original firmware.
    #[default]
    PlainSum,
    /// Two's complement of the sum, so summing a whole tagged frame
    /// (including the checksum byte) yields zero.
    NegatedSum,
}

impl ChecksumKind {
    /// Computes the checksum over `payload`, optionally folding in the
    /// target register address and the transaction sequence byte.
    ///
    /// Which of the optional bytes participate is fixed by the protocol
    /// variant, not by this formula; callers pass `None` for bytes their
    /// variant leaves out.
    #[must_use]
    pub fn compute(self, payload: &[u8], register: Option<u8>, sequence: Option<u8>) -> u8 {
        let mut sum: u8 = 0;
        if let Some(reg) = register {
            sum = sum.wrapping_add(reg);
        }
        if let Some(seq) = sequence {
            sum = sum.wrapping_add(seq);
        }
        for &byte in payload {
            sum = sum.wrapping_add(byte);
        }
        match self {
            Self::PlainSum => sum,
            Self::NegatedSum => sum.wrapping_neg(),
        }
    }

    /// Validates a received `payload ++ checksum` frame against the
    /// expectation: the body must match `expected_payload` byte for byte
    /// and the trailing byte must match the recomputed checksum.
    ///
    /// Empty frames never validate.
    #[must_use]
    pub fn validate(
        self,
        received: &[u8],
        expected_payload: &[u8],
        register: Option<u8>,
        sequence: Option<u8>,
    ) -> bool {
        let Some((&trailer, body)) = received.split_last() else {
            return false;
        };
        body == expected_payload && trailer == self.compute(expected_payload, register, sequence)
    }
}
