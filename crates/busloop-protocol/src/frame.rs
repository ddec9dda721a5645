//! Protocol variants and frame layout.
//!
//! Three firmware revisions speak three slightly different dialects of the
//! same write-then-verify protocol. A [`TxnProfile`] captures one dialect
//! as data — checksum formula, which bytes the checksum folds in, whether
//! a sequence byte leads the frame, and what the controller reads back to
//! confirm the write — so one transaction engine serves all three.
//!
//! Wire layouts:
//!
//! ```text
//! write frame        [seq]? payload… checksum
//! echo readback      reg [seq]? payload… checksum
//! status readback    seq
//! ```
//!
//! Both sides of a transaction are built from the same profile value, so
//! the write and verify halves can never disagree on layout.

use crate::checksum::ChecksumKind;
use crate::regs;

/// What the controller reads back to confirm a write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// Read the written frame back from the data register; the peripheral
    /// echoes it prefixed with the register address.
    EchoFrame,
    /// Read one byte from the status register and compare it to the
    /// transaction's sequence byte.
    StatusSequence,
}

/// Wire-format and verification policy for one protocol variant.
///
/// `verify: StatusSequence` requires `tag_sequence` — the status byte is
/// compared against the sequence the frame carried, so a frame without
/// one has nothing to verify against. The engine asserts the combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnProfile {
    /// Checksum formula for the trailing byte.
    pub checksum: ChecksumKind,
    /// Fold the target register address into the checksum.
    pub tag_register: bool,
    /// Lead the frame with a sequence byte and fold it into the checksum.
    pub tag_sequence: bool,
    /// How a write is confirmed.
    pub verify: VerifyMode,
}

impl TxnProfile {
    /// Original firmware: plain sum over the payload only, no sequence
    /// byte, verify by reading the echoed frame back.
    #[must_use]
    pub const fn echo_plain() -> Self {
        Self {
            checksum: ChecksumKind::PlainSum,
            tag_register: false,
            tag_sequence: false,
            verify: VerifyMode::EchoFrame,
        }
    }

    /// Tagged firmware: negated sum folding register + sequence, sequence
    /// byte leads the frame, echo-frame verify.
    #[must_use]
    pub const fn echo_tagged() -> Self {
        Self {
            checksum: ChecksumKind::NegatedSum,
            tag_register: true,
            tag_sequence: true,
            verify: VerifyMode::EchoFrame,
        }
    }

    /// Sequenced firmware: tagged frame, but verification reads the
    /// latched sequence byte from the status register instead of the echo.
    #[must_use]
    pub const fn status_sequenced() -> Self {
        Self {
            checksum: ChecksumKind::NegatedSum,
            tag_register: true,
            tag_sequence: true,
            verify: VerifyMode::StatusSequence,
        }
    }

    /// Whether transactions under this profile consume a sequence number.
    #[must_use]
    pub const fn wants_sequence(&self) -> bool {
        self.tag_sequence
    }

    /// On-wire length of the write frame for a payload of `payload_len`.
    #[must_use]
    pub const fn frame_len(&self, payload_len: usize) -> usize {
        (self.tag_sequence as usize) + payload_len + 1
    }

    /// Length of the readback the verify phase expects.
    #[must_use]
    pub const fn readback_len(&self, payload_len: usize) -> usize {
        match self.verify {
            VerifyMode::EchoFrame => 1 + self.frame_len(payload_len),
            VerifyMode::StatusSequence => 1,
        }
    }

    /// Register the verify read targets, given the data register the
    /// write went to.
    #[must_use]
    pub const fn verify_register(&self, data_reg: u8) -> u8 {
        match self.verify {
            VerifyMode::EchoFrame => data_reg,
            VerifyMode::StatusSequence => regs::STATUS_REG,
        }
    }

    /// Builds the write frame: `[seq]? ++ payload ++ checksum`.
    ///
    /// `seq` must be `Some` exactly when [`wants_sequence`](Self::wants_sequence)
    /// holds; the engine draws it from its counter once per transaction.
    #[must_use]
    pub fn write_frame(&self, reg: u8, payload: &[u8], seq: Option<u8>) -> Vec<u8> {
        debug_assert_eq!(seq.is_some(), self.tag_sequence);
        let cs = self.checksum.compute(
            payload,
            self.tag_register.then_some(reg),
            if self.tag_sequence { seq } else { None },
        );
        let mut frame = Vec::with_capacity(self.frame_len(payload.len()));
        if self.tag_sequence {
            frame.extend(seq);
        }
        frame.extend_from_slice(payload);
        frame.push(cs);
        frame
    }

    /// The exact bytes a clean verify read must return.
    #[must_use]
    pub fn expected_readback(&self, reg: u8, payload: &[u8], seq: Option<u8>) -> Vec<u8> {
        match self.verify {
            VerifyMode::EchoFrame => {
                let mut expected = Vec::with_capacity(self.readback_len(payload.len()));
                expected.push(reg);
                expected.extend_from_slice(&self.write_frame(reg, payload, seq));
                expected
            }
            VerifyMode::StatusSequence => {
                debug_assert!(seq.is_some());
                vec![seq.unwrap_or_default()]
            }
        }
    }

    /// Validates an echoed data-register frame against its own trailing
    /// checksum, with no prior expectation of the payload.
    ///
    /// All firmware revisions echo `reg ++ stored frame` on data-register
    /// reads, so this applies to every profile regardless of its verify
    /// mode. Used by read-only transactions with an embedded self-check.
    #[must_use]
    pub fn self_check(&self, frame: &[u8]) -> bool {
        // reg + optional seq + at least one payload byte + checksum
        if frame.len() < 3 + usize::from(self.tag_sequence) {
            return false;
        }
        let reg = frame[0];
        let rest = &frame[1..];
        let (seq, rest) = if self.tag_sequence {
            (Some(rest[0]), &rest[1..])
        } else {
            (None, rest)
        };
        let Some((&trailer, payload)) = rest.split_last() else {
            return false;
        };
        trailer == self.checksum.compute(payload, self.tag_register.then_some(reg), seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_frame_matches_the_reference_vector() {
        let profile = TxnProfile::echo_plain();
        let frame = profile.write_frame(100, &[10, 11, 12], None);
        assert_eq!(frame, vec![10, 11, 12, 33]);
        let expected = profile.expected_readback(100, &[10, 11, 12], None);
        assert_eq!(expected, vec![100, 10, 11, 12, 33]);
    }

    #[test]
    fn tagged_frame_leads_with_sequence_and_negates() {
        let profile = TxnProfile::echo_tagged();
        // 100 + 5 + 10 + 11 + 12 = 138; two's complement = 118.
        let frame = profile.write_frame(100, &[10, 11, 12], Some(5));
        assert_eq!(frame, vec![5, 10, 11, 12, 118]);
        let expected = profile.expected_readback(100, &[10, 11, 12], Some(5));
        assert_eq!(expected, vec![100, 5, 10, 11, 12, 118]);
    }

    #[test]
    fn status_verify_expects_the_sequence_byte_alone() {
        let profile = TxnProfile::status_sequenced();
        assert_eq!(profile.expected_readback(100, &[10, 11, 12], Some(5)), vec![5]);
        assert_eq!(profile.verify_register(regs::LOOPBACK_REG), regs::STATUS_REG);
        assert_eq!(profile.readback_len(3), 1);
    }

    #[test]
    fn echo_verify_targets_the_data_register() {
        let profile = TxnProfile::echo_plain();
        assert_eq!(profile.verify_register(regs::LOOPBACK_REG), regs::LOOPBACK_REG);
        assert_eq!(profile.readback_len(3), 5);
    }

    #[test]
    fn frame_len_counts_the_sequence_byte() {
        assert_eq!(TxnProfile::echo_plain().frame_len(3), 4);
        assert_eq!(TxnProfile::echo_tagged().frame_len(3), 5);
    }

    #[test]
    fn self_check_accepts_a_clean_echo() {
        let profile = TxnProfile::echo_tagged();
        let echo = profile.expected_readback(100, &[10, 11, 12], Some(5));
        assert!(profile.self_check(&echo));
    }

    #[test]
    fn self_check_rejects_corruption_and_runts() {
        let profile = TxnProfile::echo_tagged();
        let mut echo = profile.expected_readback(100, &[10, 11, 12], Some(5));
        let last = echo.len() - 1;
        echo[last] ^= 0xff;
        assert!(!profile.self_check(&echo));
        assert!(!profile.self_check(&[100, 5]));
        assert!(!profile.self_check(&[]));
    }
}
