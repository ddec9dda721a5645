//! Peripheral register map and link tuning constants.
//!
//! The echo firmware exposes two registers. Block writes land at
//! [`LOOPBACK_REG`]; the firmware retains the last frame per register and
//! echoes it back, prefixed with the register address, on the next block
//! read. [`STATUS_REG`] is read-only from the controller side: the
//! sequenced firmware revisions latch the sequence byte of each accepted
//! write into its first byte.
//!
//! The attempt budgets and settle delays are the values the link was
//! qualified with; transports and engines take them as defaults rather
//! than hardcoding their own.

// ── Register map ─────────────────────────────────────────────────────────────

/// Loopback data register — block writes land here, echo reads come back here.
pub const LOOPBACK_REG: u8 = 100;

/// Status register: byte 0 = last accepted sequence number, byte 1 =
/// firmware flags.
pub const STATUS_REG: u8 = 99;

/// Width of a full status read.
pub const STATUS_LEN: usize = 2;

// ── Frame sizing ─────────────────────────────────────────────────────────────

/// Payload length used by the stock loopback test.
pub const DEFAULT_PAYLOAD_LEN: usize = 3;

/// Largest block the bus moves in one transfer (SMBus block limit).
pub const MAX_BLOCK_LEN: usize = 32;

// ── Attempt budgets ──────────────────────────────────────────────────────────

/// Retry ceilings for one transaction. All phases stop at the first
/// success; the budgets only bound the failure path.
pub mod budget {
    /// Physical write attempts per write phase.
    pub const WRITE_ATTEMPTS: u8 = 4;

    /// Verify reads per verify phase.
    pub const VERIFY_ATTEMPTS: u8 = 4;

    /// Write+verify rounds per transaction.
    pub const TXN_ATTEMPTS: u8 = 4;

    /// Read attempts for a read-only transaction.
    pub const READ_ATTEMPTS: u8 = 4;
}

// ── Settle timing ────────────────────────────────────────────────────────────

/// Delays between bus operations, in the units their names say.
///
/// Measured against the slowest qualified peripheral (8 MHz AVR doing
/// byte-banged slave receive): the firmware needs ~60 µs to re-arm after
/// servicing a block, and ~700 µs to recover from an aborted transfer.
pub mod settle {
    /// Wait after opening the bus adapter before the first transfer.
    pub const BUS_OPEN_MS: u64 = 1000;

    /// Backoff after a faulted write before the next write attempt.
    pub const WRITE_RETRY_US: u64 = 1000;

    /// Backoff after a faulted read before the next read attempt.
    pub const READ_RETRY_US: u64 = 100;

    /// Gap between a successful write and its first verify read.
    pub const POST_WRITE_US: u64 = 100;

    /// Gap between consecutive soak-test messages.
    pub const INTER_MESSAGE_US: u64 = 100;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_frame_fits_the_block_limit() {
        // seq + payload + checksum for the stock test
        assert!(1 + DEFAULT_PAYLOAD_LEN + 1 <= MAX_BLOCK_LEN);
    }

    #[test]
    fn registers_are_distinct() {
        assert_ne!(LOOPBACK_REG, STATUS_REG);
    }
}
