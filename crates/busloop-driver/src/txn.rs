//! Write-then-verify transaction engine.
//!
//! One engine serves every protocol variant; a
//! [`TxnProfile`] parameterizes framing and verification. Faults inside
//! the retry budget are data, not errors: the engine consumes them,
//! counts them, and reports one terminal [`TxnOutcome`] per transaction.
//!
//! A write transaction moves through a bounded state machine:
//!
//! ```text
//! Writing{round, attempt}
//!     write ok      -> Verifying{round, 1}
//!     fault         -> Writing{round, attempt+1}, budget spent -> Retrying{round}
//! Verifying{round, attempt}
//!     match         -> Done                      (Success)
//!     fault/mismatch-> Verifying{round, attempt+1}, budget spent -> Retrying{round}
//! Retrying{round}
//!     rounds left   -> Writing{round+1, 1}
//!     exhausted     -> Failed                    (Uncorrectable)
//! ```

use std::thread;
use std::time::Duration;

use busloop_protocol::regs::{budget, settle, MAX_BLOCK_LEN};
use busloop_protocol::{DeviceAddr, SequenceCounter, TxnProfile, VerifyMode};

use crate::bus::BlockBus;
use crate::outcome::{FaultTally, TxnOutcome};

/// Attempt budgets and backoff delays for one engine.
///
/// The defaults are the values the link was qualified with; every delay
/// may be zeroed (see [`instant`](Self::instant)) without changing any
/// retry semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Physical write attempts per write phase.
    pub write_attempts: u8,
    /// Verify reads per verify phase.
    pub verify_attempts: u8,
    /// Write+verify rounds per transaction.
    pub txn_attempts: u8,
    /// Attempts per read-only transaction.
    pub read_attempts: u8,
    /// Backoff after a faulted write.
    pub write_retry_backoff: Duration,
    /// Backoff after a faulted read.
    pub read_retry_backoff: Duration,
    /// Gap between a successful write and its first verify read.
    pub post_write_settle: Duration,
    /// Gap between soak iterations.
    pub inter_message_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            write_attempts: budget::WRITE_ATTEMPTS,
            verify_attempts: budget::VERIFY_ATTEMPTS,
            txn_attempts: budget::TXN_ATTEMPTS,
            read_attempts: budget::READ_ATTEMPTS,
            write_retry_backoff: Duration::from_micros(settle::WRITE_RETRY_US),
            read_retry_backoff: Duration::from_micros(settle::READ_RETRY_US),
            post_write_settle: Duration::from_micros(settle::POST_WRITE_US),
            inter_message_delay: Duration::from_micros(settle::INTER_MESSAGE_US),
        }
    }
}

impl RetryPolicy {
    /// Default budgets with every delay zeroed — simulated buses do not
    /// need settle time.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            write_retry_backoff: Duration::ZERO,
            read_retry_backoff: Duration::ZERO,
            post_write_settle: Duration::ZERO,
            inter_message_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// How a read-only transaction judges the bytes it receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadCheck {
    /// Any successfully read frame is accepted.
    #[default]
    None,
    /// The frame must pass the profile's embedded-checksum self-check.
    Embedded,
}

/// Retry state for one write transaction. `round` counts write+verify
/// rounds, `attempt` counts physical operations within the phase; both
/// are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Writing { round: u8, attempt: u8 },
    Verifying { round: u8, attempt: u8 },
    Retrying { round: u8 },
    Done,
    Failed,
}

/// The transaction engine: owns a transport, a protocol profile, a retry
/// policy, and the process's sequence counter.
///
/// Transaction calls never return `Err` — a fault that survives the whole
/// budget is an *outcome*, and the caller decides what it means for the
/// run.
#[derive(Debug)]
pub struct Exerciser<B> {
    bus: B,
    profile: TxnProfile,
    retry: RetryPolicy,
    seq: SequenceCounter,
    /// Diagnostic id, one per logical transaction, for correlating log
    /// events. Unrelated to the on-wire sequence byte.
    txn_id: u64,
}

impl<B: BlockBus> Exerciser<B> {
    /// Engine over `bus` speaking `profile`, with the default retry
    /// policy and a sequence counter starting at zero.
    pub fn new(bus: B, profile: TxnProfile) -> Self {
        Self {
            bus,
            profile,
            retry: RetryPolicy::default(),
            seq: SequenceCounter::new(),
            txn_id: 0,
        }
    }

    /// Replaces the retry policy (builder form).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Injects a sequence counter (builder form). The counter is
    /// single-owner: it lives here and nothing else issues values.
    #[must_use]
    pub fn with_sequence(mut self, seq: SequenceCounter) -> Self {
        self.seq = seq;
        self
    }

    /// The profile this engine speaks.
    #[must_use]
    pub const fn profile(&self) -> TxnProfile {
        self.profile
    }

    /// The engine's retry policy.
    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Most recently issued sequence value.
    #[must_use]
    pub const fn sequence(&self) -> u8 {
        self.seq.current()
    }

    /// Borrows the transport.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Consumes the engine, returning the transport.
    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Reads `len` bytes from `reg` on `addr`, retrying transient faults
    /// and self-check failures within the read budget.
    ///
    /// Every attempt consumes one budget unit whatever went wrong.
    /// Exhaustion classifies as [`TxnOutcome::DataMismatch`] if at least
    /// one well-formed frame failed the check, otherwise
    /// [`TxnOutcome::TransientFault`].
    ///
    /// # Panics
    ///
    /// If `len` is zero or exceeds the 32-byte block limit.
    pub fn read_and_validate(
        &mut self,
        addr: DeviceAddr,
        reg: u8,
        len: usize,
        check: ReadCheck,
    ) -> TxnOutcome {
        assert!(
            len != 0 && len <= MAX_BLOCK_LEN,
            "read length must fit one {MAX_BLOCK_LEN}-byte block transfer"
        );

        let txn = self.next_txn_id();
        let mut tally = FaultTally::default();
        for attempt in 1..=self.retry.read_attempts {
            match self.bus.read_block(addr, reg, len) {
                Ok(data) => {
                    let accepted = match check {
                        ReadCheck::None => true,
                        ReadCheck::Embedded => self.profile.self_check(&data),
                    };
                    if accepted {
                        tracing::trace!("txn {txn} {addr}: read ok (attempt {attempt})");
                        return TxnOutcome::Success {
                            payload: data,
                            tally,
                        };
                    }
                    tally.data_mismatches += 1;
                    tracing::debug!(
                        "txn {txn} {addr}: self-check failed on {data:02x?} (attempt {attempt})"
                    );
                }
                Err(fault) => {
                    tally.read_faults += 1;
                    tracing::debug!("txn {txn} {addr}: {fault} (attempt {attempt})");
                    pause(self.retry.read_retry_backoff);
                }
            }
        }
        let outcome = if tally.data_mismatches > 0 {
            TxnOutcome::DataMismatch { tally }
        } else {
            TxnOutcome::TransientFault { tally }
        };
        tracing::warn!(
            "txn {txn} {addr}: read gave up after {} attempts ({})",
            self.retry.read_attempts,
            outcome.label()
        );
        outcome
    }

    /// Writes `payload` to `reg` on `addr` and verifies it landed,
    /// retrying each phase within its budget.
    ///
    /// The sequence byte (for profiles that carry one) is drawn exactly
    /// once, before the first round; retries re-send the same byte.
    /// Verification only ever follows a successful write. Counters
    /// accumulate across all attempts and are reported in full whatever
    /// the classification.
    ///
    /// # Panics
    ///
    /// If `payload` is empty, if framing it (or its echo readback) would
    /// exceed the 32-byte block limit, or if the profile asks for
    /// status-register verification without tagging a sequence byte.
    pub fn write_and_verify(&mut self, addr: DeviceAddr, reg: u8, payload: &[u8]) -> TxnOutcome {
        assert!(!payload.is_empty(), "write payload must not be empty");
        assert!(
            self.profile.frame_len(payload.len()) <= MAX_BLOCK_LEN
                && self.profile.readback_len(payload.len()) <= MAX_BLOCK_LEN,
            "framed payload exceeds the {MAX_BLOCK_LEN}-byte block limit"
        );
        assert!(
            self.profile.verify != VerifyMode::StatusSequence || self.profile.tag_sequence,
            "status-register verification needs the frame's sequence byte"
        );

        let txn = self.next_txn_id();
        let seq = if self.profile.wants_sequence() {
            Some(self.seq.next())
        } else {
            None
        };
        let frame = self.profile.write_frame(reg, payload, seq);
        let expected = self.profile.expected_readback(reg, payload, seq);
        let verify_reg = self.profile.verify_register(reg);

        let mut tally = FaultTally::default();
        let mut state = TxnState::Writing { round: 1, attempt: 1 };
        loop {
            state = match state {
                TxnState::Writing { round, attempt } => match self.bus.write_block(addr, reg, &frame) {
                    Ok(()) => {
                        pause(self.retry.post_write_settle);
                        TxnState::Verifying { round, attempt: 1 }
                    }
                    Err(fault) => {
                        tally.write_faults += 1;
                        tracing::debug!(
                            "txn {txn} {addr}: {fault} (round {round}, write attempt {attempt})"
                        );
                        pause(self.retry.write_retry_backoff);
                        if attempt < self.retry.write_attempts {
                            TxnState::Writing {
                                round,
                                attempt: attempt + 1,
                            }
                        } else {
                            TxnState::Retrying { round }
                        }
                    }
                },
                TxnState::Verifying { round, attempt } => {
                    match self.bus.read_block(addr, verify_reg, expected.len()) {
                        Ok(data) if data == expected => TxnState::Done,
                        Ok(data) => {
                            tally.data_mismatches += 1;
                            tracing::debug!(
                                "txn {txn} {addr}: readback mismatch, got {data:02x?} (round {round}, verify attempt {attempt})"
                            );
                            if attempt < self.retry.verify_attempts {
                                TxnState::Verifying {
                                    round,
                                    attempt: attempt + 1,
                                }
                            } else {
                                TxnState::Retrying { round }
                            }
                        }
                        Err(fault) => {
                            tally.read_faults += 1;
                            tracing::debug!(
                                "txn {txn} {addr}: {fault} (round {round}, verify attempt {attempt})"
                            );
                            pause(self.retry.read_retry_backoff);
                            if attempt < self.retry.verify_attempts {
                                TxnState::Verifying {
                                    round,
                                    attempt: attempt + 1,
                                }
                            } else {
                                TxnState::Retrying { round }
                            }
                        }
                    }
                }
                TxnState::Retrying { round } => {
                    if round < self.retry.txn_attempts {
                        TxnState::Writing {
                            round: round + 1,
                            attempt: 1,
                        }
                    } else {
                        TxnState::Failed
                    }
                }
                TxnState::Done => {
                    tracing::trace!("txn {txn} {addr}: verified ({tally})");
                    return TxnOutcome::Success {
                        payload: expected,
                        tally,
                    };
                }
                TxnState::Failed => {
                    tracing::warn!(
                        "txn {txn} {addr}: uncorrectable after {} rounds ({tally})",
                        self.retry.txn_attempts
                    );
                    return TxnOutcome::Uncorrectable { tally };
                }
            };
        }
    }

    fn next_txn_id(&mut self) -> u64 {
        self.txn_id += 1;
        self.txn_id
    }
}
