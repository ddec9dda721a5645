//! Wire-protocol model for the busloop link exerciser.
//!
//! This crate has **no dependencies** and **no bus access** — it is a pure
//! model of the loopback protocol spoken between the controller and the
//! echo peripherals: register map, frame layouts, checksum formulas,
//! sequence numbering, and the retry/timing constants every transport and
//! engine shares.
//!
//! Three firmware revisions are in the field; [`frame::TxnProfile`] captures
//! their differences as data so the transaction engine stays single-copy.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`addr`] | 7-bit device addressing and the probe scan range |
//! | [`regs`] | Peripheral register map, attempt budgets, settle timing |
//! | [`checksum`] | The two checksum formulas and frame validation |
//! | [`seq`] | Wrapping per-transaction sequence counter |
//! | [`frame`] | Protocol variants, frame building, expected readback |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod addr;
pub mod checksum;
pub mod frame;
pub mod regs;
pub mod seq;

pub use addr::DeviceAddr;
pub use checksum::ChecksumKind;
pub use frame::{TxnProfile, VerifyMode};
pub use seq::SequenceCounter;
