//! Reliability exerciser for a byte-oriented controller↔peripheral bus.
//!
//! Wraps fault-prone block-transfer primitives in a write-then-verify
//! transaction protocol — checksum validation, optional sequence
//! numbering, bounded nested retry — and aggregates per-device statistics
//! so a long soak run yields an accurate reliability profile of the link.
//!
//! # Transport hierarchy
//!
//! ```text
//! Hardware:   LinuxSmbus — /dev/i2c-N via I2C_SLAVE / I2C_SMBUS ioctls
//! Simulated:  SimBus     — in-memory echo peripherals + scripted faults
//! ```
//!
//! Anything implementing [`BlockBus`] plugs into the same engine.
//!
//! # Quick start
//!
//! ```
//! use busloop_driver::{Exerciser, RetryPolicy, SimBus};
//! use busloop_protocol::{regs, DeviceAddr, TxnProfile};
//!
//! let addr = DeviceAddr::new(0x09).expect("assignable address");
//! let bus = SimBus::new().with_device(addr);
//! let mut engine = Exerciser::new(bus, TxnProfile::echo_plain())
//!     .with_retry(RetryPolicy::instant());
//!
//! let outcome = engine.write_and_verify(addr, regs::LOOPBACK_REG, &[10, 11, 12]);
//! assert!(outcome.is_success());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod bus;
mod discovery;
mod error;
mod outcome;
mod sim;
mod smbus;
mod soak;
mod stats;
mod txn;

pub use bus::{BlockBus, BusResult, TransferDir, TransientFault};
pub use discovery::{discover, discover_range};
pub use error::{BusloopError, Result};
pub use outcome::{FaultTally, TxnOutcome};
pub use sim::{FaultPlan, FaultWindow, SimBus};
pub use smbus::LinuxSmbus;
pub use soak::{rolling_payload, Progress, RunReport, SoakConfig, SoakRunner, TestKind};
pub use stats::RunStats;
pub use txn::{Exerciser, ReadCheck, RetryPolicy};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        discover, BlockBus, BusloopError, Exerciser, FaultPlan, FaultWindow, LinuxSmbus,
        Progress, ReadCheck, Result, RetryPolicy, RunReport, RunStats, SimBus, SoakConfig,
        SoakRunner, TestKind, TxnOutcome,
    };
    pub use busloop_protocol::{regs, DeviceAddr, SequenceCounter, TxnProfile};
}
