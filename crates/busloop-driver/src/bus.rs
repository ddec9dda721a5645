//! The block-transfer seam every transport implements.

use std::fmt;
use std::io;

use busloop_protocol::DeviceAddr;
use thiserror::Error;

/// Result of one bus primitive call.
pub type BusResult<T> = std::result::Result<T, TransientFault>;

/// Direction of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDir {
    /// Block read from a peripheral register.
    Read,
    /// Block write to a peripheral register.
    Write,
}

impl fmt::Display for TransferDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// One failed block transfer, expected to clear on retry.
///
/// Every failure mode the bus can produce (NAK, lost arbitration, adapter
/// timeout) surfaces uniformly as this; the engine never sees partial
/// bytes, only a whole transfer that did not happen.
#[derive(Debug, Error)]
#[error("transient {dir} fault at {addr}/reg 0x{reg:02x}: {source}")]
pub struct TransientFault {
    /// Direction of the failed transfer.
    pub dir: TransferDir,
    /// Peripheral the transfer addressed.
    pub addr: DeviceAddr,
    /// Register the transfer addressed.
    pub reg: u8,
    /// Underlying cause.
    #[source]
    pub source: io::Error,
}

impl TransientFault {
    /// A failed read.
    #[must_use]
    pub fn read(addr: DeviceAddr, reg: u8, source: io::Error) -> Self {
        Self {
            dir: TransferDir::Read,
            addr,
            reg,
            source,
        }
    }

    /// A failed write.
    #[must_use]
    pub fn write(addr: DeviceAddr, reg: u8, source: io::Error) -> Self {
        Self {
            dir: TransferDir::Write,
            addr,
            reg,
            source,
        }
    }
}

/// Block-transfer primitives.
///
/// The transaction engine assumes nothing about a transport beyond these
/// two calls; reliability is built above them, not inside them.
pub trait BlockBus {
    /// Writes `data` as one block to `reg` on `addr`.
    ///
    /// # Errors
    ///
    /// A [`TransientFault`] for any failure; the transfer either happened
    /// in full or not at all.
    fn write_block(&mut self, addr: DeviceAddr, reg: u8, data: &[u8]) -> BusResult<()>;

    /// Reads a block of up to `len` bytes from `reg` on `addr`.
    ///
    /// # Errors
    ///
    /// A [`TransientFault`] for any failure.
    fn read_block(&mut self, addr: DeviceAddr, reg: u8, len: usize) -> BusResult<Vec<u8>>;
}
