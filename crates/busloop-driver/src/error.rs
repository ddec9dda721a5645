//! Error types for busloop driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for busloop operations
pub type Result<T> = std::result::Result<T, BusloopError>;

/// Errors that can occur while setting up or driving a run.
///
/// Transient bus faults are deliberately not here: inside a transaction
/// they are expected data, consumed by the retry engine and reported in
/// aggregate. See [`TransientFault`](crate::TransientFault).
#[derive(Debug, Error)]
pub enum BusloopError {
    /// Bus adapter device node is missing
    #[error("Bus adapter not found: {path}")]
    BusNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Adapter cannot do SMBus block transfers
    #[error("Adapter {path} lacks SMBus block-transfer support (funcs 0x{funcs:08x})")]
    BlockTransfersUnsupported {
        /// Adapter that was probed
        path: PathBuf,
        /// Functionality bitmask the adapter reported
        funcs: u64,
    },

    /// Address outside the assignable 7-bit range
    #[error("Device address 0x{raw:02x} outside the assignable range 0x08..=0x77")]
    InvalidAddress {
        /// Raw address as given
        raw: u8,
    },

    /// No responding peripherals on the bus
    #[error("No responding devices found")]
    NoDevicesFound,

    /// I/O error during setup
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl BusloopError {
    /// Create a bus-not-found error
    pub fn bus_not_found(path: impl Into<PathBuf>) -> Self {
        Self::BusNotFound { path: path.into() }
    }

    /// Create an invalid-address error
    #[must_use]
    pub const fn invalid_address(raw: u8) -> Self {
        Self::InvalidAddress { raw }
    }
}
