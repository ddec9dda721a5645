//! 7-bit device addressing.
//!
//! The bus uses plain 7-bit addressing. Addresses `0x00..=0x07` and
//! `0x78..=0x7f` are reserved by the bus specification (general call,
//! 10-bit prefixes, future use), so probes and peripherals live in
//! `0x08..=0x77` — the same window `i2cdetect` scans by default.

use core::fmt;

/// Validated 7-bit bus address of one peripheral.
///
/// Construction via [`DeviceAddr::new`] rejects the reserved ranges, so a
/// `DeviceAddr` held anywhere in the system is always safe to put on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceAddr(u8);

impl DeviceAddr {
    /// Lowest assignable address (`0x08`).
    pub const FIRST: DeviceAddr = DeviceAddr(0x08);

    /// Highest assignable address (`0x77`).
    pub const LAST: DeviceAddr = DeviceAddr(0x77);

    /// Wraps a raw address, rejecting the reserved ranges.
    #[must_use]
    pub const fn new(raw: u8) -> Option<Self> {
        if raw >= Self::FIRST.0 && raw <= Self::LAST.0 {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// The raw 7-bit address.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Every assignable address in probe order.
    pub fn scan_range() -> impl Iterator<Item = DeviceAddr> {
        (Self::FIRST.0..=Self::LAST.0).map(DeviceAddr)
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl From<DeviceAddr> for u8 {
    fn from(addr: DeviceAddr) -> u8 {
        addr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_assignable_range() {
        assert_eq!(DeviceAddr::new(0x08), Some(DeviceAddr::FIRST));
        assert_eq!(DeviceAddr::new(0x77), Some(DeviceAddr::LAST));
        assert!(DeviceAddr::new(0x42).is_some());
    }

    #[test]
    fn rejects_reserved_ranges() {
        assert_eq!(DeviceAddr::new(0x00), None);
        assert_eq!(DeviceAddr::new(0x07), None);
        assert_eq!(DeviceAddr::new(0x78), None);
        assert_eq!(DeviceAddr::new(0xff), None);
    }

    #[test]
    fn scan_range_covers_exactly_the_window() {
        let all: Vec<_> = DeviceAddr::scan_range().collect();
        assert_eq!(all.len(), 0x77 - 0x08 + 1);
        assert_eq!(all.first(), Some(&DeviceAddr::FIRST));
        assert_eq!(all.last(), Some(&DeviceAddr::LAST));
    }

    #[test]
    fn displays_as_hex() {
        let addr = DeviceAddr::new(0x09).unwrap();
        assert_eq!(addr.to_string(), "0x09");
    }
}
