//! Runtime peripheral discovery.
//!
//! Probes the assignable address window with one-byte status reads and
//! keeps whoever answers. No hardcoded device lists — a transient fault is
//! exactly how an empty address responds, so a single probe per address is
//! the whole test (the same convention `i2cdetect` uses).

use busloop_protocol::{regs, DeviceAddr};

use crate::bus::BlockBus;
use crate::error::{BusloopError, Result};

/// Probes every assignable address and returns the responders in address
/// order.
///
/// # Errors
///
/// Returns `BusloopError::NoDevicesFound` if nothing answers.
pub fn discover<B: BlockBus>(bus: &mut B) -> Result<Vec<DeviceAddr>> {
    discover_range(bus, DeviceAddr::scan_range())
}

/// Probes an explicit address list.
///
/// # Errors
///
/// Returns `BusloopError::NoDevicesFound` if nothing answers.
pub fn discover_range<B, I>(bus: &mut B, addrs: I) -> Result<Vec<DeviceAddr>>
where
    B: BlockBus,
    I: IntoIterator<Item = DeviceAddr>,
{
    tracing::info!("Probing for loopback peripherals...");

    let mut found = Vec::new();
    for addr in addrs {
        match bus.read_block(addr, regs::STATUS_REG, 1) {
            Ok(_) => {
                tracing::info!("Device responding at {addr}");
                found.push(addr);
            }
            Err(fault) => {
                tracing::trace!("{addr}: {fault}");
            }
        }
    }

    if found.is_empty() {
        tracing::error!("No responding devices found");
        return Err(BusloopError::NoDevicesFound);
    }

    tracing::info!("Discovered {} device(s)", found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;

    #[test]
    fn finds_exactly_the_devices_present() {
        let a = DeviceAddr::new(0x09).unwrap();
        let b = DeviceAddr::new(0x1a).unwrap();
        let mut bus = SimBus::new().with_device(a).with_device(b);
        let found = discover(&mut bus).unwrap();
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn empty_bus_is_an_error() {
        let mut bus = SimBus::new();
        match discover(&mut bus) {
            Err(BusloopError::NoDevicesFound) => {}
            other => panic!("expected NoDevicesFound, got {other:?}"),
        }
    }
}
