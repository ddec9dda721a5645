// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory bus with scripted fault injection.
//!
//! Models the echo peripherals well enough to exercise every engine path
//! without hardware: block writes are retained per register, data-register
//! reads echo `reg ++ stored frame`, status reads return the latched
//! status bytes. A [`FaultPlan`] injects transient faults and corruption
//! at chosen points, deterministically (no RNG), so tests can assert exact
//! counter values.

use std::collections::BTreeMap;
use std::io;

use busloop_protocol::{regs, DeviceAddr};

use crate::bus::{BlockBus, BusResult, TransientFault};

/// When a scripted failure fires, in 1-based operation ordinals counted
/// per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultWindow {
    /// Never fires.
    #[default]
    Never,
    /// Fires on operations `1..=n`.
    First(u32),
    /// Fires on every k-th operation.
    EveryNth(u32),
    /// Fires on every operation.
    Always,
}

impl FaultWindow {
    fn hits(self, ordinal: u64) -> bool {
        match self {
            Self::Never => false,
            Self::First(n) => ordinal <= u64::from(n),
            Self::EveryNth(k) => k > 0 && ordinal % u64::from(k) == 0,
            Self::Always => true,
        }
    }
}

/// Scripted misbehaviour for a simulated run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Write operations that fault.
    pub write_faults: FaultWindow,
    /// Read operations that fault.
    pub read_faults: FaultWindow,
    /// Read operations that succeed but return a flipped final byte.
    pub corrupt_reads: FaultWindow,
}

impl FaultPlan {
    /// A bus that never misbehaves.
    #[must_use]
    pub const fn clean() -> Self {
        Self {
            write_faults: FaultWindow::Never,
            read_faults: FaultWindow::Never,
            corrupt_reads: FaultWindow::Never,
        }
    }
}

/// One simulated echo peripheral.
///
/// Mimics the common firmware core: the last frame written to each
/// register is retained and echoed back behind the register address.
/// Byte 0 of every accepted data write is latched into status byte 0,
/// which is what the sequenced firmware does with the sequence byte.
#[derive(Debug, Clone)]
struct SimPeripheral {
    stored: BTreeMap<u8, Vec<u8>>,
    status: [u8; 2],
}

/// Firmware flags byte: device up and ready.
const STATUS_READY: u8 = 0x01;

impl SimPeripheral {
    fn new() -> Self {
        Self {
            stored: BTreeMap::new(),
            status: [0, STATUS_READY],
        }
    }

    fn accept_write(&mut self, reg: u8, frame: &[u8]) {
        if let Some(&first) = frame.first() {
            self.status[0] = first;
        }
        self.stored.insert(reg, frame.to_vec());
    }

    fn read(&self, reg: u8, len: usize) -> Vec<u8> {
        let mut out = if reg == regs::STATUS_REG {
            self.status.to_vec()
        } else {
            let mut echo = vec![reg];
            if let Some(frame) = self.stored.get(&reg) {
                echo.extend_from_slice(frame);
            }
            echo
        };
        out.resize(len, 0);
        out
    }
}

/// Simulated bus: a set of echo peripherals plus a fault plan.
///
/// Absent addresses fault on both directions, the same way an empty bus
/// address answers with a NAK.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    peripherals: BTreeMap<DeviceAddr, SimPeripheral>,
    plan: FaultPlan,
    writes_seen: u64,
    reads_seen: u64,
}

impl SimBus {
    /// Empty bus; every transfer faults until a device is added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an echo peripheral at `addr` (builder form).
    #[must_use]
    pub fn with_device(mut self, addr: DeviceAddr) -> Self {
        self.add_device(addr);
        self
    }

    /// Installs the fault plan (builder form).
    #[must_use]
    pub fn with_fault_plan(mut self, plan: FaultPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Adds an echo peripheral at `addr`.
    pub fn add_device(&mut self, addr: DeviceAddr) {
        self.peripherals.insert(addr, SimPeripheral::new());
    }

    /// Addresses of the simulated peripherals, in order.
    #[must_use]
    pub fn device_addrs(&self) -> Vec<DeviceAddr> {
        self.peripherals.keys().copied().collect()
    }

    /// Write operations seen so far, faulted ones included.
    #[must_use]
    pub const fn writes_seen(&self) -> u64 {
        self.writes_seen
    }

    /// Read operations seen so far, faulted ones included.
    #[must_use]
    pub const fn reads_seen(&self) -> u64 {
        self.reads_seen
    }

    fn injected() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "injected fault")
    }

    fn absent() -> io::Error {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no device at address")
    }
}

impl BlockBus for SimBus {
    fn write_block(&mut self, addr: DeviceAddr, reg: u8, data: &[u8]) -> BusResult<()> {
        self.writes_seen += 1;
        if self.plan.write_faults.hits(self.writes_seen) {
            return Err(TransientFault::write(addr, reg, Self::injected()));
        }
        let Some(peripheral) = self.peripherals.get_mut(&addr) else {
            return Err(TransientFault::write(addr, reg, Self::absent()));
        };
        peripheral.accept_write(reg, data);
        Ok(())
    }

    fn read_block(&mut self, addr: DeviceAddr, reg: u8, len: usize) -> BusResult<Vec<u8>> {
        self.reads_seen += 1;
        if self.plan.read_faults.hits(self.reads_seen) {
            return Err(TransientFault::read(addr, reg, Self::injected()));
        }
        let Some(peripheral) = self.peripherals.get(&addr) else {
            return Err(TransientFault::read(addr, reg, Self::absent()));
        };
        let mut data = peripheral.read(reg, len);
        if self.plan.corrupt_reads.hits(self.reads_seen) {
            if let Some(last) = data.last_mut() {
                *last ^= 0xff;
            }
        }
        Ok(data)
    }
}
