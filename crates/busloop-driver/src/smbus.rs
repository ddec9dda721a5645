//! Hardware transport over the kernel's i2c-dev interface.
//!
//! Talks to `/dev/i2c-N` with raw ioctls: `I2C_FUNCS` once at open to
//! check the adapter can do block transfers, `I2C_SLAVE` to aim at a
//! peripheral, and `I2C_SMBUS` for the transfers themselves. The ioctl
//! structs mirror `<linux/i2c-dev.h>`; that ABI is stable.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use busloop_protocol::{regs, DeviceAddr};

use crate::bus::{BlockBus, BusResult, TransientFault};
use crate::error::{BusloopError, Result};

// i2c-dev ioctl numbers and SMBus protocol constants, from
// <linux/i2c-dev.h> and <linux/i2c.h>.
const I2C_SLAVE: libc::c_ulong = 0x0703;
const I2C_FUNCS: libc::c_ulong = 0x0705;
const I2C_SMBUS: libc::c_ulong = 0x0720;

const I2C_SMBUS_WRITE: u8 = 0;
const I2C_SMBUS_READ: u8 = 1;
const I2C_SMBUS_I2C_BLOCK_DATA: u32 = 8;

const I2C_FUNC_SMBUS_READ_I2C_BLOCK: libc::c_ulong = 0x0400_0000;
const I2C_FUNC_SMBUS_WRITE_I2C_BLOCK: libc::c_ulong = 0x0800_0000;

/// Kernel block buffer: one length byte + 32 data bytes + one spare.
const BLOCK_BUF_LEN: usize = regs::MAX_BLOCK_LEN + 2;

/// Mirror of the kernel's `union i2c_smbus_data`, block member only. The
/// block array is the union's largest member, so the layout and size
/// match the kernel's view.
#[repr(C)]
struct SmbusData {
    block: [u8; BLOCK_BUF_LEN],
}

/// Mirror of the kernel's `struct i2c_smbus_ioctl_data`.
#[repr(C)]
struct SmbusIoctlData {
    read_write: u8,
    command: u8,
    size: u32,
    data: *mut SmbusData,
}

/// Block transport over one `/dev/i2c-N` adapter.
///
/// Every transfer failure comes back as a [`TransientFault`]; only setup
/// problems (missing node, adapter without block support) are hard
/// errors.
#[derive(Debug)]
pub struct LinuxSmbus {
    file: File,
    path: PathBuf,
    /// Peripheral currently targeted via `I2C_SLAVE`. The kernel keeps
    /// this per open file description, so it is only re-issued on change.
    selected: Option<DeviceAddr>,
}

impl LinuxSmbus {
    /// Opens bus adapter `n` as `/dev/i2c-{n}`.
    ///
    /// # Errors
    ///
    /// `BusNotFound` if the device node is missing,
    /// `BlockTransfersUnsupported` if the adapter cannot do SMBus block
    /// transfers, `Io` for anything else.
    pub fn open(bus: u32) -> Result<Self> {
        Self::open_path(format!("/dev/i2c-{bus}"))
    }

    /// Opens an explicit adapter path, checks its functionality mask, and
    /// waits the settle delay so freshly powered peripherals are up
    /// before the first transfer.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(BusloopError::BusNotFound { path });
        }
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let bus = Self {
            file,
            path,
            selected: None,
        };

        let funcs = bus.funcs()?;
        const NEEDED: libc::c_ulong = I2C_FUNC_SMBUS_READ_I2C_BLOCK | I2C_FUNC_SMBUS_WRITE_I2C_BLOCK;
        if funcs & NEEDED != NEEDED {
            return Err(BusloopError::BlockTransfersUnsupported {
                path: bus.path,
                funcs: u64::from(funcs),
            });
        }

        tracing::info!("Opened {} (funcs 0x{funcs:08x})", bus.path.display());
        thread::sleep(Duration::from_millis(regs::settle::BUS_OPEN_MS));
        Ok(bus)
    }

    /// Device node this bus was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adapter functionality bitmask via `I2C_FUNCS`.
    fn funcs(&self) -> Result<libc::c_ulong> {
        let mut funcs: libc::c_ulong = 0;
        // SAFETY: I2C_FUNCS writes one c_ulong through the pointer.
        // Invariants: (1) fd open for the lifetime of the call; (2) funcs
        // lives across the call and is sized for the write.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), I2C_FUNCS, &mut funcs) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(funcs)
    }

    /// Aims subsequent transfers at `addr`.
    fn select(&mut self, addr: DeviceAddr) -> io::Result<()> {
        if self.selected == Some(addr) {
            return Ok(());
        }
        // SAFETY: I2C_SLAVE takes the address in the argument word
        // directly; no pointers are involved.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SLAVE,
                libc::c_ulong::from(addr.get()),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        self.selected = Some(addr);
        Ok(())
    }

    /// One SMBus I2C-block transfer through `I2C_SMBUS`.
    fn block_xfer(&self, read_write: u8, command: u8, data: &mut SmbusData) -> io::Result<()> {
        let mut args = SmbusIoctlData {
            read_write,
            command,
            size: I2C_SMBUS_I2C_BLOCK_DATA,
            data,
        };
        // SAFETY: I2C_SMBUS reads args, then reads or fills data.block
        // within its BLOCK_BUF_LEN bounds (block[0] carries the length in
        // both directions). Invariants: (1) fd open; (2) args and data
        // outlive the call; (3) layouts match <linux/i2c-dev.h>.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), I2C_SMBUS, &mut args) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl BlockBus for LinuxSmbus {
    #[allow(clippy::cast_possible_truncation)] // length bounded by MAX_BLOCK_LEN
    fn write_block(&mut self, addr: DeviceAddr, reg: u8, data: &[u8]) -> BusResult<()> {
        debug_assert!(!data.is_empty() && data.len() <= regs::MAX_BLOCK_LEN);
        self.select(addr)
            .map_err(|e| TransientFault::write(addr, reg, e))?;

        let mut block = SmbusData {
            block: [0; BLOCK_BUF_LEN],
        };
        block.block[0] = data.len() as u8;
        block.block[1..=data.len()].copy_from_slice(data);
        self.block_xfer(I2C_SMBUS_WRITE, reg, &mut block)
            .map_err(|e| TransientFault::write(addr, reg, e))?;
        tracing::trace!("wrote {} byte(s) to {addr}/reg 0x{reg:02x}", data.len());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // length bounded by MAX_BLOCK_LEN
    fn read_block(&mut self, addr: DeviceAddr, reg: u8, len: usize) -> BusResult<Vec<u8>> {
        debug_assert!(len > 0 && len <= regs::MAX_BLOCK_LEN);
        self.select(addr)
            .map_err(|e| TransientFault::read(addr, reg, e))?;

        let mut block = SmbusData {
            block: [0; BLOCK_BUF_LEN],
        };
        block.block[0] = len as u8;
        self.block_xfer(I2C_SMBUS_READ, reg, &mut block)
            .map_err(|e| TransientFault::read(addr, reg, e))?;
        let got = usize::from(block.block[0]).min(len);
        tracing::trace!("read {got} byte(s) from {addr}/reg 0x{reg:02x}");
        Ok(block.block[1..=got].to_vec())
    }
}
