//! Long-run soak driver.
//!
//! Feeds one transaction shape through the engine for a configured
//! iteration count across a set of target devices, folding every outcome
//! into per-device statistics and reporting progress after each
//! transaction. The old bench rig showed a live table and a countdown
//! while this ran; the observer callback carries the same information
//! without binding the driver to any surface.

use std::collections::BTreeMap;

use busloop_protocol::{regs, DeviceAddr};

use crate::bus::BlockBus;
use crate::stats::RunStats;
use crate::txn::{pause, Exerciser, ReadCheck};

/// Which transaction shape a run exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    /// Read-only: block reads of `len` bytes from `reg`.
    ReadValidate {
        /// Source register.
        reg: u8,
        /// Bytes per read.
        len: usize,
        /// Validation applied to each frame.
        check: ReadCheck,
    },
    /// Write-then-verify messages to `reg`.
    WriteVerify {
        /// Target register.
        reg: u8,
        /// Payload bytes per message.
        payload_len: usize,
    },
}

impl TestKind {
    /// Stock read-only test: both status bytes, unvalidated.
    #[must_use]
    pub const fn status_read() -> Self {
        Self::ReadValidate {
            reg: regs::STATUS_REG,
            len: regs::STATUS_LEN,
            check: ReadCheck::None,
        }
    }

    /// Stock loopback test: three payload bytes to the data register.
    #[must_use]
    pub const fn loopback_write() -> Self {
        Self::WriteVerify {
            reg: regs::LOOPBACK_REG,
            payload_len: regs::DEFAULT_PAYLOAD_LEN,
        }
    }
}

/// One soak run's shape: what to send and how many times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoakConfig {
    /// Transaction shape.
    pub kind: TestKind,
    /// Messages per device.
    pub iterations: u32,
}

/// Progress snapshot handed to the observer after every transaction.
#[derive(Debug)]
pub struct Progress<'a> {
    /// 1-based iteration this transaction belonged to.
    pub iteration: u32,
    /// Iterations still to run after this one.
    pub remaining: u32,
    /// Device the transaction addressed.
    pub device: DeviceAddr,
    /// That device's cumulative statistics so far.
    pub stats: &'a RunStats,
}

/// Per-device statistics for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    per_device: BTreeMap<DeviceAddr, RunStats>,
}

impl RunReport {
    /// Per-device statistics in address order.
    pub fn devices(&self) -> impl Iterator<Item = (DeviceAddr, &RunStats)> {
        self.per_device.iter().map(|(addr, stats)| (*addr, stats))
    }

    /// Statistics for one device.
    #[must_use]
    pub fn device(&self, addr: DeviceAddr) -> Option<&RunStats> {
        self.per_device.get(&addr)
    }

    /// All devices summed.
    #[must_use]
    pub fn totals(&self) -> RunStats {
        let mut totals = RunStats::default();
        for stats in self.per_device.values() {
            totals.merge(stats);
        }
        totals
    }
}

/// Deterministic payload for iteration `i`: `[i, i+1, i+2, …]` mod 256.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // both operands reduced mod 256 first
pub fn rolling_payload(iteration: u32, len: usize) -> Vec<u8> {
    let base = (iteration % 256) as u8;
    (0..len).map(|k| base.wrapping_add((k % 256) as u8)).collect()
}

/// Runs one configured test across a device set.
#[derive(Debug)]
pub struct SoakRunner<B> {
    exerciser: Exerciser<B>,
    config: SoakConfig,
}

impl<B: BlockBus> SoakRunner<B> {
    /// Runner over an engine and a run shape.
    pub fn new(exerciser: Exerciser<B>, config: SoakConfig) -> Self {
        Self { exerciser, config }
    }

    /// Runs the full soak, invoking `observe` after every transaction.
    ///
    /// Iterations are the outer loop, so multi-device runs interleave
    /// devices instead of finishing one before starting the next — the
    /// iteration payload is identical across devices within an iteration.
    pub fn run<F>(&mut self, devices: &[DeviceAddr], mut observe: F) -> RunReport
    where
        F: FnMut(&Progress<'_>),
    {
        let total = self.config.iterations;
        tracing::info!(
            "Soak start: {:?}, {total} iteration(s), {} device(s)",
            self.config.kind,
            devices.len()
        );

        let mut report = RunReport::default();
        for iteration in 1..=total {
            for &device in devices {
                let outcome = match self.config.kind {
                    TestKind::ReadValidate { reg, len, check } => {
                        self.exerciser.read_and_validate(device, reg, len, check)
                    }
                    TestKind::WriteVerify { reg, payload_len } => {
                        let payload = rolling_payload(iteration - 1, payload_len);
                        self.exerciser.write_and_verify(device, reg, &payload)
                    }
                };
                let stats = report.per_device.entry(device).or_default();
                stats.record(&outcome);
                observe(&Progress {
                    iteration,
                    remaining: total - iteration,
                    device,
                    stats,
                });
            }
            pause(self.exerciser.retry().inter_message_delay);
        }

        for (device, stats) in &report.per_device {
            if stats.is_clean() {
                tracing::info!("{device}: clean — {stats}");
            } else {
                tracing::warn!("{device}: {stats}");
            }
        }
        report
    }

    /// Consumes the runner, returning the engine.
    pub fn into_exerciser(self) -> Exerciser<B> {
        self.exerciser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{FaultPlan, SimBus};
    use crate::txn::RetryPolicy;
    use busloop_protocol::TxnProfile;

    fn runner(devices: &[DeviceAddr], kind: TestKind, iterations: u32) -> SoakRunner<SimBus> {
        let mut bus = SimBus::new().with_fault_plan(FaultPlan::clean());
        for &addr in devices {
            bus.add_device(addr);
        }
        let exerciser =
            Exerciser::new(bus, TxnProfile::echo_plain()).with_retry(RetryPolicy::instant());
        SoakRunner::new(exerciser, SoakConfig { kind, iterations })
    }

    #[test]
    fn rolling_payload_follows_the_iteration_index() {
        assert_eq!(rolling_payload(0, 3), vec![0, 1, 2]);
        assert_eq!(rolling_payload(7, 3), vec![7, 8, 9]);
        assert_eq!(rolling_payload(255, 3), vec![255, 0, 1]);
        assert_eq!(rolling_payload(256, 3), vec![0, 1, 2]);
    }

    #[test]
    fn every_device_gets_every_iteration() {
        let devices = [DeviceAddr::new(0x09).unwrap(), DeviceAddr::new(0x1a).unwrap()];
        let mut runner = runner(&devices, TestKind::loopback_write(), 5);
        let report = runner.run(&devices, |_| {});
        for &addr in &devices {
            let stats = report.device(addr).expect("device in report");
            assert_eq!(stats.messages_attempted, 5);
            assert!(stats.is_clean());
        }
        assert_eq!(report.totals().messages_attempted, 10);
    }

    #[test]
    fn observer_sees_every_transaction_and_a_countdown() {
        let devices = [DeviceAddr::new(0x09).unwrap()];
        let mut runner = runner(&devices, TestKind::status_read(), 4);
        let mut seen = Vec::new();
        runner.run(&devices, |progress| {
            seen.push((progress.iteration, progress.remaining));
        });
        assert_eq!(seen, vec![(1, 3), (2, 2), (3, 1), (4, 0)]);
    }

    #[test]
    fn report_lists_devices_in_address_order() {
        let hi = DeviceAddr::new(0x20).unwrap();
        let lo = DeviceAddr::new(0x09).unwrap();
        let mut runner = runner(&[hi, lo], TestKind::status_read(), 1);
        let report = runner.run(&[hi, lo], |_| {});
        let order: Vec<DeviceAddr> = report.devices().map(|(addr, _)| addr).collect();
        assert_eq!(order, vec![lo, hi]);
    }
}
