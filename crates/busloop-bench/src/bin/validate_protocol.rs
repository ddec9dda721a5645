// SPDX-License-Identifier: AGPL-3.0-only

//! Protocol Validation Suite
//!
//! Runs every deterministic protocol claim against the simulated bus.
//! No hardware is involved: everything here is about frame layout,
//! retry accounting and outcome classification, which must hold exactly
//! regardless of transport. For live-adapter runs use the `busloop` CLI.
//!
//! ## Validated claims
//!
//! | #  | Check            | Claim                                                |
//! |----|------------------|------------------------------------------------------|
//! | 1  | Plain frame      | `[10,11,12]` checksums to 33                         |
//! | 2  | Tagged frame     | seq 5 at reg 100 checksums to 118 (negated sum)      |
//! | 3  | Clean soak       | 256 messages count `{256,0,0,0,0}`, to the digit     |
//! | 4  | Fault recovery   | first-2 write faults recovered, counted exactly 2    |
//! | 5  | Mismatch bound   | hopeless bus burns 4x4 verify reads, no more         |
//! | 6  | Retry budget     | hopeless bus issues exactly 4 writes, 16 reads       |
//! | 7  | Sequence wrap    | 300 tagged messages stay clean across the 255→0 wrap |
//! | 8  | Status verify    | sequenced variant confirms via the status register   |
//! | 9  | Absent device    | probing silence classifies as a transient fault      |
//! | 10 | Discovery        | scan finds exactly the planted addresses, in order   |
//!
//! ## Reference wire vectors
//!
//!   plain  write [10,11,12]       → frame [10,11,12,33]
//!   tagged write [10,11,12] seq=5 → frame [5,10,11,12,118]
//!   echo readback                 → reg ++ frame
//!
//! ## Usage
//!
//!   cargo run --bin validate_protocol
//!   cargo run --bin validate_protocol -- --verbose

use anyhow::Result;
use busloop_driver::{
    discover, Exerciser, FaultPlan, FaultWindow, ReadCheck, RetryPolicy, RunStats, SimBus,
    SoakConfig, SoakRunner, TestKind, TxnOutcome,
};
use busloop_protocol::{regs, ChecksumKind, DeviceAddr, TxnProfile};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  busloop Protocol Validation Suite                           ║");
    println!("║  Frame layout, retry accounting, outcome classification      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Mode: simulated bus — deterministic, no hardware required");
    println!();

    let dev = DeviceAddr::new(0x09).expect("assignable address");
    let mut suite = ValidationSuite::new(verbose);

    // ── V1: plain frame vector ───────────────────────────────────────────────
    suite.run("V1: Plain frame — [10,11,12] checksums to 33", || {
        let profile = TxnProfile::echo_plain();
        let frame = profile.write_frame(regs::LOOPBACK_REG, &[10, 11, 12], None);
        let echo = profile.expected_readback(regs::LOOPBACK_REG, &[10, 11, 12], None);
        let passed = frame == [10, 11, 12, 33] && echo == [100, 10, 11, 12, 33];
        Ok(ValidationResult {
            passed,
            message: format!("frame {frame:?}  echo {echo:?}"),
        })
    });

    // ── V2: tagged frame vector ──────────────────────────────────────────────
    suite.run("V2: Tagged frame — seq 5 at reg 100 checksums to 118", || {
        let profile = TxnProfile::echo_tagged();
        let frame = profile.write_frame(regs::LOOPBACK_REG, &[10, 11, 12], Some(5));
        let cs = ChecksumKind::NegatedSum.compute(&[10, 11, 12], Some(100), Some(5));
        let passed = frame == [5, 10, 11, 12, 118] && cs == 118;
        Ok(ValidationResult {
            passed,
            message: format!("frame {frame:?}  checksum {cs}"),
        })
    });

    // ── V3: clean soak counts exactly ────────────────────────────────────────
    suite.run("V3: Clean soak — 256 messages count {256,0,0,0,0}", || {
        let report = soak(dev, FaultPlan::clean(), TxnProfile::echo_plain(), 256);
        let stats = report.device(dev).copied().unwrap_or_default();
        let want = RunStats {
            messages_attempted: 256,
            ..RunStats::default()
        };
        Ok(ValidationResult {
            passed: stats == want,
            message: format!("{stats}"),
        })
    });

    // ── V4: recovered faults are counted, not hidden ─────────────────────────
    suite.run("V4: Fault recovery — first-2 write faults cost 2, succeed", || {
        let plan = FaultPlan {
            write_faults: FaultWindow::First(2),
            read_faults: FaultWindow::Never,
            corrupt_reads: FaultWindow::Never,
        };
        let report = soak(dev, plan, TxnProfile::echo_plain(), 10);
        let stats = report.device(dev).copied().unwrap_or_default();
        let passed = stats.messages_attempted == 10
            && stats.write_faults == 2
            && stats.uncorrectable_errors == 0;
        Ok(ValidationResult {
            passed,
            message: format!("{stats}"),
        })
    });

    // ── V5: mismatch accounting on a hopeless bus ────────────────────────────
    suite.run("V5: Mismatch bound — corrupt bus logs 16 mismatches/message", || {
        let plan = FaultPlan {
            write_faults: FaultWindow::Never,
            read_faults: FaultWindow::Never,
            corrupt_reads: FaultWindow::Always,
        };
        let report = soak(dev, plan, TxnProfile::echo_plain(), 10);
        let stats = report.device(dev).copied().unwrap_or_default();
        let passed = stats.uncorrectable_errors == 10 && stats.data_mismatches == 160;
        Ok(ValidationResult {
            passed,
            message: format!("{stats}"),
        })
    });

    // ── V6: the retry budget is a hard ceiling ───────────────────────────────
    suite.run("V6: Retry budget — one doomed write: 4 writes, 16 reads", || {
        let plan = FaultPlan {
            write_faults: FaultWindow::Never,
            read_faults: FaultWindow::Never,
            corrupt_reads: FaultWindow::Always,
        };
        let bus = SimBus::new().with_device(dev).with_fault_plan(plan);
        let mut engine =
            Exerciser::new(bus, TxnProfile::echo_plain()).with_retry(RetryPolicy::instant());
        let outcome = engine.write_and_verify(dev, regs::LOOPBACK_REG, &[10, 11, 12]);
        let uncorrectable = matches!(outcome, TxnOutcome::Uncorrectable { .. });
        let bus = engine.into_bus();
        let passed = uncorrectable && bus.writes_seen() == 4 && bus.reads_seen() == 16;
        Ok(ValidationResult {
            passed,
            message: format!(
                "{}: {} writes, {} reads issued",
                outcome.label(),
                bus.writes_seen(),
                bus.reads_seen()
            ),
        })
    });

    // ── V7: sequence numbering across the wrap ───────────────────────────────
    suite.run("V7: Sequence wrap — 300 tagged messages, clean at 255→0", || {
        let bus = SimBus::new().with_device(dev);
        let engine =
            Exerciser::new(bus, TxnProfile::echo_tagged()).with_retry(RetryPolicy::instant());
        let mut runner = SoakRunner::new(
            engine,
            SoakConfig {
                kind: TestKind::loopback_write(),
                iterations: 300,
            },
        );
        let report = runner.run(&[dev], |_| {});
        let stats = report.device(dev).copied().unwrap_or_default();
        let seq = runner.into_exerciser().sequence();
        let passed = stats.is_clean() && stats.messages_attempted == 300 && seq == 44;
        Ok(ValidationResult {
            passed,
            message: format!("{stats}; counter at {seq} (300 mod 256)"),
        })
    });

    // ── V8: status-register verification path ────────────────────────────────
    suite.run("V8: Status verify — sequenced variant reads back reg 99", || {
        let profile = TxnProfile::status_sequenced();
        let routed = profile.verify_register(regs::LOOPBACK_REG) == regs::STATUS_REG;
        let report = soak(dev, FaultPlan::clean(), profile, 64);
        let stats = report.device(dev).copied().unwrap_or_default();
        Ok(ValidationResult {
            passed: routed && stats.is_clean() && stats.messages_attempted == 64,
            message: format!("verify reg {}; {stats}", regs::STATUS_REG),
        })
    });

    // ── V9: silence is transient, not mismatch ───────────────────────────────
    suite.run("V9: Absent device — silence classifies TransientFault", || {
        let bus = SimBus::new(); // nobody home
        let mut engine =
            Exerciser::new(bus, TxnProfile::echo_plain()).with_retry(RetryPolicy::instant());
        let outcome = engine.read_and_validate(
            DeviceAddr::new(0x42).expect("assignable address"),
            regs::STATUS_REG,
            regs::STATUS_LEN,
            ReadCheck::None,
        );
        let passed = matches!(
            outcome,
            TxnOutcome::TransientFault { tally } if tally.read_faults == 4
        );
        Ok(ValidationResult {
            passed,
            message: format!("{}: {}", outcome.label(), outcome.tally()),
        })
    });

    // ── V10: discovery sweep ─────────────────────────────────────────────────
    suite.run("V10: Discovery — finds exactly the planted addresses", || {
        let planted = [
            DeviceAddr::new(0x09).expect("assignable address"),
            DeviceAddr::new(0x1a).expect("assignable address"),
            DeviceAddr::new(0x30).expect("assignable address"),
        ];
        let mut bus = SimBus::new();
        for addr in planted {
            bus = bus.with_device(addr);
        }
        let found = discover(&mut bus)?;
        let passed = found == planted;
        Ok(ValidationResult {
            passed,
            message: format!("found {found:?}"),
        })
    });

    println!();
    suite.finish();
    Ok(())
}

/// Runs one single-device soak with instant retries and returns its report.
fn soak(
    dev: DeviceAddr,
    plan: FaultPlan,
    profile: TxnProfile,
    iterations: u32,
) -> busloop_driver::RunReport {
    let bus = SimBus::new().with_device(dev).with_fault_plan(plan);
    let engine = Exerciser::new(bus, profile).with_retry(RetryPolicy::instant());
    let mut runner = SoakRunner::new(
        engine,
        SoakConfig {
            kind: TestKind::loopback_write(),
            iterations,
        },
    );
    runner.run(&[dev], |_| {})
}

// ─── Validation harness ────────────────────────────────────────────────────────

struct ValidationResult {
    passed: bool,
    message: String,
}

struct ValidationSuite {
    verbose: bool,
    passed: usize,
    failed: usize,
}

impl ValidationSuite {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            passed: 0,
            failed: 0,
        }
    }

    fn run<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce() -> Result<ValidationResult>,
    {
        print!("  {name:<60} ");
        match f() {
            Ok(ValidationResult {
                passed: true,
                message,
            }) => {
                println!("✓ PASS");
                if self.verbose {
                    println!("         {message}");
                }
                self.passed += 1;
            }
            Ok(ValidationResult {
                passed: false,
                message,
            }) => {
                println!("✗ FAIL");
                println!("         {message}");
                self.failed += 1;
            }
            Err(e) => {
                println!("✗ ERROR");
                println!("         {e}");
                self.failed += 1;
            }
        }
    }

    fn finish(&self) {
        let total = self.passed + self.failed;
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!(
            "Result: {} passed, {} failed  ({}/{})",
            self.passed, self.failed, self.passed, total
        );
        if self.failed == 0 {
            println!("All checks passed ✓");
        } else {
            println!("VALIDATION FAILED — {} check(s) require attention", self.failed);
            std::process::exit(1);
        }
    }
}
