//! Soak run against the simulated bus
//!
//! Demonstrates the full pipeline — discovery, transaction engine, soak
//! runner — with an injected fault plan, no hardware required.

use busloop_driver::{
    discover, Exerciser, FaultPlan, FaultWindow, Result, RetryPolicy, SimBus, SoakConfig,
    SoakRunner, TestKind,
};
use busloop_protocol::{DeviceAddr, TxnProfile};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("busloop_driver=info")
        .init();

    println!("🔁 Busloop Simulated Soak\n");

    // Two peripherals, one of them on a flaky link: every 7th write and
    // every 11th read drops, and the first 3 readbacks come corrupted.
    let plan = FaultPlan {
        write_faults: FaultWindow::EveryNth(7),
        read_faults: FaultWindow::EveryNth(11),
        corrupt_reads: FaultWindow::First(3),
    };
    let mut bus = SimBus::new()
        .with_device(DeviceAddr::new(0x09).unwrap())
        .with_device(DeviceAddr::new(0x1a).unwrap())
        .with_fault_plan(plan);

    let devices = discover(&mut bus)?;
    println!("Found {} device(s)\n", devices.len());

    let engine = Exerciser::new(bus, TxnProfile::echo_tagged()).with_retry(RetryPolicy::instant());
    let mut runner = SoakRunner::new(
        engine,
        SoakConfig {
            kind: TestKind::loopback_write(),
            iterations: 100,
        },
    );

    println!("📤 Running 100 write/verify messages per device...\n");
    let report = runner.run(&devices, |progress| {
        if progress.iteration % 25 == 0 {
            println!(
                "  iteration {:3}  {}  {}",
                progress.iteration, progress.device, progress.stats
            );
        }
    });

    println!();
    for (addr, stats) in report.devices() {
        let mark = if stats.is_clean() { "✅" } else { "⚠️ " };
        println!("{mark} {addr}: {stats}");
    }

    let totals = report.totals();
    println!("\n🎉 Totals: {totals}");

    Ok(())
}
