//! Scan a real adapter and exercise every responding peripheral once
//!
//! ```bash
//! cargo run --example hardware_scan            # /dev/i2c-1
//! cargo run --example hardware_scan -- 0       # /dev/i2c-0
//! ```

use busloop_driver::{discover, Exerciser, LinuxSmbus};
use busloop_protocol::{regs, TxnProfile};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("busloop_driver=debug")
        .init();

    let bus_num = std::env::args()
        .nth(1)
        .map(|s| s.parse::<u32>())
        .transpose()?
        .unwrap_or(1);

    println!("🔎 Busloop Adapter Scan\n");

    let mut bus = LinuxSmbus::open(bus_num)?;
    println!("✅ Opened: {}\n", bus.path().display());

    let devices = discover(&mut bus)?;
    println!("Found {} device(s):\n", devices.len());

    let mut engine = Exerciser::new(bus, TxnProfile::echo_plain());
    for addr in devices {
        let outcome = engine.write_and_verify(addr, regs::LOOPBACK_REG, &[10, 11, 12]);
        let tally = outcome.tally();
        println!("📟 Device {addr}:");
        println!("   Loopback:   {}", outcome.label());
        println!("   Retries:    {tally}");
        println!();
    }

    println!("✅ Scan complete");

    Ok(())
}
