//! Transaction throughput benchmark — write/verify round-trip latency.
//!
//! Measures the full transaction path (frame build, write, settle, verify
//! read, compare) per protocol variant, then sweeps payload size. Runs on
//! the simulated bus by default, which isolates engine overhead; pass
//! `--bus N` to measure a live adapter at `/dev/i2c-N`.
//!
//! Reference (Raspberry Pi 4, 100 kHz bus clock, 3-byte payload):
//!   echo verify   : ~1.5 ms/message  (~650 msgs/s)
//!   status verify : ~1.1 ms/message  (~900 msgs/s, 1-byte readback)
//! The bus clock dominates; engine overhead on the simulator is < 1 µs.
//!
//! Usage:
//!   cargo run --bin bench_throughput
//!   cargo run --bin bench_throughput -- --iterations 5000
//!   cargo run --bin bench_throughput -- --bus 1

use anyhow::Result;
use busloop_driver::{discover, BlockBus, Exerciser, LinuxSmbus, RetryPolicy, SimBus};
use busloop_protocol::{regs, DeviceAddr, TxnProfile};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_ITERATIONS: usize = 1000;
const PAYLOAD_LEN: usize = regs::DEFAULT_PAYLOAD_LEN;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let iterations = parse_arg(&args, "--iterations", DEFAULT_ITERATIONS);
    let hw_bus = args
        .windows(2)
        .find(|w| w[0] == "--bus")
        .and_then(|w| w[1].parse::<u32>().ok());

    println!("Transaction throughput benchmark");
    println!("================================");
    println!("Payload        : {PAYLOAD_LEN} bytes");
    println!("Iterations     : {iterations}");

    match hw_bus {
        Some(n) => {
            let mut bus = LinuxSmbus::open(n)?;
            let device = discover(&mut bus)?[0];
            println!("Transport      : {} (device {device})", bus.path().display());
            println!();
            bench_all(bus, device, RetryPolicy::default(), iterations)
        }
        None => {
            let device = DeviceAddr::new(0x09).expect("assignable address");
            let bus = SimBus::new().with_device(device);
            println!("Transport      : simulated (engine overhead only)");
            println!();
            bench_all(bus, device, RetryPolicy::instant(), iterations)
        }
    }
}

fn bench_all<B: BlockBus>(
    bus: B,
    device: DeviceAddr,
    retry: RetryPolicy,
    iterations: usize,
) -> Result<()> {
    let variants = [
        ("echo-plain", TxnProfile::echo_plain()),
        ("echo-tagged", TxnProfile::echo_tagged()),
        ("status-seq", TxnProfile::status_sequenced()),
    ];

    println!("Per-variant write/verify latency");
    println!("--------------------------------");
    println!(
        "  {:>12}  {:>9}  {:>8}  {:>8}  {:>8}  {:>9}  {:>7}",
        "variant", "mean µs", "p50", "p95", "p99", "msgs/s", "failed"
    );

    let mut bus = bus;
    for (name, profile) in variants {
        let mut engine = Exerciser::new(bus, profile).with_retry(retry.clone());
        let payload = vec![0x5a; PAYLOAD_LEN];

        // Warmup
        for _ in 0..20 {
            let _ = engine.write_and_verify(device, regs::LOOPBACK_REG, &payload);
        }

        let mut lats = Vec::with_capacity(iterations);
        let mut failed = 0usize;
        for _ in 0..iterations {
            let t0 = Instant::now();
            let outcome = engine.write_and_verify(device, regs::LOOPBACK_REG, &payload);
            lats.push(t0.elapsed().as_secs_f64() * 1e6);
            if !outcome.is_success() {
                failed += 1;
            }
        }

        let s = summarize(lats);
        println!(
            "  {:>12}  {:>9.2}  {:>8.2}  {:>8.2}  {:>8.2}  {:>9.0}  {:>7}",
            name,
            s.mean,
            s.p50,
            s.p95,
            s.p99,
            1e6 / s.mean,
            failed
        );

        bus = engine.into_bus();
    }

    // Payload sweep: frame and echo grow with the payload, so per-message
    // cost should scale roughly linearly on a real bus.
    println!();
    println!("Payload size sweep (echo-tagged)");
    println!("--------------------------------");
    println!("  {:>7}  {:>12}  {:>10}", "bytes", "µs/message", "msgs/s");

    for &len in &[1usize, 2, 4, 8, 16, 24] {
        let mut engine =
            Exerciser::new(bus, TxnProfile::echo_tagged()).with_retry(retry.clone());
        let payload = vec![0x5a; len];
        for _ in 0..10 {
            let _ = engine.write_and_verify(device, regs::LOOPBACK_REG, &payload);
        }
        let t0 = Instant::now();
        for _ in 0..iterations {
            let _ = engine.write_and_verify(device, regs::LOOPBACK_REG, &payload);
        }
        let us_per = t0.elapsed().as_secs_f64() * 1e6 / iterations as f64;
        println!("  {:>7}  {:>12.2}  {:>10.0}", len, us_per, 1e6 / us_per);
        bus = engine.into_bus();
    }

    Ok(())
}

struct LatSummary {
    mean: f64,
    p50: f64,
    p95: f64,
    p99: f64,
}

fn summarize(mut lats: Vec<f64>) -> LatSummary {
    lats.sort_by(f64::total_cmp);
    let n = lats.len();
    LatSummary {
        mean: lats.iter().sum::<f64>() / n as f64,
        p50: lats[n / 2],
        p95: lats[(n as f64 * 0.95) as usize],
        p99: lats[(n as f64 * 0.99) as usize],
    }
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
