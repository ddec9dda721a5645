//! `busloop` — command-line exerciser for the echo peripherals.
//!
//! ```text
//! USAGE:
//!   busloop scan [--bus N]                      List responding devices
//!   busloop read [ADDR ...] [--iterations N]    Read-only soak
//!   busloop write [ADDR ...] [--variant V]      Write/verify soak
//! ```
//!
//! Soaks print a per-device counter table (or `--json`) and exit nonzero
//! if any message was uncorrectable. `--sim` swaps the adapter for the
//! in-process simulator; the fault knobs then script its misbehaviour.

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use busloop_driver::{
    discover, BlockBus, BusloopError, Exerciser, FaultPlan, FaultWindow, LinuxSmbus, ReadCheck,
    RetryPolicy, RunReport, RunStats, SimBus, SoakConfig, SoakRunner, TestKind,
};
use busloop_protocol::{regs, DeviceAddr, SequenceCounter, TxnProfile};

#[derive(Parser)]
#[command(name = "busloop", about = "Bus reliability exerciser", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Probe the assignable address range and list responding devices.
    Scan(ScanArgs),
    /// Read-only soak: poll a register and count what comes back.
    Read(ReadArgs),
    /// Write/verify soak: send framed payloads, verify each one landed.
    Write(WriteArgs),
}

#[derive(Args)]
struct TransportOpts {
    /// Adapter number (/dev/i2c-N).
    #[arg(long, default_value_t = 1, conflicts_with = "sim")]
    bus: u32,
    /// Run against the in-process simulator instead of hardware.
    #[arg(long)]
    sim: bool,
    /// Simulator: fault the first N write operations.
    #[arg(long, value_name = "N", default_value_t = 0, requires = "sim")]
    fault_writes: u32,
    /// Simulator: fault the first N read operations.
    #[arg(long, value_name = "N", default_value_t = 0, requires = "sim")]
    fault_reads: u32,
    /// Simulator: corrupt every Kth readback.
    #[arg(long, value_name = "K", requires = "sim")]
    corrupt_every: Option<u32>,
}

#[derive(Args)]
struct ScanArgs {
    #[command(flatten)]
    transport: TransportOpts,
    /// Addresses to plant in the simulator (--sim only).
    #[arg(value_parser = parse_addr)]
    devices: Vec<DeviceAddr>,
}

#[derive(Args)]
struct ReadArgs {
    #[command(flatten)]
    transport: TransportOpts,
    /// Peripheral addresses (e.g. 0x09); probed when omitted.
    #[arg(value_parser = parse_addr)]
    devices: Vec<DeviceAddr>,
    /// Messages per device.
    #[arg(long, default_value_t = 256)]
    iterations: u32,
    /// Register to poll.
    #[arg(long, default_value_t = regs::STATUS_REG)]
    reg: u8,
    /// Bytes per read.
    #[arg(long, default_value_t = regs::STATUS_LEN)]
    len: usize,
    /// Reject frames that fail the variant's embedded checksum.
    #[arg(long)]
    check: bool,
    /// Protocol variant (sets the checksum the --check option expects).
    #[arg(long, value_enum, default_value = "echo-plain")]
    variant: Variant,
    /// Emit the report as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct WriteArgs {
    #[command(flatten)]
    transport: TransportOpts,
    /// Peripheral addresses (e.g. 0x09); probed when omitted.
    #[arg(value_parser = parse_addr)]
    devices: Vec<DeviceAddr>,
    /// Messages per device.
    #[arg(long, default_value_t = 256)]
    iterations: u32,
    /// Protocol variant to speak.
    #[arg(long, value_enum, default_value = "echo-plain")]
    variant: Variant,
    /// Payload bytes per message.
    #[arg(long, default_value_t = regs::DEFAULT_PAYLOAD_LEN)]
    payload_len: usize,
    /// First sequence number to issue (tagged variants).
    #[arg(long, default_value_t = 0)]
    seq_start: u8,
    /// Emit the report as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

/// Protocol variant names as the firmware revisions are known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Plain payload sum, echo-frame verification.
    EchoPlain,
    /// Negated sum over register + sequence + payload, echo verification.
    EchoTagged,
    /// Tagged frame, verification via the status register.
    StatusSeq,
}

impl Variant {
    const fn profile(self) -> TxnProfile {
        match self {
            Self::EchoPlain => TxnProfile::echo_plain(),
            Self::EchoTagged => TxnProfile::echo_tagged(),
            Self::StatusSeq => TxnProfile::status_sequenced(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Scan(args) => cmd_scan(&args),
        Cmd::Read(args) => cmd_read(&args),
        Cmd::Write(args) => cmd_write(&args),
    }
}

fn cmd_scan(args: &ScanArgs) -> Result<()> {
    if args.transport.sim {
        let mut bus = sim_bus(&args.transport, &args.devices)?;
        report_scan(discover(&mut bus), "simulated bus")
    } else {
        anyhow::ensure!(
            args.devices.is_empty(),
            "hardware scans probe the whole range; addresses only apply with --sim"
        );
        let mut bus = LinuxSmbus::open(args.transport.bus)?;
        let label = bus.path().display().to_string();
        report_scan(discover(&mut bus), &label)
    }
}

fn report_scan(found: busloop_driver::Result<Vec<DeviceAddr>>, adapter: &str) -> Result<()> {
    match found {
        Ok(devices) => {
            println!("Found {} device(s) on {adapter}:", devices.len());
            for device in devices {
                println!("  {device}");
            }
            Ok(())
        }
        Err(BusloopError::NoDevicesFound) => {
            println!("No devices found on {adapter}.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_read(args: &ReadArgs) -> Result<()> {
    anyhow::ensure!(args.len != 0, "reads need at least one byte");
    anyhow::ensure!(
        args.len <= regs::MAX_BLOCK_LEN,
        "a {}-byte read does not fit one {}-byte block transfer",
        args.len,
        regs::MAX_BLOCK_LEN
    );
    let kind = TestKind::ReadValidate {
        reg: args.reg,
        len: args.len,
        check: if args.check {
            ReadCheck::Embedded
        } else {
            ReadCheck::None
        },
    };
    run_soak(
        &args.transport,
        &args.devices,
        args.variant.profile(),
        SequenceCounter::new(),
        kind,
        args.iterations,
        args.json,
    )
}

fn cmd_write(args: &WriteArgs) -> Result<()> {
    let profile = args.variant.profile();
    anyhow::ensure!(args.payload_len != 0, "messages need at least one payload byte");
    anyhow::ensure!(
        profile.frame_len(args.payload_len) <= regs::MAX_BLOCK_LEN
            && profile.readback_len(args.payload_len) <= regs::MAX_BLOCK_LEN,
        "a {}-byte payload does not fit a {}-byte block transfer once framed",
        args.payload_len,
        regs::MAX_BLOCK_LEN
    );
    let kind = TestKind::WriteVerify {
        reg: regs::LOOPBACK_REG,
        payload_len: args.payload_len,
    };
    run_soak(
        &args.transport,
        &args.devices,
        profile,
        SequenceCounter::starting_at(args.seq_start),
        kind,
        args.iterations,
        args.json,
    )
}

fn run_soak(
    transport: &TransportOpts,
    devices: &[DeviceAddr],
    profile: TxnProfile,
    seq: SequenceCounter,
    kind: TestKind,
    iterations: u32,
    json: bool,
) -> Result<()> {
    let report = if transport.sim {
        let bus = sim_bus(transport, devices)?;
        soak_on(bus, devices, profile, RetryPolicy::instant(), seq, kind, iterations, json)
    } else {
        let mut bus = LinuxSmbus::open(transport.bus)?;
        let devices = if devices.is_empty() {
            discover(&mut bus)?
        } else {
            devices.to_vec()
        };
        soak_on(bus, &devices, profile, RetryPolicy::default(), seq, kind, iterations, json)
    };

    if json {
        print_json(&report)?;
    } else {
        print_table(&report);
    }
    if report.totals().uncorrectable_errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn soak_on<B: BlockBus>(
    bus: B,
    devices: &[DeviceAddr],
    profile: TxnProfile,
    retry: RetryPolicy,
    seq: SequenceCounter,
    kind: TestKind,
    iterations: u32,
    json: bool,
) -> RunReport {
    let engine = Exerciser::new(bus, profile)
        .with_retry(retry)
        .with_sequence(seq);
    let mut runner = SoakRunner::new(engine, SoakConfig { kind, iterations });

    if !json {
        println!(
            "Running {iterations} message(s) against {} device(s)...",
            devices.len()
        );
    }
    let step = (iterations / 10).max(1);
    runner.run(devices, |progress| {
        if !json && progress.iteration % step == 0 {
            println!(
                "  [{:>5}/{iterations}] {}  {}",
                progress.iteration, progress.device, progress.stats
            );
        }
    })
}

/// Builds the simulated bus for one run: the requested devices planted,
/// the fault knobs turned into a plan.
fn sim_bus(transport: &TransportOpts, devices: &[DeviceAddr]) -> Result<SimBus> {
    anyhow::ensure!(
        !devices.is_empty(),
        "simulated runs need at least one device address (e.g. 0x09)"
    );
    let plan = FaultPlan {
        write_faults: first_n(transport.fault_writes),
        read_faults: first_n(transport.fault_reads),
        corrupt_reads: transport
            .corrupt_every
            .map_or(FaultWindow::Never, FaultWindow::EveryNth),
    };
    let mut bus = SimBus::new().with_fault_plan(plan);
    for &device in devices {
        bus.add_device(device);
    }
    Ok(bus)
}

const fn first_n(n: u32) -> FaultWindow {
    if n == 0 {
        FaultWindow::Never
    } else {
        FaultWindow::First(n)
    }
}

fn print_table(report: &RunReport) {
    println!();
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "device", "messages", "rd-fault", "wr-fault", "mismatch", "uncorr"
    );
    for (addr, s) in report.devices() {
        print_row(&addr.to_string(), s);
    }
    print_row("total", &report.totals());
}

fn print_row(label: &str, s: &RunStats) {
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>8}",
        label,
        s.messages_attempted,
        s.read_faults,
        s.write_faults,
        s.data_mismatches,
        s.uncorrectable_errors
    );
}

fn print_json(report: &RunReport) -> Result<()> {
    #[derive(serde::Serialize)]
    struct Row<'a> {
        device: String,
        #[serde(flatten)]
        stats: &'a RunStats,
    }
    #[derive(serde::Serialize)]
    struct Doc<'a> {
        devices: Vec<Row<'a>>,
        totals: RunStats,
    }

    let doc = Doc {
        devices: report
            .devices()
            .map(|(addr, stats)| Row {
                device: addr.to_string(),
                stats,
            })
            .collect(),
        totals: report.totals(),
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

/// Accepts `0x`-prefixed hex or decimal bus addresses.
fn parse_addr(s: &str) -> Result<DeviceAddr, String> {
    let raw = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .map_or_else(|| s.parse::<u8>(), |hex| u8::from_str_radix(hex, 16))
        .map_err(|e| format!("invalid address {s:?}: {e}"))?;
    DeviceAddr::new(raw)
        .ok_or_else(|| format!("address 0x{raw:02x} is outside the assignable range 0x08..=0x77"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cmd {
        Cli::try_parse_from(argv).expect("argv should parse").command
    }

    #[test]
    fn read_length_beyond_one_block_is_rejected_up_front() {
        let Cmd::Read(args) = parse(&["busloop", "read", "--sim", "0x09", "--len", "64"]) else {
            panic!("expected the read subcommand");
        };
        let err = cmd_read(&args).unwrap_err();
        assert!(err.to_string().contains("block transfer"));
    }

    #[test]
    fn zero_read_length_is_rejected_up_front() {
        let Cmd::Read(args) = parse(&["busloop", "read", "--sim", "0x09", "--len", "0"]) else {
            panic!("expected the read subcommand");
        };
        assert!(cmd_read(&args).is_err());
    }

    #[test]
    fn zero_payload_length_is_rejected_up_front() {
        let Cmd::Write(args) = parse(&["busloop", "write", "--sim", "0x09", "--payload-len", "0"])
        else {
            panic!("expected the write subcommand");
        };
        assert!(cmd_write(&args).is_err());
    }

    #[test]
    fn payload_that_overflows_the_echo_readback_is_rejected() {
        // 31 payload bytes frame to exactly 32 with the checksum, but the
        // echo readback prepends the register byte and overflows the block
        let Cmd::Write(args) = parse(&["busloop", "write", "--sim", "0x09", "--payload-len", "31"])
        else {
            panic!("expected the write subcommand");
        };
        let err = cmd_write(&args).unwrap_err();
        assert!(err.to_string().contains("once framed"));
    }

    #[test]
    fn addresses_parse_as_hex_or_decimal_within_range() {
        assert_eq!(parse_addr("0x09").unwrap().get(), 0x09);
        assert_eq!(parse_addr("9").unwrap().get(), 9);
        assert!(parse_addr("0x78").is_err());
        assert!(parse_addr("whatever").is_err());
    }
}
