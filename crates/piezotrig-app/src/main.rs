//! Piezotrig host application
//!
//! Runs the complete firmware stack against simulated board parts and
//! drives it over the bus protocol, or encodes single command frames
//! for use with external bus tooling.
//!
//! # Usage
//!
//! ```bash
//! # Scripted bus session against the simulated board (default)
//! piezotrig
//!
//! # Same, with more verbose logging
//! piezotrig --log-level debug demo
//!
//! # Print the wire bytes for a command frame
//! piezotrig encode set-threshold 40
//! ```

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use piezotrig_core::protocol::{self, MAX_FRAME};
use piezotrig_core::{Opcode, Settings};
use piezotrig_firmware::sim::{
    InstantDelay, Latch, RamStorage, SimProbe, SimTriggerPin, SingleThread,
};
use piezotrig_firmware::Device;

type SimDevice<'a> =
    Device<SimProbe<'a>, SimTriggerPin<'a>, RamStorage, InstantDelay, SingleThread>;

/// Piezo trigger board tooling
#[derive(Parser, Debug)]
#[command(name = "piezotrig")]
#[command(author, version, about = "Piezo impact trigger board tooling", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted bus session against the simulated board (default)
    Demo {
        /// Deviation threshold to configure, in ADC counts
        #[arg(long, default_value = "40")]
        threshold: u8,
    },

    /// Encode a command frame and print its wire bytes as hex
    Encode {
        /// Command name, e.g. get-threshold or set-trigger-mode
        command: String,

        /// Payload byte, for commands that take one
        value: Option<u8>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Piezotrig v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => run_demo(40),
        Some(Commands::Demo { threshold }) => run_demo(threshold),
        Some(Commands::Encode { command, value }) => run_encode(&command, value),
    }
}

// ============================================================================
// Demo session
// ============================================================================

/// Frame a command, feed it to the device byte by byte, poll once, and
/// drain the framed response if one was queued.
fn transact(
    device: &mut SimDevice<'_>,
    opcode: Opcode,
    payload: &[u8],
) -> anyhow::Result<Option<Vec<u8>>> {
    let mut buf = [0u8; MAX_FRAME];
    let n = protocol::encode_frame(opcode as u8, payload, &mut buf)
        .map_err(|e| anyhow!("encode failed: {e}"))?;
    for &b in &buf[..n] {
        device.on_byte_received(b);
    }
    device
        .poll()
        .map_err(|e| anyhow!("device poll failed: {e}"))?;

    if device.tx_pending() == 0 {
        return Ok(None);
    }
    let mut bytes = Vec::new();
    while device.tx_pending() > 0 {
        bytes.push(device.on_byte_requested());
    }
    let (resp_opcode, resp_payload) =
        protocol::parse_frame(&bytes).map_err(|e| anyhow!("bad response frame: {e}"))?;
    debug!("response {:02X}: {:02X?}", resp_opcode, resp_payload);
    Ok(Some(resp_payload.to_vec()))
}

fn run_demo(threshold: u8) -> anyhow::Result<()> {
    let probe = Latch::new();
    let output = Latch::new();

    let mut device: SimDevice<'_> = Device::new(
        SimProbe::new(&probe),
        SimTriggerPin::new(&output),
        RamStorage::blank(),
        InstantDelay,
        SingleThread,
    );
    let restored = device
        .init()
        .map_err(|e| anyhow!("device init failed: {e:?}"))?;
    info!(restored_defaults = restored, "device initialized");

    // Identify the board.
    let id = transact(&mut device, Opcode::GetIdAndVersion, &[])?
        .context("no identify response")?;
    info!(
        "board id {:02x?} version {}",
        &id[..id.len() - 1],
        id[id.len() - 1]
    );

    // Configure over the bus before the centerline settles.
    transact(&mut device, Opcode::SetThreshold, &[threshold])?;
    transact(&mut device, Opcode::SetAlpha, &[25])?;
    info!(threshold, alpha_percent = 25, "configured");

    // Quiet baseline around 500 counts while calibration runs.
    info!("calibrating");
    while device.is_calibrating() {
        device.on_conversion_complete(500);
    }
    let averages = transact(&mut device, Opcode::ReadCurrentAverages, &[])?
        .context("no averages response")?;
    info!("calibrated averages: {:?}", unpack_u16(&averages));

    // Simulate an impact on one channel and watch the output pulse.
    info!("simulating impact");
    for raw in [500u16, 980, 900, 700, 560, 510] {
        device.on_conversion_complete(raw);
        device
            .poll()
            .map_err(|e| anyhow!("device poll failed: {e}"))?;
    }
    if !output.get() {
        bail!("trigger output did not assert on impact");
    }
    info!("trigger output asserted");

    // Let the debounce hold expire.
    let debounce = Settings::DEFAULT_DEBOUNCE_MS;
    for _ in 0..=u32::from(debounce) {
        device.on_tick();
    }
    device
        .poll()
        .map_err(|e| anyhow!("device poll failed: {e}"))?;
    if output.get() {
        bail!("trigger output did not release after {debounce} ms");
    }
    info!(debounce_ms = debounce, "trigger output released");

    // Persist the configuration and read it back.
    transact(&mut device, Opcode::StoreSettings, &[])?;
    let stored = transact(&mut device, Opcode::GetThreshold, &[])?
        .context("no threshold response")?;
    info!(threshold = stored[0], "settings stored");

    Ok(())
}

fn unpack_u16(payload: &[u8]) -> Vec<u16> {
    payload
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

// ============================================================================
// Frame encoding
// ============================================================================

fn run_encode(command: &str, value: Option<u8>) -> anyhow::Result<()> {
    let (opcode, takes_value) = match command {
        "get-id" => (Opcode::GetIdAndVersion, false),
        "get-threshold" => (Opcode::GetThreshold, false),
        "set-threshold" => (Opcode::SetThreshold, true),
        "read-values" => (Opcode::ReadCurrentValues, false),
        "read-averages" => (Opcode::ReadCurrentAverages, false),
        "set-trigger-mode" => (Opcode::SetTriggerMode, true),
        "get-trigger-mode" => (Opcode::GetTriggerMode, false),
        "reset" => (Opcode::Reset, false),
        "recalibrate" => (Opcode::Recalibrate, false),
        "store-settings" => (Opcode::StoreSettings, false),
        "get-alpha" => (Opcode::GetAlpha, false),
        "set-alpha" => (Opcode::SetAlpha, true),
        other => bail!("unknown command: {other}"),
    };

    let payload = match (takes_value, value) {
        (true, Some(v)) => vec![v],
        (true, None) => bail!("{command} requires a value"),
        (false, Some(_)) => bail!("{command} takes no value"),
        (false, None) => Vec::new(),
    };

    let mut buf = [0u8; MAX_FRAME];
    let n = protocol::encode_frame(opcode as u8, &payload, &mut buf)
        .map_err(|e| anyhow!("encode failed: {e}"))?;

    let hex: Vec<String> = buf[..n].iter().map(|b| format!("{b:02X}")).collect();
    println!("{}", hex.join(" "));
    Ok(())
}
