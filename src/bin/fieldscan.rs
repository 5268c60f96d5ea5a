// fieldscan CLI - PIN-gated tactical recon scanner
// Terminal entry point: setup flow, authentication gate, scan sessions

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::io::{self, Write};

use fieldscan::auth::AuthError;
use fieldscan::config::{self, Config};
use fieldscan::constants::{
    SCAN_DURATION_DEFAULT_MS, SCAN_DURATION_MAX_MS, SCAN_DURATION_MIN_MS,
    SCAN_INTERVAL_DEFAULT_MS,
};
use fieldscan::credential;
use fieldscan::error::{CoreError, WATCHDOG_HALT_EXIT_CODE};
use fieldscan::logbuf::FileSink;
use fieldscan::region::Region;
use fieldscan::scan::NullBackend;
use fieldscan::watchdog::WatchdogPolicy;
use fieldscan::FieldScanCore;

/// Handheld tactical recon scanner
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "PIN-gated scheduled RF/NFC scans with a buffered activity log",
    long_about = "Handheld tactical recon scanner.

Performs one bounded scan session over the enabled hardware modules
(Sub-GHz radio, NFC, WiFi, Bluetooth) in priority order, with
region-aware frequency limits and regulatory spacing between modules.
Every step is recorded in a buffered activity log flushed to storage
in batches.

SETUP:
  Before first use, enroll a PIN and write the initial configuration:
    fieldscan --setup

  The PIN is stored sealed (AES-256-GCM) at:
    <config_dir>/fieldscan/credential.bin

  Scan timing, region, module enables and log level live in:
    <config_dir>/fieldscan/config.toml

At startup you will be prompted for the PIN (input is not echoed).
Three wrong attempts lock the device for a cooldown period."
)]
struct Args {
    /// Run interactive setup to enroll the PIN and write the config
    #[arg(long)]
    setup: bool,

    /// Per-module scan duration in ms (1000-120000, overrides config and env)
    /// NOTE: Keep range in sync with the SCAN_DURATION_* constants
    #[arg(long)]
    scan_duration: Option<u64>,

    /// Regulatory region code (US/EU/JP/CN/AU, overrides config and detection)
    #[arg(long)]
    region: Option<String>,

    /// Keep running scan sessions until interrupted, instead of one session
    #[arg(long)]
    continuous: bool,
}

/// Helper function to prompt for a number with a default value
fn prompt_number(prompt: &str, default: u64) -> Result<u64> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        Ok(default)
    } else {
        input
            .parse::<u64>()
            .with_context(|| format!("Invalid number: {}", input))
    }
}

/// Run interactive setup to enroll the PIN and write the configuration
fn run_setup() -> Result<()> {
    println!("fieldscan Setup");
    println!("===============\n");

    // Prompt for PIN (non-echoing)
    let pin_input =
        rpassword::prompt_password("Enter 6-digit PIN: ").context("Failed to read PIN")?;
    let pin = credential::validate_pin(pin_input.trim())?;

    let confirm =
        rpassword::prompt_password("Confirm PIN: ").context("Failed to read confirmation")?;
    if confirm.trim().as_bytes() != pin.as_slice() {
        anyhow::bail!("Error: PINs do not match");
    }

    credential::store_pin(&Config::credential_path(), &pin)
        .context("Failed to store credential")?;

    // Prompt for scan timing
    let scan_duration_ms = prompt_number(
        &format!("Scan duration in ms (default: {}): ", SCAN_DURATION_DEFAULT_MS),
        SCAN_DURATION_DEFAULT_MS,
    )?;
    let scan_interval_ms = prompt_number(
        &format!("Interval between scans in ms (default: {}): ", SCAN_INTERVAL_DEFAULT_MS),
        SCAN_INTERVAL_DEFAULT_MS,
    )?;

    let mut cfg = Config::load();
    cfg.scan_duration_ms = scan_duration_ms;
    cfg.scan_interval_ms = scan_interval_ms;
    if cfg.region == Region::Unknown {
        cfg.region = config::detect_region_from_env();
    }
    cfg.save().context("Failed to save configuration")?;

    println!("\nCredential stored at: {}", Config::credential_path().display());
    println!("Configuration saved to: {}", Config::config_path().display());
    println!("Setup complete!");
    println!("\nYou can now run 'fieldscan' to start a scan session.");

    Ok(())
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Handle setup command
    if args.setup {
        return run_setup();
    }

    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting fieldscan");

    // Load configuration (missing/corrupt file degrades to defaults)
    let mut cfg = Config::load();

    // Scan timing precedence: CLI arg > env var > config file
    cfg.scan_duration_ms = match args.scan_duration {
        Some(ms) if (SCAN_DURATION_MIN_MS..=SCAN_DURATION_MAX_MS).contains(&ms) => {
            info!("Scan duration set via --scan-duration: {} ms", ms);
            ms
        }
        Some(ms) => {
            warn!(
                "Invalid --scan-duration value: {} (must be {}-{} ms). Using config or environment.",
                ms, SCAN_DURATION_MIN_MS, SCAN_DURATION_MAX_MS
            );
            config::parse_scan_duration_override().unwrap_or(cfg.scan_duration_ms)
        }
        None => config::parse_scan_duration_override().unwrap_or(cfg.scan_duration_ms),
    };
    cfg.scan_interval_ms =
        config::parse_scan_interval_override().unwrap_or(cfg.scan_interval_ms);

    // Region precedence: CLI arg > config file > environment detection
    if let Some(ref code) = args.region {
        match code.parse::<Region>() {
            Ok(region) => {
                info!("Region set via --region: {}", region);
                cfg.region = region;
            }
            Err(()) => {
                warn!("Unrecognized --region value '{}'; ignoring", code);
            }
        }
    }
    if cfg.region == Region::Unknown {
        cfg.region = config::detect_region_from_env();
    }
    info!("Active region: {}", cfg.region);

    // Build the core (state + activity log)
    let core = FieldScanCore::new(&cfg, Box::new(FileSink::new(Config::log_path())));

    // Load the sealed credential; absent credential is a fatal init error
    if let Err(e) = core.load_credential(&Config::credential_path()) {
        error!("{:#}", e);
        let code = CoreError::Init("credential unavailable".into()).exit_code();
        core.state.record_error_code(code);
        core.shutdown();
        std::process::exit(code);
    }

    // Start the liveness supervisor; a stalled main loop force-flushes the
    // activity log and halts the process
    core.start_watchdog(WatchdogPolicy::default(), || {
        std::process::exit(WATCHDOG_HALT_EXIT_CODE);
    });

    // PIN gate
    loop {
        let pin = rpassword::prompt_password("PIN: ").context("Failed to read PIN")?;
        match core.authenticate(pin.trim().as_bytes()) {
            Ok(()) => {
                info!("Authenticated");
                break;
            }
            Err(AuthError::InvalidPin { attempts_remaining }) => {
                eprintln!("Invalid PIN ({} attempt(s) remaining)", attempts_remaining);
            }
            Err(AuthError::LockedOut { retry_after }) => {
                error!(
                    "Locked out after repeated failures; retry in {}s",
                    retry_after.as_secs()
                );
                let code = CoreError::Auth(AuthError::LockedOut { retry_after }).exit_code();
                core.state.record_error_code(code);
                core.shutdown();
                std::process::exit(code);
            }
            Err(AuthError::NotAuthenticated) => continue,
        }
    }

    // Scan sessions. The backend is the driver-integration seam; real
    // radio/NFC drivers replace NullBackend here.
    let mut backend = NullBackend;
    loop {
        match core.run_session(&mut backend) {
            Ok(report) => {
                info!(
                    "Session done: {} result(s), completed={}",
                    report.results.len(),
                    report.completed
                );
            }
            Err(e) => {
                error!("Session failed: {}", e);
                if e.is_fatal() {
                    break;
                }
            }
        }

        if !args.continuous || core.state.exit_requested() {
            break;
        }
        core.state.touch_heartbeat();
    }

    core.shutdown();
    let code = core.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    info!("Clean exit");
    Ok(())
}
