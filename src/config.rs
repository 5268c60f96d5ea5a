//! Configuration management for fieldscan
//!
//! The persisted record is a small TOML file covering scan timing, region,
//! per-module enable flags, and the activity-log level. Loading is lenient
//! by design: a missing or broken file, or any malformed/out-of-range
//! field, falls back to defaults rather than failing the application.
//!
//! Environment variables can optionally override scan timing:
//! - FIELDSCAN_SCAN_DURATION_MS: per-module scan duration
//! - FIELDSCAN_SCAN_INTERVAL_MS: pause between module scans
//! - FIELDSCAN_REGION: regulatory region code (US/EU/JP/CN/AU)

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, CREDENTIAL_FILE_NAME, LOG_FILE_NAME,
    SCAN_DURATION_DEFAULT_MS, SCAN_DURATION_MAX_MS, SCAN_DURATION_MIN_MS,
    SCAN_INTERVAL_DEFAULT_MS, SCAN_INTERVAL_MAX_MS, SCAN_INTERVAL_MIN_MS,
};
use crate::logbuf::LogLevel;
use crate::region::Region;
use crate::scan::ModuleSet;

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Per-module scan duration in milliseconds
    pub scan_duration_ms: u64,
    /// Pause between module scans in milliseconds
    pub scan_interval_ms: u64,
    /// Regulatory region constraining Sub-GHz ranges
    pub region: Region,
    /// Minimum severity persisted to the activity log
    pub log_level: LogLevel,
    /// Per-module enable flags
    pub modules: ModuleSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_duration_ms: SCAN_DURATION_DEFAULT_MS,
            scan_interval_ms: SCAN_INTERVAL_DEFAULT_MS,
            region: Region::Unknown,
            log_level: LogLevel::Info,
            modules: ModuleSet::default(),
        }
    }
}

/// Raw on-disk shape; every field optional so one bad field never poisons
/// the rest. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    scan_duration_ms: Option<u64>,
    scan_interval_ms: Option<u64>,
    region: Option<String>,
    log_level: Option<String>,
    modules: Option<ModuleSet>,
}

impl Config {
    /// Standard config file path:
    /// - macOS: `~/Library/Application Support/fieldscan/config.toml`
    /// - Linux: `~/.config/fieldscan/config.toml`
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .expect("Failed to determine config directory")
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Sealed credential path, next to the config file.
    pub fn credential_path() -> PathBuf {
        dirs::config_dir()
            .expect("Failed to determine config directory")
            .join(APP_DIR_NAME)
            .join(CREDENTIAL_FILE_NAME)
    }

    /// Activity log path under the platform data directory.
    pub fn log_path() -> PathBuf {
        dirs::data_local_dir()
            .expect("Failed to determine data directory")
            .join(APP_DIR_NAME)
            .join(LOG_FILE_NAME)
    }

    /// Load from the standard location. Never fails; falls back to
    /// defaults field-by-field.
    pub fn load() -> Config {
        Self::load_from_path(&Self::config_path())
    }

    /// Load from a specific path, validating each field independently.
    pub fn load_from_path(path: &Path) -> Config {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                info!(
                    "No readable config at {} ({}); using defaults",
                    path.display(),
                    e
                );
                return Config::default();
            }
        };

        let raw: RawConfig = match toml::from_str(&contents) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Config file {} is malformed ({}); using defaults",
                    path.display(),
                    e
                );
                return Config::default();
            }
        };

        Config::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Config {
        let scan_duration_ms = validate_duration(
            raw.scan_duration_ms,
            SCAN_DURATION_MIN_MS,
            SCAN_DURATION_MAX_MS,
            SCAN_DURATION_DEFAULT_MS,
            "scan_duration_ms",
        );
        let scan_interval_ms = validate_duration(
            raw.scan_interval_ms,
            SCAN_INTERVAL_MIN_MS,
            SCAN_INTERVAL_MAX_MS,
            SCAN_INTERVAL_DEFAULT_MS,
            "scan_interval_ms",
        );

        let region = match raw.region {
            Some(code) => code.parse::<Region>().unwrap_or_else(|_| {
                warn!("Unrecognized region '{}'; treating as Unknown", code);
                Region::Unknown
            }),
            None => Region::Unknown,
        };

        let log_level = match raw.log_level {
            Some(level) => level.parse::<LogLevel>().unwrap_or_else(|_| {
                warn!("Unrecognized log level '{}'; using Info", level);
                LogLevel::Info
            }),
            None => LogLevel::Info,
        };

        Config {
            scan_duration_ms,
            scan_interval_ms,
            region,
            log_level,
            modules: raw.modules.unwrap_or_default(),
        }
    }

    /// Save to the standard location, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path())
    }

    /// Save to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }
}

fn validate_duration(raw: Option<u64>, min: u64, max: u64, default: u64, name: &str) -> u64 {
    match raw {
        Some(value) if (min..=max).contains(&value) => value,
        Some(value) => {
            warn!(
                "Invalid {}: {} (must be {}-{} ms). Using default {}.",
                name, value, min, max, default
            );
            default
        }
        None => default,
    }
}

/// Parse the FIELDSCAN_SCAN_DURATION_MS environment override.
///
/// Returns Some(ms) for a valid value, None when unset or invalid.
pub fn parse_scan_duration_override() -> Option<u64> {
    parse_duration_env(
        "FIELDSCAN_SCAN_DURATION_MS",
        SCAN_DURATION_MIN_MS,
        SCAN_DURATION_MAX_MS,
    )
}

/// Parse the FIELDSCAN_SCAN_INTERVAL_MS environment override.
pub fn parse_scan_interval_override() -> Option<u64> {
    parse_duration_env(
        "FIELDSCAN_SCAN_INTERVAL_MS",
        SCAN_INTERVAL_MIN_MS,
        SCAN_INTERVAL_MAX_MS,
    )
}

fn parse_duration_env(var: &str, min: u64, max: u64) -> Option<u64> {
    match env::var(var) {
        Ok(val) => match val.parse::<u64>() {
            Ok(ms) if (min..=max).contains(&ms) => {
                info!("{} override: {} ms", var, ms);
                Some(ms)
            }
            Ok(ms) => {
                warn!(
                    "Invalid {}: {} (must be {}-{} ms). Ignoring.",
                    var, ms, min, max
                );
                None
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Ignoring.", var, e);
                None
            }
        },
        Err(_) => {
            debug!("{} not set.", var);
            None
        }
    }
}

/// Detect the regulatory region from an injected locale/region hint.
///
/// Pure and infallible: accepts either a bare region code ("US") or a
/// POSIX locale ("en_US.UTF-8"), returning `Unknown` when the signal is
/// absent or undecodable.
pub fn detect_region(signal: Option<&str>) -> Region {
    let signal = match signal {
        Some(s) if !s.trim().is_empty() => s.trim(),
        _ => return Region::Unknown,
    };

    // Direct region code first
    if let Ok(region) = signal.parse::<Region>() {
        return region;
    }

    // POSIX locale: language_COUNTRY[.encoding]
    let country = signal
        .split('.')
        .next()
        .and_then(|tag| tag.rsplit('_').next())
        .unwrap_or("");

    match country.to_ascii_uppercase().as_str() {
        "US" => Region::Us,
        "JP" => Region::Jp,
        "CN" => Region::Cn,
        "AU" => Region::Au,
        // EU and CEPT-aligned countries share the EU table
        "AT" | "BE" | "BG" | "CH" | "CZ" | "DE" | "DK" | "EE" | "ES" | "FI" | "FR" | "GB"
        | "GR" | "HR" | "HU" | "IE" | "IT" | "LT" | "LU" | "LV" | "NL" | "NO" | "PL" | "PT"
        | "RO" | "SE" | "SI" | "SK" => Region::Eu,
        _ => Region::Unknown,
    }
}

/// Region detection from the environment: FIELDSCAN_REGION wins over the
/// LANG locale.
pub fn detect_region_from_env() -> Region {
    let explicit = env::var("FIELDSCAN_REGION").ok();
    if let Some(code) = explicit.as_deref() {
        let region = detect_region(Some(code));
        if region != Region::Unknown {
            info!("Region set via FIELDSCAN_REGION: {}", region);
            return region;
        }
        warn!("FIELDSCAN_REGION '{}' not recognized", code);
    }

    let lang = env::var("LANG").ok();
    let region = detect_region(lang.as_deref());
    if region == Region::Unknown {
        info!("Region undetectable; Sub-GHz limited to the conservative band set");
    }
    region
}
