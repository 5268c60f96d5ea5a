//! Centralized constants for the fieldscan application
//!
//! This module contains all configurable numerical values used throughout
//! the application. Each constant includes documentation on its purpose,
//! unit, and recommended value range.

// ============================================================================
// SCAN TIMING
// ============================================================================

/// Default duration a single module scan is allowed to run.
/// Unit: milliseconds
/// Recommended range: 5000-60000
pub const SCAN_DURATION_DEFAULT_MS: u64 = 30_000;

/// Minimum accepted scan duration.
/// Unit: milliseconds
/// Range: Fixed minimum, do not change without updating config validation
pub const SCAN_DURATION_MIN_MS: u64 = 1_000;

/// Maximum accepted scan duration.
/// Unit: milliseconds
/// Range: Fixed maximum (2 minutes); must stay below WATCHDOG_STALL_THRESHOLD_MS
pub const SCAN_DURATION_MAX_MS: u64 = 120_000;

/// Default pause between module scans (duty-cycle / regulatory spacing).
/// Unit: milliseconds
/// Recommended range: 100-5000
pub const SCAN_INTERVAL_DEFAULT_MS: u64 = 300;

/// Minimum accepted inter-scan interval.
/// Unit: milliseconds
pub const SCAN_INTERVAL_MIN_MS: u64 = 50;

/// Maximum accepted inter-scan interval.
/// Unit: milliseconds
pub const SCAN_INTERVAL_MAX_MS: u64 = 60_000;

/// Frequency step for Sub-GHz sweeps.
/// Unit: Hz
/// Recommended range: 50000-500000 (finer steps lengthen the sweep)
pub const SUBGHZ_SCAN_STEP_HZ: u32 = 250_000;

// ============================================================================
// ACTIVITY LOG BUFFER
// ============================================================================

/// Number of log entries buffered before an automatic flush to storage.
/// Unit: entries
/// Range: Fixed; sized for a storage-constrained device
pub const LOG_BUFFER_CAPACITY: usize = 10;

/// Maximum size of a single formatted log entry.
/// Unit: bytes
/// Range: Fixed; longer messages are truncated
pub const LOG_ENTRY_MAX_BYTES: usize = 256;

/// Maximum entries retained in the in-memory fallback trace when storage
/// writes fail.
/// Unit: entries
pub const LOG_FALLBACK_TRACE_CAPACITY: usize = 32;

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Length of the PIN code.
/// Unit: digits
/// Range: Fixed; credential store and prompts assume this length
pub const PIN_LENGTH: usize = 6;

/// Failed attempts allowed before a temporary lockout.
/// Unit: attempts
pub const MAX_PIN_ATTEMPTS: u8 = 3;

/// Lockout cooldown after the attempt threshold is reached.
/// Unit: seconds
/// Recommended range: 30-600
pub const PIN_LOCKOUT_COOLDOWN_SECS: u64 = 60;

// ============================================================================
// WATCHDOG
// ============================================================================

/// Supervisor wake-up interval between heartbeat checks.
/// Unit: milliseconds
/// Recommended range: 1000-10000
pub const WATCHDOG_CHECK_INTERVAL_MS: u64 = 5_000;

/// Heartbeat age treated as a stalled main loop.
/// Unit: milliseconds
/// Range: Must exceed SCAN_DURATION_MAX_MS so a bounded scan never trips it
pub const WATCHDOG_STALL_THRESHOLD_MS: u64 = 180_000;

// ============================================================================
// FILE NAMES
// ============================================================================

/// Configuration file name under the application config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Sealed credential file name under the application config directory.
pub const CREDENTIAL_FILE_NAME: &str = "credential.bin";

/// Activity log file name under the application data directory.
pub const LOG_FILE_NAME: &str = "activity.log";

/// Application directory name used under the platform config/data roots.
pub const APP_DIR_NAME: &str = "fieldscan";

// ============================================================================
// FILE PERMISSIONS
// ============================================================================

/// Credential file permissions (user read/write only).
/// Unit: Unix permission bits (octal)
pub const CREDENTIAL_FILE_PERMISSIONS: u32 = 0o600;
