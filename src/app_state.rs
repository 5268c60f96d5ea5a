use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::logbuf::LogLevel;
use crate::region::Region;
use crate::scan::{Module, ModuleSet};

pub use crate::constants::{MAX_PIN_ATTEMPTS, PIN_LENGTH, PIN_LOCKOUT_COOLDOWN_SECS};

/// Application state shared across modules
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<AppStateInner>>,
}

pub struct AppStateInner {
    /// Whether initialization completed (config applied, resources acquired)
    pub initialized: bool,
    /// Whether the operator has passed the PIN gate
    pub authenticated: bool,
    /// Whether a scan session is currently running
    pub scan_active: bool,
    /// Cooperative exit flag, polled between scheduler steps
    pub exit_requested: bool,
    /// Duration a single module scan may run (ms)
    pub scan_duration_ms: u64,
    /// Pause between module scans (ms)
    pub scan_interval_ms: u64,
    /// Active regulatory region
    pub region: Region,
    /// Stored PIN credential, compared byte-exact
    pub pin_code: [u8; PIN_LENGTH],
    /// Failed attempts since the last success (never exceeds the threshold)
    pub pin_attempts: u8,
    /// End of the lockout cooldown, if a lockout is active
    pub lockout_until: Option<Instant>,
    /// Minimum severity passed through to the activity log
    pub log_level: LogLevel,
    /// Per-module enable flags
    pub modules: ModuleSet,
    /// Last liveness signal from the main loop
    pub last_heartbeat: Instant,
    /// Process start, for session-duration tracking
    pub start_time: Instant,
    /// Exit code of the first fatal error encountered
    pub last_error_code: Option<i32>,
}

impl AppState {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: Arc::new(Mutex::new(AppStateInner {
                initialized: false,
                authenticated: false,
                scan_active: false,
                exit_requested: false,
                scan_duration_ms: crate::constants::SCAN_DURATION_DEFAULT_MS,
                scan_interval_ms: crate::constants::SCAN_INTERVAL_DEFAULT_MS,
                region: Region::Unknown,
                pin_code: [0u8; PIN_LENGTH],
                pin_attempts: 0,
                lockout_until: None,
                log_level: LogLevel::Info,
                modules: ModuleSet::default(),
                last_heartbeat: now,
                start_time: now,
                last_error_code: None,
            })),
        }
    }

    pub fn lock(&self) -> parking_lot::MutexGuard<'_, AppStateInner> {
        self.inner.lock()
    }

    /// Populate configuration fields and mark the state initialized.
    pub fn apply_config(&self, config: &Config) {
        let mut state = self.inner.lock();
        state.scan_duration_ms = config.scan_duration_ms;
        state.scan_interval_ms = config.scan_interval_ms;
        state.region = config.region;
        state.log_level = config.log_level;
        state.modules = config.modules;
        state.initialized = true;
        log::debug!("Configuration applied, state initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().authenticated
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        let mut state = self.inner.lock();
        state.authenticated = authenticated;
        if !authenticated {
            // De-authentication ends any session in flight
            state.scan_active = false;
        }
    }

    /// Mark a scan session active. Refused while unauthenticated.
    pub fn begin_scan(&self) -> bool {
        let mut state = self.inner.lock();
        if !state.authenticated {
            log::debug!("begin_scan refused: not authenticated");
            return false;
        }
        state.scan_active = true;
        true
    }

    pub fn end_scan(&self) {
        self.inner.lock().scan_active = false;
    }

    pub fn is_scan_active(&self) -> bool {
        self.inner.lock().scan_active
    }

    /// Request that the application exit
    pub fn request_exit(&self) {
        self.inner.lock().exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.inner.lock().exit_requested
    }

    /// Update the liveness signal (called by the main loop between steps)
    pub fn touch_heartbeat(&self) {
        self.inner.lock().last_heartbeat = Instant::now();
    }

    /// Age of the last heartbeat
    pub fn heartbeat_elapsed(&self) -> Duration {
        self.inner.lock().last_heartbeat.elapsed()
    }

    pub fn session_elapsed(&self) -> Duration {
        self.inner.lock().start_time.elapsed()
    }

    pub fn set_pin(&self, pin: [u8; PIN_LENGTH]) {
        self.inner.lock().pin_code = pin;
    }

    /// Byte-exact comparison against the stored credential
    pub fn pin_matches(&self, candidate: &[u8]) -> bool {
        let state = self.inner.lock();
        candidate.len() == PIN_LENGTH && candidate == state.pin_code
    }

    pub fn pin_attempts(&self) -> u8 {
        self.inner.lock().pin_attempts
    }

    /// Record a failed attempt, capped at the given lockout threshold.
    /// Returns the new attempt count.
    pub fn record_failed_attempt(&self, threshold: u8) -> u8 {
        let mut state = self.inner.lock();
        if state.pin_attempts < threshold {
            state.pin_attempts += 1;
        }
        state.pin_attempts
    }

    pub fn reset_pin_attempts(&self) {
        let mut state = self.inner.lock();
        state.pin_attempts = 0;
        state.lockout_until = None;
    }

    pub fn set_lockout_until(&self, until: Instant) {
        self.inner.lock().lockout_until = Some(until);
    }

    /// Remaining lockout cooldown, if one is active.
    pub fn lockout_remaining(&self) -> Option<Duration> {
        let state = self.inner.lock();
        let until = state.lockout_until?;
        let now = Instant::now();
        (now < until).then(|| until - now)
    }

    /// Clear an expired lockout and reset the attempt counter.
    /// Returns true if a lockout was cleared.
    pub fn clear_expired_lockout(&self) -> bool {
        let mut state = self.inner.lock();
        match state.lockout_until {
            Some(until) if Instant::now() >= until => {
                state.lockout_until = None;
                state.pin_attempts = 0;
                true
            }
            _ => false,
        }
    }

    pub fn region(&self) -> Region {
        self.inner.lock().region
    }

    pub fn set_region(&self, region: Region) {
        self.inner.lock().region = region;
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.inner.lock().scan_duration_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.inner.lock().scan_interval_ms)
    }

    pub fn module_enabled(&self, module: Module) -> bool {
        self.inner.lock().modules.is_enabled(module)
    }

    pub fn set_module_enabled(&self, module: Module, enabled: bool) {
        self.inner.lock().modules.set_enabled(module, enabled);
    }

    pub fn log_level(&self) -> LogLevel {
        self.inner.lock().log_level
    }

    /// Record the first fatal error; later errors do not overwrite it.
    pub fn record_error_code(&self, code: i32) {
        let mut state = self.inner.lock();
        if state.last_error_code.is_none() {
            state.last_error_code = Some(code);
        }
    }

    /// Process exit status: first fatal error code, or 0 for a clean run.
    pub fn exit_code(&self) -> i32 {
        self.inner.lock().last_error_code.unwrap_or(0)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_scan_requires_authentication() {
        let state = AppState::new();
        assert!(
            !state.begin_scan(),
            "Scan must be refused while unauthenticated"
        );
        assert!(!state.is_scan_active());

        state.set_authenticated(true);
        assert!(state.begin_scan(), "Scan must start once authenticated");
        assert!(state.is_scan_active());
    }

    #[test]
    fn test_deauthentication_ends_scan() {
        let state = AppState::new();
        state.set_authenticated(true);
        assert!(state.begin_scan());

        state.set_authenticated(false);
        assert!(
            !state.is_scan_active(),
            "Dropping authentication must end the active session"
        );
    }

    #[test]
    fn test_failed_attempts_capped_at_threshold() {
        let state = AppState::new();
        for _ in 0..10 {
            state.record_failed_attempt(MAX_PIN_ATTEMPTS);
        }
        assert_eq!(
            state.pin_attempts(),
            MAX_PIN_ATTEMPTS,
            "Attempt counter must never exceed the lockout threshold"
        );
    }

    #[test]
    fn test_lockout_expiry_resets_attempts() {
        let state = AppState::new();
        state.record_failed_attempt(MAX_PIN_ATTEMPTS);
        state.record_failed_attempt(MAX_PIN_ATTEMPTS);
        state.record_failed_attempt(MAX_PIN_ATTEMPTS);
        state.set_lockout_until(Instant::now() + Duration::from_millis(50));

        assert!(state.lockout_remaining().is_some());
        assert!(!state.clear_expired_lockout(), "Lockout still active");

        thread::sleep(Duration::from_millis(80));
        assert!(state.clear_expired_lockout(), "Expired lockout must clear");
        assert_eq!(state.pin_attempts(), 0);
        assert!(state.lockout_remaining().is_none());
    }

    #[test]
    fn test_pin_comparison_is_byte_exact() {
        let state = AppState::new();
        state.set_pin(*b"123456");
        assert!(state.pin_matches(b"123456"));
        assert!(!state.pin_matches(b"123457"));
        assert!(!state.pin_matches(b"12345"), "Short candidate must fail");
        assert!(!state.pin_matches(b"1234567"), "Long candidate must fail");
    }

    #[test]
    fn test_heartbeat_ages_until_touched() {
        let state = AppState::new();
        thread::sleep(Duration::from_millis(30));
        assert!(state.heartbeat_elapsed() >= Duration::from_millis(30));

        state.touch_heartbeat();
        assert!(state.heartbeat_elapsed() < Duration::from_millis(30));
    }

    #[test]
    fn test_first_error_code_wins() {
        let state = AppState::new();
        assert_eq!(state.exit_code(), 0);
        state.record_error_code(4);
        state.record_error_code(2);
        assert_eq!(state.exit_code(), 4, "First fatal error drives the status");
    }
}
