// Library interface for fieldscan
// This allows tests and the CLI binary to access the crate's functionality

pub mod app_state;
pub mod auth;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod logbuf;
pub mod region;
pub mod scan;
pub mod watchdog;

use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use app_state::AppState;
use auth::{AuthError, Authenticator};
use config::Config;
use error::CoreError;
use logbuf::{FileSink, LogBuffer, LogSink};
use scan::scheduler::{self, SessionReport};
use scan::ScanBackend;
use watchdog::{WatchdogPolicy, WatchdogSupervisor};

/// Core runtime shared between the CLI and tests: the state record, the
/// buffered activity log, and the orchestration around them.
pub struct FieldScanCore {
    pub state: AppState,
    log: LogBuffer,
    authenticator: Authenticator,
    shutdown_done: AtomicBool,
}

impl FieldScanCore {
    /// Create a core instance from a validated configuration and a log
    /// sink.
    pub fn new(config: &Config, sink: Box<dyn LogSink>) -> Self {
        let state = AppState::new();
        state.apply_config(config);

        Self {
            state,
            log: LogBuffer::new(config.log_level, sink),
            authenticator: Authenticator::default(),
            shutdown_done: AtomicBool::new(false),
        }
    }

    /// Create a core instance with the standard config and log paths.
    pub fn with_default_paths() -> Result<Self> {
        let config = Config::load();
        let sink = FileSink::new(Config::log_path());
        Ok(Self::new(&config, Box::new(sink)))
    }

    /// Load the sealed PIN from the credential store into the state.
    pub fn load_credential(&self, path: &Path) -> Result<()> {
        let pin = credential::load_pin(path)
            .context("Failed to load credential; run 'fieldscan --setup' to enroll a PIN")?;
        self.state.set_pin(pin);
        Ok(())
    }

    /// Verify a candidate PIN against the stored credential.
    pub fn authenticate(&self, candidate: &[u8]) -> std::result::Result<(), AuthError> {
        self.authenticator.authenticate(&self.state, &self.log, candidate)
    }

    /// Drive one bounded scan session over the enabled modules.
    pub fn run_session(
        &self,
        backend: &mut dyn ScanBackend,
    ) -> std::result::Result<SessionReport, CoreError> {
        self.state.touch_heartbeat();
        match scheduler::run_session(&self.state, backend, &self.log) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.state.record_error_code(e.exit_code());
                Err(e)
            }
        }
    }

    /// Start the liveness supervisor. `on_stall` runs after the forced
    /// log flush when the main loop is stalled.
    pub fn start_watchdog<F>(&self, policy: WatchdogPolicy, on_stall: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        WatchdogSupervisor::new(self.state.clone(), self.log.clone(), policy).spawn(on_stall)
    }

    /// Cooperative exit: observed by the scheduler between steps and by
    /// the watchdog at its next check.
    pub fn request_exit(&self) {
        self.state.request_exit();
    }

    /// Handle to the activity log.
    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Tear down once: final forced flush and exit logging. Safe to call
    /// from every exit path; only the first call acts.
    pub fn shutdown(&self) {
        if self.shutdown_done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.request_exit();
        let _ = self.log.append(
            logbuf::LogLevel::Info,
            "core",
            &format!(
                "shutdown after {}s, exit code {}",
                self.state.session_elapsed().as_secs(),
                self.state.exit_code()
            ),
        );
        if let Err(e) = self.log.flush(true) {
            log::error!("Final log flush failed: {}", e);
        }
        info!("Shutdown complete");
    }

    /// Process exit status: first fatal error code, or 0.
    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }
}

impl Drop for FieldScanCore {
    fn drop(&mut self) {
        // Resources are released on every path, early returns included
        self.shutdown();
    }
}
