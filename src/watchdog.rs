//! Liveness supervision for the main loop.
//!
//! The main loop touches the heartbeat between scheduler steps; the
//! supervisor thread only reads it. On a stall the supervisor logs at
//! Critical severity, force-flushes the activity log, and runs the
//! injected halt action. It is the only component allowed to force
//! termination outside the explicit exit-request path.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::app_state::AppState;
use crate::constants::{WATCHDOG_CHECK_INTERVAL_MS, WATCHDOG_STALL_THRESHOLD_MS};
use crate::logbuf::{LogBuffer, LogLevel};

/// Supervisor timing policy. `Default` uses the fixed constants; tests
/// construct millisecond-scale policies.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogPolicy {
    /// How often the supervisor wakes to check the heartbeat.
    pub check_interval: Duration,
    /// Heartbeat age treated as a stalled main loop.
    pub stall_threshold: Duration,
}

impl Default for WatchdogPolicy {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(WATCHDOG_CHECK_INTERVAL_MS),
            stall_threshold: Duration::from_millis(WATCHDOG_STALL_THRESHOLD_MS),
        }
    }
}

pub struct WatchdogSupervisor {
    state: AppState,
    log: LogBuffer,
    policy: WatchdogPolicy,
}

impl WatchdogSupervisor {
    pub fn new(state: AppState, log: LogBuffer, policy: WatchdogPolicy) -> Self {
        Self { state, log, policy }
    }

    /// One heartbeat check. Returns true if the main loop is stalled.
    pub fn is_stalled(&self) -> bool {
        self.state.heartbeat_elapsed() > self.policy.stall_threshold
    }

    /// Start the supervisor thread.
    ///
    /// `on_stall` runs after the Critical log entry and the forced flush:
    /// the binary passes a process halt, tests pass an observable flag.
    /// The thread exits quietly once `exit_requested` is set.
    pub fn spawn<F>(self, on_stall: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || {
                log::info!(
                    "Watchdog started: check every {:?}, stall threshold {:?}",
                    self.policy.check_interval,
                    self.policy.stall_threshold
                );

                loop {
                    thread::sleep(self.policy.check_interval);

                    if self.state.exit_requested() {
                        log::debug!("Watchdog exiting on exit request");
                        return;
                    }

                    if self.is_stalled() {
                        let stalled_for = self.state.heartbeat_elapsed();
                        log::error!(
                            "Main loop stalled: no heartbeat for {:?} (threshold {:?})",
                            stalled_for,
                            self.policy.stall_threshold
                        );

                        let _ = self.log.append(
                            LogLevel::Critical,
                            "watchdog",
                            &format!(
                                "liveness failure: no heartbeat for {}ms; forcing shutdown",
                                stalled_for.as_millis()
                            ),
                        );
                        if let Err(e) = self.log.flush(true) {
                            log::error!("Forced flush failed during watchdog shutdown: {}", e);
                        }

                        self.state.request_exit();
                        on_stall();
                        return;
                    }
                }
            })
            .expect("Failed to spawn watchdog thread")
    }
}
