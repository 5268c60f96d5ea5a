//! Scan session scheduler.
//!
//! Drives one bounded session over the enabled modules in fixed priority
//! order, with regulatory spacing between modules. The state lock is only
//! held to read or update flags; it is always released before a scan
//! primitive is invoked, so a long-running hardware poll never blocks log
//! writes or the watchdog.

use std::thread;
use std::time::Duration;

use crate::app_state::AppState;
use crate::auth::AuthError;
use crate::constants::SUBGHZ_SCAN_STEP_HZ;
use crate::error::CoreError;
use crate::logbuf::{LogBuffer, LogLevel};
use crate::region::Region;

use super::{Module, ScanBackend, ScanOutcome, ScanRequest, HardwareError, MODULE_PRIORITY};

/// Phase of the session state machine. Exit-requested is reachable from
/// every phase via the cooperative flag, not a phase of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Authenticating,
    Scanning,
    Cooldown,
}

/// Per-module outcome within one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleResult {
    /// Scan primitive completed; summary of what it observed.
    Completed(String),
    /// Hardware fault or timeout; module skipped for the rest of the session.
    Failed(HardwareError),
    /// Module disabled in configuration.
    Disabled,
}

/// Accounting for one bounded scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub results: Vec<(Module, ModuleResult)>,
    /// False when the session ended early on an exit request.
    pub completed: bool,
}

impl SessionReport {
    pub fn result_for(&self, module: Module) -> Option<&ModuleResult> {
        self.results
            .iter()
            .find(|(m, _)| *m == module)
            .map(|(_, r)| r)
    }
}

/// Drive one bounded scan session over the enabled modules.
///
/// Refuses to start while unauthenticated. Per-module failures are logged
/// and isolated; only an exit request or the watchdog ends the session
/// early.
pub fn run_session(
    state: &AppState,
    backend: &mut dyn ScanBackend,
    log: &LogBuffer,
) -> Result<SessionReport, CoreError> {
    let mut phase = SessionPhase::Idle;
    transition(state, log, &mut phase, SessionPhase::Authenticating);

    if !state.is_authenticated() {
        let _ = log.append(
            LogLevel::Warning,
            "scheduler",
            "session refused: not authenticated",
        );
        transition(state, log, &mut phase, SessionPhase::Idle);
        return Err(CoreError::Auth(AuthError::NotAuthenticated));
    }

    if !state.begin_scan() {
        return Err(CoreError::Auth(AuthError::NotAuthenticated));
    }
    transition(state, log, &mut phase, SessionPhase::Scanning);

    let duration = state.scan_duration();
    let interval = state.scan_interval();
    let region = state.region();

    let mut report = SessionReport {
        results: Vec::new(),
        completed: true,
    };
    let mut scanned_any = false;

    for module in MODULE_PRIORITY {
        if state.exit_requested() {
            let _ = log.append(LogLevel::Info, "scheduler", "exit requested; ending session");
            report.completed = false;
            break;
        }

        if !state.module_enabled(module) {
            report.results.push((module, ModuleResult::Disabled));
            continue;
        }

        // Regulatory spacing between module scans
        if scanned_any {
            thread::sleep(interval);
        }
        scanned_any = true;
        state.touch_heartbeat();

        let result = scan_module(backend, log, module, region, duration);
        report.results.push((module, result));
        state.touch_heartbeat();
    }

    transition(state, log, &mut phase, SessionPhase::Cooldown);
    if !state.exit_requested() {
        thread::sleep(interval);
    }

    state.end_scan();
    transition(state, log, &mut phase, SessionPhase::Idle);

    let _ = log.append(
        LogLevel::Info,
        "scheduler",
        &format!(
            "session finished: {} module(s) scanned, completed={}",
            report
                .results
                .iter()
                .filter(|(_, r)| !matches!(r, ModuleResult::Disabled))
                .count(),
            report.completed
        ),
    );

    Ok(report)
}

fn transition(state: &AppState, log: &LogBuffer, phase: &mut SessionPhase, next: SessionPhase) {
    state.touch_heartbeat();
    log::debug!("session phase {:?} -> {:?}", phase, next);
    let _ = log.append(
        LogLevel::Debug,
        "scheduler",
        &format!("phase {:?} -> {:?}", phase, next),
    );
    *phase = next;
}

/// Run one module's pass. Sub-GHz sweeps every permitted band for the
/// region, splitting the module's scan budget across them; a failure in
/// any band skips the module's remaining bands.
fn scan_module(
    backend: &mut dyn ScanBackend,
    log: &LogBuffer,
    module: Module,
    region: Region,
    duration: Duration,
) -> ModuleResult {
    match module {
        Module::SubGhz => {
            let bands = region.permitted_bands();
            let per_band = duration / bands.len() as u32;
            let mut summaries = Vec::with_capacity(bands.len());

            for band in bands {
                let request = ScanRequest::SubGhz {
                    freq_start_hz: band.start_hz,
                    freq_end_hz: band.end_hz,
                    freq_step_hz: SUBGHZ_SCAN_STEP_HZ,
                };
                match invoke(backend, log, module, &request, per_band) {
                    Ok(outcome) => summaries.push(outcome.summary()),
                    Err(e) => return ModuleResult::Failed(e),
                }
            }
            ModuleResult::Completed(summaries.join("; "))
        }
        Module::Nfc => match invoke(backend, log, module, &ScanRequest::Nfc, duration) {
            Ok(outcome) => ModuleResult::Completed(outcome.summary()),
            Err(e) => ModuleResult::Failed(e),
        },
        Module::Wifi => match invoke(backend, log, module, &ScanRequest::Wifi, duration) {
            Ok(outcome) => ModuleResult::Completed(outcome.summary()),
            Err(e) => ModuleResult::Failed(e),
        },
        Module::Bt => match invoke(backend, log, module, &ScanRequest::Bt, duration) {
            Ok(outcome) => ModuleResult::Completed(outcome.summary()),
            Err(e) => ModuleResult::Failed(e),
        },
    }
}

fn invoke(
    backend: &mut dyn ScanBackend,
    log: &LogBuffer,
    module: Module,
    request: &ScanRequest,
    duration: Duration,
) -> Result<ScanOutcome, HardwareError> {
    match backend.scan(request, duration) {
        Ok(outcome) => {
            let _ = log.append(
                LogLevel::Info,
                &module.to_string(),
                &format!("scan complete: {}", outcome.summary()),
            );
            Ok(outcome)
        }
        Err(e) => {
            let _ = log.append(
                LogLevel::Error,
                &module.to_string(),
                &format!("scan failed: {}; module skipped for this session", e),
            );
            Err(e)
        }
    }
}

/// Single-shot Sub-GHz sweep over an explicit range.
///
/// The range must lie entirely inside a band permitted for the active
/// region; anything else is rejected with `InvalidParameter` before any
/// hardware call.
pub fn subghz_scan_range(
    state: &AppState,
    backend: &mut dyn ScanBackend,
    log: &LogBuffer,
    freq_start_hz: u32,
    freq_end_hz: u32,
    freq_step_hz: u32,
) -> Result<ScanOutcome, CoreError> {
    if !state.is_authenticated() {
        return Err(CoreError::Auth(AuthError::NotAuthenticated));
    }
    if freq_step_hz == 0 {
        return Err(CoreError::InvalidParameter("frequency step must be non-zero".into()));
    }
    if freq_start_hz >= freq_end_hz {
        return Err(CoreError::InvalidParameter(format!(
            "invalid frequency range {}-{} Hz",
            freq_start_hz, freq_end_hz
        )));
    }

    let region = state.region();
    if !region.permits(freq_start_hz, freq_end_hz) {
        let _ = log.append(
            LogLevel::Warning,
            "SubGhz",
            &format!(
                "range {}-{} Hz rejected: outside {} permitted bands",
                freq_start_hz, freq_end_hz, region
            ),
        );
        return Err(CoreError::InvalidParameter(format!(
            "range {}-{} Hz not permitted in region {}",
            freq_start_hz, freq_end_hz, region
        )));
    }

    let request = ScanRequest::SubGhz {
        freq_start_hz,
        freq_end_hz,
        freq_step_hz,
    };
    invoke(backend, log, Module::SubGhz, &request, state.scan_duration()).map_err(CoreError::from)
}

/// Single-shot NFC tag poll.
pub fn nfc_scan(
    state: &AppState,
    backend: &mut dyn ScanBackend,
    log: &LogBuffer,
) -> Result<ScanOutcome, CoreError> {
    if !state.is_authenticated() {
        return Err(CoreError::Auth(AuthError::NotAuthenticated));
    }
    invoke(backend, log, Module::Nfc, &ScanRequest::Nfc, state.scan_duration())
        .map_err(CoreError::from)
}
