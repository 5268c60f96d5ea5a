//! Scan module types and the hardware backend seam.
//!
//! The core never talks to radio or NFC hardware directly. Each module's
//! scan primitive is an injected capability behind [`ScanBackend`], so the
//! scheduler logic stays testable and driver integration happens in one
//! place.

pub mod scheduler;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One hardware scanning subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    SubGhz,
    Nfc,
    Wifi,
    Bt,
}

/// Fixed priority order the scheduler walks during a session.
pub const MODULE_PRIORITY: [Module; 4] = [Module::SubGhz, Module::Nfc, Module::Wifi, Module::Bt];

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Module::SubGhz => "SubGhz",
            Module::Nfc => "NFC",
            Module::Wifi => "WiFi",
            Module::Bt => "BT",
        };
        write!(f, "{}", name)
    }
}

/// Per-module enable flags over the closed module set.
///
/// A struct of booleans rather than a map keeps the set closed: adding a
/// module without wiring it through here and the scheduler fails to
/// compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSet {
    pub subghz: bool,
    pub nfc: bool,
    pub wifi: bool,
    pub bt: bool,
}

impl ModuleSet {
    pub fn is_enabled(&self, module: Module) -> bool {
        match module {
            Module::SubGhz => self.subghz,
            Module::Nfc => self.nfc,
            Module::Wifi => self.wifi,
            Module::Bt => self.bt,
        }
    }

    pub fn set_enabled(&mut self, module: Module, enabled: bool) {
        match module {
            Module::SubGhz => self.subghz = enabled,
            Module::Nfc => self.nfc = enabled,
            Module::Wifi => self.wifi = enabled,
            Module::Bt => self.bt = enabled,
        }
    }

    pub fn enabled_count(&self) -> usize {
        MODULE_PRIORITY
            .iter()
            .filter(|m| self.is_enabled(**m))
            .count()
    }
}

impl Default for ModuleSet {
    /// Sub-GHz and NFC are on-board; WiFi/BT need expansion hardware and
    /// default to disabled.
    fn default() -> Self {
        Self {
            subghz: true,
            nfc: true,
            wifi: false,
            bt: false,
        }
    }
}

/// Parameters for one bounded scan primitive invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanRequest {
    /// Sweep a frequency range at the given step, all in Hz.
    SubGhz {
        freq_start_hz: u32,
        freq_end_hz: u32,
        freq_step_hz: u32,
    },
    /// Poll for a contactless tag in field range.
    Nfc,
    /// Passive 2.4 GHz network survey.
    Wifi,
    /// Bluetooth LE advertisement survey.
    Bt,
}

impl ScanRequest {
    pub fn module(&self) -> Module {
        match self {
            ScanRequest::SubGhz { .. } => Module::SubGhz,
            ScanRequest::Nfc => Module::Nfc,
            ScanRequest::Wifi => Module::Wifi,
            ScanRequest::Bt => Module::Bt,
        }
    }
}

/// What a completed scan primitive observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    SubGhz {
        /// (frequency Hz, RSSI dBm) peaks above the squelch floor.
        peaks: Vec<(u32, i16)>,
    },
    Nfc {
        /// Raw tag UID, if a tag answered the poll.
        uid: Option<Vec<u8>>,
    },
    Wifi {
        networks_seen: u32,
    },
    Bt {
        devices_seen: u32,
    },
}

impl ScanOutcome {
    /// One-line summary for the activity log.
    pub fn summary(&self) -> String {
        match self {
            ScanOutcome::SubGhz { peaks } => format!("{} signal peak(s)", peaks.len()),
            ScanOutcome::Nfc { uid: Some(uid) } => format!("tag uid={}", hex::encode(uid)),
            ScanOutcome::Nfc { uid: None } => "no tag in field".to_string(),
            ScanOutcome::Wifi { networks_seen } => format!("{} network(s)", networks_seen),
            ScanOutcome::Bt { devices_seen } => format!("{} device(s)", devices_seen),
        }
    }
}

/// Hardware-level failure of a scan primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("hardware module not present or failed to initialize")]
    Unavailable,
    #[error("scan primitive did not complete within its bounded duration")]
    Timeout,
    #[error("hardware fault: {0}")]
    Fault(String),
}

/// Injected scan capability. Implementations block for at most `duration`.
pub trait ScanBackend {
    fn scan(
        &mut self,
        request: &ScanRequest,
        duration: Duration,
    ) -> std::result::Result<ScanOutcome, HardwareError>;
}

/// Driver-integration seam: accepts every request and observes nothing.
///
/// Real radio/NFC drivers replace this at the call site; nothing in the
/// core depends on it beyond the trait.
#[derive(Debug, Default)]
pub struct NullBackend;

impl ScanBackend for NullBackend {
    fn scan(
        &mut self,
        request: &ScanRequest,
        _duration: Duration,
    ) -> std::result::Result<ScanOutcome, HardwareError> {
        Ok(match request {
            ScanRequest::SubGhz { .. } => ScanOutcome::SubGhz { peaks: Vec::new() },
            ScanRequest::Nfc => ScanOutcome::Nfc { uid: None },
            ScanRequest::Wifi => ScanOutcome::Wifi { networks_seen: 0 },
            ScanRequest::Bt => ScanOutcome::Bt { devices_seen: 0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_module_set() {
        let modules = ModuleSet::default();
        assert!(modules.is_enabled(Module::SubGhz));
        assert!(modules.is_enabled(Module::Nfc));
        assert!(!modules.is_enabled(Module::Wifi));
        assert!(!modules.is_enabled(Module::Bt));
        assert_eq!(modules.enabled_count(), 2);
    }

    #[test]
    fn test_set_enabled_roundtrip() {
        let mut modules = ModuleSet::default();
        modules.set_enabled(Module::Bt, true);
        modules.set_enabled(Module::SubGhz, false);
        assert!(modules.is_enabled(Module::Bt));
        assert!(!modules.is_enabled(Module::SubGhz));
    }

    #[test]
    fn test_nfc_outcome_summary_renders_uid_hex() {
        let outcome = ScanOutcome::Nfc {
            uid: Some(vec![0x04, 0xa3, 0xbe, 0x1f]),
        };
        assert_eq!(outcome.summary(), "tag uid=04a3be1f");
    }

    #[test]
    fn test_null_backend_accepts_all_modules() {
        let mut backend = NullBackend;
        for request in [
            ScanRequest::SubGhz {
                freq_start_hz: 433_050_000,
                freq_end_hz: 434_790_000,
                freq_step_hz: 250_000,
            },
            ScanRequest::Nfc,
            ScanRequest::Wifi,
            ScanRequest::Bt,
        ] {
            let outcome = backend
                .scan(&request, Duration::from_millis(1))
                .expect("null backend never fails");
            let matches = matches!(
                (&request, &outcome),
                (ScanRequest::SubGhz { .. }, ScanOutcome::SubGhz { .. })
                    | (ScanRequest::Nfc, ScanOutcome::Nfc { .. })
                    | (ScanRequest::Wifi, ScanOutcome::Wifi { .. })
                    | (ScanRequest::Bt, ScanOutcome::Bt { .. })
            );
            assert!(matches, "outcome variant must match request");
        }
    }
}
