//! PIN gate with bounded retries and timed lockout.

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::app_state::AppState;
use crate::constants::{MAX_PIN_ATTEMPTS, PIN_LOCKOUT_COOLDOWN_SECS};
use crate::logbuf::{LogBuffer, LogLevel};

/// Authentication failure modes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// An operation that requires the PIN gate was attempted before it
    /// was passed.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Wrong PIN, attempts remain before lockout.
    #[error("invalid PIN ({attempts_remaining} attempt(s) remaining)")]
    InvalidPin { attempts_remaining: u8 },

    /// Attempt threshold reached; no attempt is accepted until the
    /// cooldown elapses, regardless of correctness.
    #[error("locked out; retry in {}s", .retry_after.as_secs())]
    LockedOut { retry_after: Duration },
}

/// Lockout policy. `Default` uses the fixed policy constants; tests
/// construct shorter cooldowns.
#[derive(Debug, Clone, Copy)]
pub struct Authenticator {
    pub max_attempts: u8,
    pub cooldown: Duration,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self {
            max_attempts: MAX_PIN_ATTEMPTS,
            cooldown: Duration::from_secs(PIN_LOCKOUT_COOLDOWN_SECS),
        }
    }
}

impl Authenticator {
    /// Verify a candidate PIN against the stored credential.
    ///
    /// Success sets the authenticated flag and resets the attempt
    /// counter. Every attempt is recorded in the activity log; a log
    /// storage failure never blocks authentication.
    pub fn authenticate(
        &self,
        state: &AppState,
        log: &LogBuffer,
        candidate: &[u8],
    ) -> Result<(), AuthError> {
        if state.clear_expired_lockout() {
            let _ = log.append(LogLevel::Info, "auth", "lockout cooldown elapsed");
        }

        if let Some(retry_after) = state.lockout_remaining() {
            let _ = log.append(
                LogLevel::Warning,
                "auth",
                &format!("attempt rejected during lockout ({}s remain)", retry_after.as_secs()),
            );
            return Err(AuthError::LockedOut { retry_after });
        }

        if state.pin_matches(candidate) {
            state.set_authenticated(true);
            state.reset_pin_attempts();
            let _ = log.append(LogLevel::Info, "auth", "authentication succeeded");
            return Ok(());
        }

        let attempts = state.record_failed_attempt(self.max_attempts);
        if attempts >= self.max_attempts {
            state.set_lockout_until(Instant::now() + self.cooldown);
            let _ = log.append(
                LogLevel::Warning,
                "auth",
                &format!("attempt threshold reached; locked out for {}s", self.cooldown.as_secs()),
            );
            Err(AuthError::LockedOut {
                retry_after: self.cooldown,
            })
        } else {
            let remaining = self.max_attempts - attempts;
            let _ = log.append(
                LogLevel::Warning,
                "auth",
                &format!("invalid PIN ({} attempt(s) remaining)", remaining),
            );
            Err(AuthError::InvalidPin {
                attempts_remaining: remaining,
            })
        }
    }
}
