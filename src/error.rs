//! Unified error types for the fieldscan core.
//!
//! [`CoreError`] covers every failure mode the runtime can surface to a
//! caller. Modules with richer internal failure detail keep their own
//! error types ([`AuthError`](crate::auth::AuthError),
//! [`HardwareError`](crate::scan::HardwareError)) and convert into
//! `CoreError` at the boundary.

use std::io;
use thiserror::Error;

use crate::auth::AuthError;
use crate::scan::HardwareError;

/// Convenience alias for core results.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Exit status used when the watchdog forces termination; outside the
/// `CoreError` range so a supervisor-driven halt is distinguishable.
pub const WATCHDOG_HALT_EXIT_CODE: i32 = 8;

/// The unified error type for all fieldscan operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A resource could not be acquired during startup. Fatal.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Persistent storage open/read/write failed.
    #[error("storage I/O failure: {0}")]
    Storage(#[from] io::Error),

    /// A hardware module faulted or timed out.
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// PIN verification failed or the authenticator is locked out.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A scan pass could not be completed.
    #[error("scan failed: {0}")]
    Scan(String),

    /// A caller-supplied parameter was rejected before any hardware call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failure that fits no other category.
    #[error("unknown error")]
    Unknown,
}

impl CoreError {
    /// Process exit status for this error. Zero is reserved for clean exit.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Init(_) => 1,
            CoreError::Storage(_) => 2,
            CoreError::Hardware(_) => 3,
            CoreError::Auth(_) => 4,
            CoreError::Scan(_) => 5,
            CoreError::InvalidParameter(_) => 6,
            CoreError::Unknown => 7,
        }
    }

    /// True for errors that must terminate the process rather than degrade.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Init(_))
    }
}
