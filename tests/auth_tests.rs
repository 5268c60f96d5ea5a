use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use fieldscan::app_state::AppState;
use fieldscan::auth::{AuthError, Authenticator};
use fieldscan::logbuf::{LogBuffer, LogLevel, LogSink};

/// Collects flushed lines in memory for assertions.
#[derive(Clone, Default)]
struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogSink for MemorySink {
    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        self.lines.lock().extend_from_slice(lines);
        Ok(())
    }
}

fn gate() -> (AppState, LogBuffer, MemorySink) {
    let state = AppState::new();
    state.set_pin(*b"123456");
    let sink = MemorySink::default();
    let log = LogBuffer::new(LogLevel::Debug, Box::new(sink.clone()));
    (state, log, sink)
}

#[test]
fn test_correct_pin_first_attempt() {
    let (state, log, _sink) = gate();
    let auth = Authenticator::default();

    assert!(auth.authenticate(&state, &log, b"123456").is_ok());
    assert!(state.is_authenticated());
    assert_eq!(state.pin_attempts(), 0);
}

#[test]
fn test_correct_pin_second_attempt_resets_counter() {
    let (state, log, _sink) = gate();
    let auth = Authenticator::default();

    assert_eq!(
        auth.authenticate(&state, &log, b"000000"),
        Err(AuthError::InvalidPin {
            attempts_remaining: 2
        })
    );
    assert_eq!(state.pin_attempts(), 1);

    assert!(auth.authenticate(&state, &log, b"123456").is_ok());
    assert!(state.is_authenticated());
    assert_eq!(state.pin_attempts(), 0, "Success must reset the counter");
}

#[test]
fn test_three_wrong_attempts_lock_out() {
    let (state, log, _sink) = gate();
    let auth = Authenticator::default();

    assert!(matches!(
        auth.authenticate(&state, &log, b"111111"),
        Err(AuthError::InvalidPin { .. })
    ));
    assert!(matches!(
        auth.authenticate(&state, &log, b"222222"),
        Err(AuthError::InvalidPin { .. })
    ));
    assert!(
        matches!(
            auth.authenticate(&state, &log, b"333333"),
            Err(AuthError::LockedOut { .. })
        ),
        "Third consecutive failure must lock out"
    );
    assert!(!state.is_authenticated());
}

#[test]
fn test_fourth_attempt_rejected_even_if_correct() {
    let (state, log, _sink) = gate();
    let auth = Authenticator::default();

    for wrong in [b"111111", b"222222", b"333333"] {
        let _ = auth.authenticate(&state, &log, wrong);
    }

    let result = auth.authenticate(&state, &log, b"123456");
    assert!(
        matches!(result, Err(AuthError::LockedOut { .. })),
        "Correct PIN during lockout must still be rejected, got {:?}",
        result
    );
    assert!(!state.is_authenticated());
}

#[test]
fn test_lockout_expiry_readmits_attempts() {
    let (state, log, _sink) = gate();
    let auth = Authenticator {
        max_attempts: 3,
        cooldown: Duration::from_millis(100),
    };

    for wrong in [b"111111", b"222222", b"333333"] {
        let _ = auth.authenticate(&state, &log, wrong);
    }
    assert!(matches!(
        auth.authenticate(&state, &log, b"123456"),
        Err(AuthError::LockedOut { .. })
    ));

    thread::sleep(Duration::from_millis(150));

    assert!(
        auth.authenticate(&state, &log, b"123456").is_ok(),
        "Correct PIN after cooldown must succeed"
    );
    assert!(state.is_authenticated());
    assert_eq!(state.pin_attempts(), 0);
}

#[test]
fn test_wrong_length_candidate_counts_as_failure() {
    let (state, log, _sink) = gate();
    let auth = Authenticator::default();

    assert!(matches!(
        auth.authenticate(&state, &log, b"123"),
        Err(AuthError::InvalidPin { .. })
    ));
    assert_eq!(state.pin_attempts(), 1);
}

#[test]
fn test_every_attempt_is_logged() {
    let (state, log, sink) = gate();
    let auth = Authenticator::default();

    let _ = auth.authenticate(&state, &log, b"999999");
    let _ = auth.authenticate(&state, &log, b"123456");
    log.flush(true).expect("flush must succeed");

    let lines = sink.lines.lock().clone();
    assert!(
        lines
            .iter()
            .any(|l| l.contains("WARNING") && l.contains("invalid PIN")),
        "Failed attempt must be logged at Warning"
    );
    assert!(
        lines
            .iter()
            .any(|l| l.contains("INFO") && l.contains("authentication succeeded")),
        "Successful attempt must be logged at Info"
    );
}
