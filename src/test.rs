//! Internal unit test utilities.

use std::{fmt::Debug, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError};

/// Upper bound on how long any test waits for something that is expected to happen.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Receives the next value from a test channel, failing the test if none arrives in time.
pub fn recv<T>(rx: &Receiver<T>) -> T {
    match rx.recv_timeout(TIMEOUT) {
        Ok(value) => value,
        Err(e) => panic!("no value received within {TIMEOUT:?}: {e}"),
    }
}

/// Asserts that every sender of `rx` is dropped without a value being sent.
///
/// Callbacks own the senders, so this proves that a callback was dropped without having
/// been invoked.
pub fn assert_closed<T: Debug>(rx: &Receiver<T>) {
    match rx.recv_timeout(TIMEOUT) {
        Ok(value) => panic!("unexpected value received: {value:?}"),
        Err(RecvTimeoutError::Disconnected) => {}
        Err(RecvTimeoutError::Timeout) => panic!("channel not closed within {TIMEOUT:?}"),
    }
}

/// Asserts that nothing is received on `rx` for `dur`.
pub fn assert_silent<T: Debug>(rx: &Receiver<T>, dur: Duration) {
    match rx.recv_timeout(dur) {
        Ok(value) => panic!("unexpected value received: {value:?}"),
        Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
    }
}
