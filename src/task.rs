//! Spawning the threads that back a promise.
//!
//! Every unit of work a promise runs concurrently (its producer, each `then` waiter and the
//! bridges adopting external receivers) is an OS thread spawned through [`spawn`].

use std::{io, thread};

/// Logs the exit of a named task when dropped, including exits by unwinding.
struct ExitLog(String);

impl Drop for ExitLog {
    fn drop(&mut self) {
        if thread::panicking() {
            log::trace!("task '{}' exiting by panic", self.0);
        } else {
            log::trace!("task '{}' exiting", self.0);
        }
    }
}

/// Runs `task` to completion on a new, detached thread.
///
/// If a `name` is given, the thread is named accordingly and its start and exit are logged at
/// `trace` level.
pub(crate) fn spawn<F>(name: Option<String>, task: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new();
    if let Some(name) = name.clone() {
        builder = builder.name(name);
    }
    builder.spawn(move || {
        let _guard;
        if let Some(name) = name {
            log::trace!("task '{name}' starting");
            _guard = ExitLog(name);
        }
        task();
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;
    use crate::test::recv;

    #[test]
    fn named_task() {
        let (tx, rx) = bounded(1);
        spawn(Some("named-task".into()), move || {
            tx.send(thread::current().name().map(String::from)).unwrap();
        })
        .unwrap();
        assert_eq!(recv(&rx).as_deref(), Some("named-task"));
    }

    #[test]
    fn unnamed_task() {
        let (tx, rx) = bounded(1);
        spawn(None, move || {
            tx.send(thread::current().name().map(String::from)).unwrap();
        })
        .unwrap();
        assert_eq!(recv(&rx), None);
    }
}
