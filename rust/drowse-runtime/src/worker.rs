//! Detached workers for blocking operations.
//!
//! A [`BackgroundTask`] runs one blocking closure (process wait, socket
//! connect or accept, a console read) on its own thread. The caller may wait
//! for the result with a timeout; a timeout leaves the work running and the
//! result can still be collected by a later wait.

use crate::panic_boundary::catch_panic;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker timed out after {0} ms")]
    Timeout(u64),
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("worker result was already taken")]
    Finished,
}

impl From<WorkerError> for drowse_core::EngineError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Timeout(ms) => drowse_core::EngineError::Timeout(ms),
            WorkerError::Panicked(msg) => drowse_core::EngineError::Fatal(msg),
            WorkerError::Finished => {
                drowse_core::EngineError::runtime("worker result was already taken")
            }
        }
    }
}

pub struct BackgroundTask<T> {
    name: String,
    result: Receiver<Result<T, WorkerError>>,
    done: Mutex<bool>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Start `work` on a detached thread.
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = bounded(1);
        let thread_name = name.clone();
        let spawned = thread::Builder::new()
            .name(format!("drowse-{}", thread_name))
            .spawn(move || {
                let outcome = catch_panic(AssertUnwindSafe(work))
                    .map_err(|e| WorkerError::Panicked(e.message().to_string()));
                tracing::debug!(task = %thread_name, ok = outcome.is_ok(), "background task finished");
                let _ = tx.send(outcome);
            });
        if let Err(err) = spawned {
            tracing::warn!(task = %name, error = %err, "could not start background task");
        }
        BackgroundTask {
            name,
            result: rx,
            done: Mutex::new(false),
        }
    }

    /// Start `work` and hand its result to `callback` on the worker thread.
    pub fn spawn_with_callback<F, C>(name: impl Into<String>, work: F, callback: C) -> Self
    where
        T: Clone,
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        BackgroundTask::spawn(name, move || {
            let value = work();
            callback(value.clone());
            value
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block for the result. `None` waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<T, WorkerError> {
        let mut done = self.done.lock();
        if *done {
            return Err(WorkerError::Finished);
        }
        let outcome = match timeout {
            Some(limit) => match self.result.recv_timeout(limit) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(WorkerError::Timeout(limit.as_millis() as u64))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    Err(WorkerError::Panicked("worker exited without a result".into()))
                }
            },
            None => self
                .result
                .recv()
                .unwrap_or_else(|_| Err(WorkerError::Panicked("worker exited without a result".into()))),
        };
        *done = true;
        outcome
    }

    pub fn is_finished(&self) -> bool {
        *self.done.lock() || !self.result.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn wait_returns_result() {
        let task = BackgroundTask::spawn("sum", || 2 + 2);
        assert_eq!(task.wait(None), Ok(4));
        assert_eq!(task.wait(None), Err(WorkerError::Finished));
    }

    #[test]
    fn timeout_leaves_work_running() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let task = BackgroundTask::spawn("slow", move || {
            let _ = release_rx.recv();
            "done"
        });
        assert_eq!(
            task.wait(Some(Duration::from_millis(20))),
            Err(WorkerError::Timeout(20))
        );
        release_tx.send(()).unwrap();
        assert_eq!(task.wait(Some(Duration::from_secs(5))), Ok("done"));
    }

    #[test]
    fn panics_become_errors() {
        let task = BackgroundTask::spawn("boom", || -> i32 { panic!("worker blew up") });
        match task.wait(Some(Duration::from_secs(5))) {
            Err(WorkerError::Panicked(msg)) => assert!(msg.contains("worker blew up")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn callback_receives_value() {
        let (tx, rx) = mpsc::channel();
        let task = BackgroundTask::spawn_with_callback("cb", || 7, move |v| {
            let _ = tx.send(v);
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        assert_eq!(task.wait(None), Ok(7));
    }
}
