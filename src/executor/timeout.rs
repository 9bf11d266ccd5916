//! Timeout guard
//!
//! Runs a leaf on a dedicated worker thread and waits for it up to a budget.
//! On overrun the worker's token is cancelled and the worker is joined
//! unconditionally before the timeout is reported, so a late completion can
//! never overwrite the timeout failure. A worker that never reaches a
//! cancellation checkpoint keeps the join blocked.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::leaf::discard_payload;
use crate::context::CancellationToken;
use crate::error::EngineError;

/// How a guarded run ended
#[derive(Debug, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    Completed(T),
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutGuard {
    budget: Duration,
}

impl TimeoutGuard {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Message recorded for a test that overran its budget
    pub fn failure_message(&self) -> String {
        format!("Test exceeded Timeout value of {}ms", self.budget.as_millis())
    }

    /// Run `work` on a worker named after `name`, cancelling `token` on overrun
    pub fn run<T, F>(
        &self,
        name: &str,
        token: &CancellationToken,
        work: F,
    ) -> Result<GuardOutcome<T>, EngineError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(worker_name(name))
            .spawn(move || {
                // The receiver is gone once the guard gave up on this worker
                let _ = tx.send(work());
            })
            .map_err(EngineError::WorkerSpawn)?;

        match rx.recv_timeout(self.budget) {
            Ok(value) => {
                join_worker(handle);
                Ok(GuardOutcome::Completed(value))
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "{} exceeded {}ms, cancelling worker",
                    name,
                    self.budget.as_millis()
                );
                token.cancel();

                // Wait for the worker to actually terminate before reporting
                join_worker(handle);
                debug!("Worker for {} terminated", name);
                Ok(GuardOutcome::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => {
                join_worker(handle);
                Err(EngineError::WorkerLost {
                    name: name.to_string(),
                })
            }
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if let Err(payload) = handle.join() {
        discard_payload(payload);
    }
}

fn worker_name(name: &str) -> String {
    format!("timeout:{}", name.replace('\0', ""))
}
