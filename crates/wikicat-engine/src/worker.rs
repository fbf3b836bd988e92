//! Background migration thread
//!
//! The orchestrator runs on its own named thread so the host thread stays
//! free to serve the review endpoint. The orchestrator (and with it the
//! confirmation channel) is dropped before the report is handed back, which
//! ends [`crate::ReviewEndpoint::serve`] on the host side.

use crate::cancel::CancelToken;
use crate::orchestrator::MigrationOrchestrator;
use crate::report::RunReport;
use crate::rows::MigrationRow;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use wikicat_core::errors::{ExError, ExErrorKind, Result, WikicatError};
use wikicat_core_types::RunId;

/// How a graceful stop ended
#[derive(Debug)]
pub enum StopOutcome {
    Finished(RunReport),
    /// The worker did not reach a checkpoint in time and was left running detached
    TimedOut,
    /// The worker thread panicked
    Panicked,
}

pub struct MigrationHandle {
    run_id: RunId,
    cancel: CancelToken,
    done: Receiver<RunReport>,
    thread: Option<JoinHandle<()>>,
}

/// Start `orchestrator` over `rows` on a background thread
///
/// # Errors
///
/// `ERR_INTERNAL` when the thread cannot be spawned.
pub fn spawn_migration(
    orchestrator: MigrationOrchestrator,
    rows: Vec<std::result::Result<MigrationRow, WikicatError>>,
) -> Result<MigrationHandle> {
    let run_id = orchestrator.run_id().clone();
    let cancel = orchestrator.cancel_token();
    let (tx, rx) = channel::bounded(1);

    let thread = thread::Builder::new()
        .name("wikicat-migration".to_string())
        .spawn(move || {
            let report = orchestrator.run(&rows);
            drop(orchestrator);
            if tx.send(report).is_err() {
                debug!("Migration handle dropped before the report was collected");
            }
        })
        .map_err(|e| {
            ExError::new(ExErrorKind::Internal)
                .with_op("spawn_migration")
                .with_message(format!("failed to spawn migration thread: {}", e))
        })?;

    Ok(MigrationHandle {
        run_id,
        cancel,
        done: rx,
        thread: Some(thread),
    })
}

impl MigrationHandle {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Ask the worker to stop at its next checkpoint
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(run_id = %self.run_id, "Migration thread panicked after reporting");
            }
        }
    }

    /// Block until the run finishes
    ///
    /// # Errors
    ///
    /// `ERR_INTERNAL` when the worker thread panicked.
    pub fn wait(mut self) -> Result<RunReport> {
        match self.done.recv() {
            Ok(report) => {
                self.join();
                Ok(report)
            }
            Err(_) => Err(ExError::new(ExErrorKind::Internal)
                .with_op("wait_migration")
                .with_message("migration thread ended without a report")),
        }
    }

    /// Request a stop and wait up to `timeout` for the worker to wind down
    pub fn graceful_stop(mut self, timeout: Duration) -> StopOutcome {
        self.request_stop();
        match self.done.recv_timeout(timeout) {
            Ok(report) => {
                self.join();
                StopOutcome::Finished(report)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(run_id = %self.run_id, timeout_ms = timeout.as_millis() as u64, "Migration did not stop in time");
                StopOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => StopOutcome::Panicked,
        }
    }
}
