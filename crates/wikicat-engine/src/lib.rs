//! wikicat engine: migration orchestration
//!
//! Composes the core rule engine and the store into a running migration:
//! - [`mutator::RateLimitedMutator`] paces and retries every page write
//! - [`confirmation`] bridges the worker to a human review surface
//! - [`orchestrator::MigrationOrchestrator`] drives rows, moves and both
//!   rewrite phases
//! - [`worker`] runs the orchestrator on a background thread
//!
//! ## Logging Ownership
//!
//! The engine owns lifecycle logging (`log_op_start!`, `log_op_end!`,
//! `log_op_error!`) for runs, rows and pages. Store and core only emit
//! `tracing::debug!` details and warnings.

pub mod cancel;
pub mod config;
pub mod confirmation;
pub mod mutator;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod rows;
pub mod worker;

pub use cancel::CancelToken;
pub use config::{MigrationOptions, NamespaceSelection, ThrottleSettings, WikicatConfig};
pub use confirmation::{confirmation_pair, ConfirmationChannel, ReviewEndpoint};
pub use mutator::RateLimitedMutator;
pub use orchestrator::{Collaborators, MigrationOrchestrator, MoveOutcome, RowState};
pub use progress::{ProgressEvent, ProgressSink, TracingProgress};
pub use report::RunReport;
pub use rows::{parse_rows, MigrationRow};
pub use worker::{spawn_migration, MigrationHandle, StopOutcome};
