//! Progress notices for hosts
//!
//! The orchestrator reports what it does through a [`ProgressSink`]. Hosts
//! render these however they like; [`TracingProgress`] turns them into log
//! lines.

use crate::orchestrator::RowState;
use std::time::Duration;
use tracing::{info, warn};

/// Which rewrite pass changed a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Links,
    Templates,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Links => write!(f, "phase 1"),
            Phase::Templates => write!(f, "phase 2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        rows: usize,
    },
    RowStarted {
        line: usize,
        old: String,
        new: String,
    },
    RowState {
        line: usize,
        state: RowState,
    },
    MalformedRow {
        line: usize,
        reason: String,
    },
    MembersListed {
        category: String,
        count: usize,
    },
    PageChanged {
        page: String,
        phase: Phase,
        changes: usize,
        /// Template labels, `[partial]`-suffixed where found by partial match
        templates: Vec<String>,
    },
    PageUnchanged {
        page: String,
    },
    TemplateSkipped {
        page: String,
        template: String,
        /// Skipped by a stored disposition rather than by the reviewer
        automatic: bool,
        partial: bool,
    },
    RateLimited {
        op: &'static str,
        title: String,
        attempt: u32,
        attempts: u32,
        pause: Duration,
    },
    Failed {
        title: String,
        message: String,
    },
    Cancelled,
    RunFinished {
        pages_changed: usize,
        cancelled: bool,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

/// Logs every event at `info` (failures at `warn`)
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { rows } => info!(rows, "Migration started"),
            ProgressEvent::RowStarted { line, old, new } => {
                info!(line, old = %old, new = %new, "Row started")
            }
            ProgressEvent::RowState { line, state } => info!(line, state = ?state, "Row state"),
            ProgressEvent::MalformedRow { line, reason } => {
                warn!(line, reason = %reason, "Malformed row skipped")
            }
            ProgressEvent::MembersListed { category, count } => {
                info!(category = %category, count, "Members listed")
            }
            ProgressEvent::PageChanged {
                page,
                phase,
                changes,
                templates,
            } => info!(
                page = %page,
                phase = %phase,
                changes,
                templates = %templates.join(", "),
                "Page migrated"
            ),
            ProgressEvent::PageUnchanged { page } => info!(page = %page, "Page unchanged"),
            ProgressEvent::TemplateSkipped {
                page,
                template,
                automatic,
                partial,
            } => info!(page = %page, template = %template, automatic, partial, "Template skipped"),
            ProgressEvent::RateLimited {
                op,
                title,
                attempt,
                attempts,
                pause,
            } => warn!(
                op,
                title = %title,
                attempt,
                attempts,
                pause_ms = pause.as_millis() as u64,
                "Rate limited, backing off"
            ),
            ProgressEvent::Failed { title, message } => {
                warn!(title = %title, message = %message, "Operation failed")
            }
            ProgressEvent::Cancelled => warn!("Migration cancelled"),
            ProgressEvent::RunFinished {
                pages_changed,
                cancelled,
            } => info!(pages_changed, cancelled, "Migration finished"),
        }
    }
}
