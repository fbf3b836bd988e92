//! Run report

use crate::orchestrator::MoveOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use wikicat_core_types::RunId;

/// Outcome of one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowReport {
    pub line: usize,
    pub old: String,
    pub new: String,
    pub category: bool,
    pub move_outcome: Option<MoveOutcome>,
    pub members: usize,
    pub pages_changed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub rows_total: usize,
    pub rows_processed: usize,
    pub rows_malformed: usize,
    pub moves: usize,
    pub moves_skipped: usize,
    pub pages_seen: usize,
    pub pages_changed: usize,
    pub saves: usize,
    pub failed_saves: usize,
    pub prompts: usize,
    pub cancelled: bool,
    pub rows: Vec<RowReport>,
}

impl RunReport {
    pub fn start(run_id: &RunId, rows_total: usize) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            rows_total,
            rows_processed: 0,
            rows_malformed: 0,
            moves: 0,
            moves_skipped: 0,
            pages_seen: 0,
            pages_changed: 0,
            saves: 0,
            failed_saves: 0,
            prompts: 0,
            cancelled: false,
            rows: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// One-line human summary
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{}/{} rows, {} moved, {} pages changed ({} saves, {} failed), {} prompts",
            self.rows_processed,
            self.rows_total,
            self.moves,
            self.pages_changed,
            self.saves,
            self.failed_saves,
            self.prompts
        );
        if self.rows_malformed > 0 {
            line.push_str(&format!(", {} malformed rows", self.rows_malformed));
        }
        if self.cancelled {
            line.push_str(", cancelled");
        }
        line
    }
}
