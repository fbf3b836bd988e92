//! Human review of proposed substitutions

use crate::errors::{ExError, ExErrorKind, Result};
use crate::rules::DedupePolicy;
use serde::{Deserialize, Serialize};
use wikicat_core_types::RequestId;

/// A substitution awaiting a reviewer's decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub id: RequestId,
    pub page: String,
    pub template: String,
    /// Invocation as it currently reads
    pub fragment: String,
    /// Invocation after the substitution
    pub proposed: String,
    pub old_value: String,
    pub new_value: String,
    /// 1-based positional indices that would hold the new value twice or more
    #[serde(default)]
    pub duplicates: Vec<usize>,
    /// Found through a partial name match
    #[serde(default)]
    pub partial: bool,
}

impl ConfirmationRequest {
    pub fn has_duplicates(&self) -> bool {
        self.duplicates.len() >= 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Apply,
    Skip,
    Cancel,
}

/// Reviewer's answer, correlated by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub id: RequestId,
    pub action: ReviewAction,
    /// Hand-edited replacement for the whole invocation
    #[serde(default)]
    pub edited_fragment: Option<String>,
    /// Approve this template for the rest of the run and future runs
    #[serde(default)]
    pub auto_confirm_all: bool,
    /// Never prompt for this template again
    #[serde(default)]
    pub auto_skip_all: bool,
    #[serde(default)]
    pub dedupe: Option<DedupePolicy>,
}

impl ConfirmationResponse {
    fn with_action(id: RequestId, action: ReviewAction) -> Self {
        Self {
            id,
            action,
            edited_fragment: None,
            auto_confirm_all: false,
            auto_skip_all: false,
            dedupe: None,
        }
    }

    pub fn apply(id: RequestId) -> Self {
        Self::with_action(id, ReviewAction::Apply)
    }

    pub fn skip(id: RequestId) -> Self {
        Self::with_action(id, ReviewAction::Skip)
    }

    pub fn cancel(id: RequestId) -> Self {
        Self::with_action(id, ReviewAction::Cancel)
    }

    pub fn with_edited(mut self, fragment: impl Into<String>) -> Self {
        self.edited_fragment = Some(fragment.into());
        self
    }

    pub fn with_dedupe(mut self, policy: DedupePolicy) -> Self {
        self.dedupe = Some(policy);
        self
    }

    pub fn confirm_all(mut self) -> Self {
        self.auto_confirm_all = true;
        self
    }

    pub fn skip_all(mut self) -> Self {
        self.auto_skip_all = true;
        self
    }
}

/// Renders a request to a human and returns their decision
///
/// Runs on the reviewer-facing thread, never on the migration worker.
pub trait ReviewSurface: Send {
    /// # Errors
    ///
    /// Returns `ExErrorKind::ReviewUnavailable` when no decision can be
    /// obtained (closed input, broken terminal). The bridge turns any error
    /// into a `skip` for that request.
    fn review(&mut self, request: &ConfirmationRequest) -> Result<ConfirmationResponse>;
}

/// Surface for unattended runs: every request is skipped
pub struct SkipAllReviewSurface;

impl ReviewSurface for SkipAllReviewSurface {
    fn review(&mut self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        Ok(ConfirmationResponse::skip(request.id.clone()))
    }
}

/// Surface that is never available
pub struct NoopReviewSurface;

impl ReviewSurface for NoopReviewSurface {
    fn review(&mut self, _: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        Err(ExError::new(ExErrorKind::ReviewUnavailable)
            .with_op("review")
            .with_message("No review surface configured"))
    }
}
