//! Migration orchestrator
//!
//! Drives one run over the parsed rows. Each row moves through
//!
//! ```text
//! PendingMove -> MoveSettled(outcome) -> ContentMigration -> Done
//! ```
//!
//! where content migration only happens for category rows with member
//! migration enabled. Every member page gets at most one save per phase:
//! phase 1 rewrites direct category links, phase 2 rewrites template
//! parameters (stored rules first, then reviewer prompts).
//!
//! Cancellation is cooperative. It is checked between rows, between member
//! batches, between pages and before every prompt. A cancel during phase 2
//! discards that page's template rewrite.

use crate::cancel::CancelToken;
use crate::config::{MigrationOptions, NamespaceSelection, ThrottleSettings};
use crate::confirmation::ConfirmationChannel;
use crate::mutator::{RateLimitedMutator, Throttle};
use crate::progress::{Phase, ProgressEvent, ProgressSink, TracingProgress};
use crate::report::{RowReport, RunReport};
use crate::rows::MigrationRow;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use wikicat_core::candidates::{find_candidates, propose, Candidate, MatchKind, RenameNames};
use wikicat_core::errors::{ExError, ExErrorKind, Result, WikicatError};
use wikicat_core::invocation::{flat_spans, rewrite_spans, Invocation};
use wikicat_core::links::rewrite_category_links;
use wikicat_core::namespace::{
    ensure_prefixed, strip_namespace, NamespaceId, NamespacePrefixResolver, ProjectRef,
};
use wikicat_core::pages::{MembershipLister, PageStore};
use wikicat_core::review::{ConfirmationRequest, ReviewAction};
use wikicat_core::rules::{dedupe_positional, AutoState, DedupePolicy, ParamRef};
use wikicat_core::summary::{changed_templates, edit_summary};
use wikicat_core::text::unquote;
use wikicat_core::{log_op_end, log_op_error, log_op_start};
use wikicat_core_types::{RequestId, RunId};
use wikicat_store::RuleStore;

/// How the move step of a row ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved,
    /// The old title does not exist
    SkippedNotFound,
    /// The new title is already taken
    SkippedExists,
    /// Category moves are turned off
    MoveDisabled,
    Failed,
}

/// Lifecycle of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    PendingMove,
    MoveSettled(MoveOutcome),
    ContentMigration,
    Done,
}

/// Everything the orchestrator talks to
pub struct Collaborators {
    pub pages: Arc<dyn PageStore>,
    pub members: Arc<dyn MembershipLister>,
    pub resolver: Arc<dyn NamespacePrefixResolver>,
    pub rules: Arc<RuleStore>,
    pub confirmations: ConfirmationChannel,
}

/// Names and prefixes of one category rename
struct CategoryRename {
    names: RenameNames,
    /// Every recognised category prefix, for link matching
    prefixes: Vec<String>,
    /// Prefix written into rewritten links
    policy_prefix: String,
    comment: Option<String>,
}

/// Substitution settled for one invocation
struct Applied {
    fragment: String,
    partial: bool,
}

enum TemplatePass {
    Unchanged,
    Rewritten {
        text: String,
        changes: usize,
        labels: Vec<String>,
    },
    Cancelled,
}

pub struct MigrationOrchestrator {
    options: MigrationOptions,
    project: ProjectRef,
    members: Arc<dyn MembershipLister>,
    resolver: Arc<dyn NamespacePrefixResolver>,
    rules: Arc<RuleStore>,
    confirmations: ConfirmationChannel,
    mutator: RateLimitedMutator,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
    title_filter: Option<Regex>,
    run_id: RunId,
}

impl MigrationOrchestrator {
    /// # Errors
    ///
    /// `ERR_INVALID_INPUT` when the title filter does not compile or the
    /// throttle settings are inconsistent.
    pub fn new(
        collaborators: Collaborators,
        options: MigrationOptions,
        throttle: ThrottleSettings,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        throttle.validate()?;
        let title_filter = match options.title_filter.as_deref().map(str::trim) {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern).map_err(|e| {
                ExError::from(WikicatError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
                .with_op("compile_title_filter")
            })?),
            _ => None,
        };

        let Collaborators {
            pages,
            members,
            resolver,
            rules,
            confirmations,
        } = collaborators;
        let mutator = RateLimitedMutator::new(pages, Throttle::new(throttle), progress.clone());

        Ok(Self {
            project: options.project(),
            options,
            members,
            resolver,
            rules,
            confirmations,
            mutator,
            progress,
            cancel: CancelToken::new(),
            title_filter,
            run_id: RunId::new(),
        })
    }

    /// Orchestrator that reports progress only through the log
    ///
    /// # Errors
    ///
    /// As [`MigrationOrchestrator::new`].
    pub fn with_tracing(
        collaborators: Collaborators,
        options: MigrationOptions,
        throttle: ThrottleSettings,
    ) -> Result<Self> {
        Self::new(collaborators, options, throttle, Arc::new(TracingProgress))
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Process every row in order and report what happened
    ///
    /// Malformed rows are reported and skipped; they still count as processed.
    pub fn run(&self, rows: &[std::result::Result<MigrationRow, WikicatError>]) -> RunReport {
        log_op_start!("migration_run", run_id = %self.run_id, rows = rows.len());
        let start = Instant::now();

        let mut report = RunReport::start(&self.run_id, rows.len());
        self.progress
            .emit(&ProgressEvent::RunStarted { rows: rows.len() });

        for entry in rows {
            if self.cancel.is_cancelled() {
                break;
            }
            match entry {
                Ok(row) => {
                    let row_report = self.migrate_row(row, &mut report);
                    report.rows.push(row_report);
                }
                Err(err) => {
                    report.rows_malformed += 1;
                    let line = match err {
                        WikicatError::InvalidRow { line, .. } => *line,
                        _ => 0,
                    };
                    self.progress.emit(&ProgressEvent::MalformedRow {
                        line,
                        reason: err.to_string(),
                    });
                }
            }
            report.rows_processed += 1;
        }

        report.cancelled = self.cancel.is_cancelled();
        if report.cancelled {
            self.progress.emit(&ProgressEvent::Cancelled);
        }
        report.finish();
        self.progress.emit(&ProgressEvent::RunFinished {
            pages_changed: report.pages_changed,
            cancelled: report.cancelled,
        });

        log_op_end!(
            "migration_run",
            duration_ms = start.elapsed().as_millis() as u64,
            pages_changed = report.pages_changed,
            cancelled = report.cancelled
        );
        report
    }

    /// Move one row's page and, for categories, migrate its members
    pub fn migrate_row(&self, row: &MigrationRow, report: &mut RunReport) -> RowReport {
        log_op_start!("migrate_row", line = row.line, old = %row.old);
        let start = Instant::now();

        let (old, new, is_category) = self.resolve_titles(row);
        let comment = self.comment_for(row);
        let mut row_report = RowReport {
            line: row.line,
            old: old.clone(),
            new: new.clone(),
            category: is_category,
            move_outcome: None,
            members: 0,
            pages_changed: 0,
        };
        self.progress.emit(&ProgressEvent::RowStarted {
            line: row.line,
            old: old.clone(),
            new: new.clone(),
        });
        self.set_state(row, RowState::PendingMove);

        let migrate_members =
            is_category && self.options.move_members && (self.options.phase1 || self.options.phase2);

        if is_category && !migrate_members && matches!(self.mutator.exists(&old), Ok(false)) {
            self.progress.emit(&ProgressEvent::Failed {
                title: old.clone(),
                message: "category does not exist and member migration is off".to_string(),
            });
            row_report.move_outcome = Some(MoveOutcome::SkippedNotFound);
            report.moves_skipped += 1;
            self.set_state(row, RowState::MoveSettled(MoveOutcome::SkippedNotFound));
            self.set_state(row, RowState::Done);
            log_op_end!("migrate_row", duration_ms = start.elapsed().as_millis() as u64);
            return row_report;
        }

        let outcome = self.move_row(&old, &new, comment.as_deref().unwrap_or(""), is_category);
        match outcome {
            MoveOutcome::Moved => report.moves += 1,
            _ => report.moves_skipped += 1,
        }
        row_report.move_outcome = Some(outcome);
        self.set_state(row, RowState::MoveSettled(outcome));

        if migrate_members && !self.cancel.is_cancelled() {
            self.set_state(row, RowState::ContentMigration);
            let rename = self.rename_for(&old, &new, comment);
            self.migrate_members(&rename, &mut row_report, report);
        }

        self.set_state(row, RowState::Done);
        log_op_end!(
            "migrate_row",
            duration_ms = start.elapsed().as_millis() as u64,
            pages_changed = row_report.pages_changed
        );
        row_report
    }

    fn set_state(&self, row: &MigrationRow, state: RowState) {
        self.progress.emit(&ProgressEvent::RowState {
            line: row.line,
            state,
        });
    }

    fn resolve_titles(&self, row: &MigrationRow) -> (String, String, bool) {
        match self.options.namespace {
            NamespaceSelection::Auto => {
                let old = row.old.trim().to_string();
                let new = row.new.trim().to_string();
                let is_category =
                    self.resolver
                        .has_prefix(&self.project, &old, &[NamespaceId::CATEGORY]);
                (old, new, is_category)
            }
            NamespaceSelection::Id(ns) => {
                let resolver = self.resolver.as_ref();
                (
                    ensure_prefixed(resolver, &self.project, &row.old, ns),
                    ensure_prefixed(resolver, &self.project, &row.new, ns),
                    ns == NamespaceId::CATEGORY,
                )
            }
        }
    }

    fn comment_for(&self, row: &MigrationRow) -> Option<String> {
        self.options
            .override_comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or_else(|| Some(row.comment.trim()).filter(|c| !c.is_empty()))
            .map(str::to_string)
    }

    fn rename_for(&self, old: &str, new: &str, comment: Option<String>) -> CategoryRename {
        let resolver = self.resolver.as_ref();
        let ns = NamespaceId::CATEGORY;
        let old_full = ensure_prefixed(resolver, &self.project, old, ns);
        let new_full = ensure_prefixed(resolver, &self.project, new, ns);
        CategoryRename {
            names: RenameNames {
                old_bare: strip_namespace(resolver, &self.project, &old_full, ns),
                new_bare: strip_namespace(resolver, &self.project, &new_full, ns),
                old_full,
                new_full,
            },
            prefixes: resolver.known_prefixes(&self.project, ns),
            policy_prefix: resolver.policy_prefix(&self.project, ns),
            comment,
        }
    }

    fn move_row(&self, old: &str, new: &str, reason: &str, is_category: bool) -> MoveOutcome {
        if is_category && !self.options.move_category {
            return MoveOutcome::MoveDisabled;
        }
        match self.mutator.exists(old) {
            Ok(true) => {}
            Ok(false) => return MoveOutcome::SkippedNotFound,
            Err(err) => return self.move_failed(old, err),
        }
        match self.mutator.exists(new) {
            Ok(false) => {}
            Ok(true) => return MoveOutcome::SkippedExists,
            Err(err) => return self.move_failed(old, err),
        }

        let leave_redirect = if is_category {
            self.options.leave_category_redirect
        } else {
            self.options.leave_other_redirect
        };
        let start = Instant::now();
        match self.mutator.move_page(old, new, reason, leave_redirect) {
            Ok(()) => {
                debug!(old, new, leave_redirect, "Page moved");
                MoveOutcome::Moved
            }
            Err(err) => {
                log_op_error!(
                    "move_page",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                self.move_failed(old, err)
            }
        }
    }

    fn move_failed(&self, title: &str, err: ExError) -> MoveOutcome {
        self.progress.emit(&ProgressEvent::Failed {
            title: title.to_string(),
            message: err.to_string(),
        });
        MoveOutcome::Failed
    }

    /// Collect every member of `category`, following the cursor to the end
    fn list_members(&self, category: &str) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ExError::from(WikicatError::Cancelled).with_op("list_members"));
            }
            let batch = self.members.list_members(category, cursor.as_deref())?;
            titles.extend(batch.titles);
            match batch.next {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(titles)
    }

    fn migrate_members(
        &self,
        rename: &CategoryRename,
        row_report: &mut RowReport,
        report: &mut RunReport,
    ) {
        let category = &rename.names.old_full;
        let titles = match self.list_members(category) {
            Ok(titles) => titles,
            Err(err) if err.kind() == ExErrorKind::Cancelled => return,
            Err(err) => {
                self.progress.emit(&ProgressEvent::Failed {
                    title: category.clone(),
                    message: err.to_string(),
                });
                return;
            }
        };
        row_report.members = titles.len();
        self.progress.emit(&ProgressEvent::MembersListed {
            category: category.clone(),
            count: titles.len(),
        });

        for title in &titles {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Some(filter) = &self.title_filter {
                if !filter.is_match(title) {
                    debug!(page = %title, "Filtered out");
                    continue;
                }
            }
            if self.migrate_page(rename, title, report) {
                row_report.pages_changed += 1;
            }
        }
    }

    /// Run both phases over one member page; true when anything was saved
    fn migrate_page(&self, rename: &CategoryRename, title: &str, report: &mut RunReport) -> bool {
        report.pages_seen += 1;
        let mut text = match self.mutator.read(title) {
            Ok(text) => text,
            Err(err) => {
                self.progress.emit(&ProgressEvent::Failed {
                    title: title.to_string(),
                    message: err.to_string(),
                });
                return false;
            }
        };
        let names = &rename.names;
        let mut saved = false;

        if self.options.phase1 {
            match rewrite_category_links(
                &text,
                &rename.prefixes,
                &names.old_bare,
                &rename.policy_prefix,
                &names.new_bare,
            ) {
                Ok(rewrite) if rewrite.replaced > 0 && rewrite.text != text => {
                    let summary =
                        edit_summary(&names.old_full, &names.new_full, &[], rename.comment.as_deref());
                    if self.save_page(title, &rewrite.text, &summary, report) {
                        self.progress.emit(&ProgressEvent::PageChanged {
                            page: title.to_string(),
                            phase: Phase::Links,
                            changes: rewrite.replaced,
                            templates: Vec::new(),
                        });
                        text = rewrite.text;
                        saved = true;
                    }
                }
                Ok(_) => {}
                Err(err) => self.progress.emit(&ProgressEvent::Failed {
                    title: title.to_string(),
                    message: err.to_string(),
                }),
            }
        }

        if self.options.phase2 && !self.cancel.is_cancelled() {
            match self.rewrite_templates(rename, title, &text, report) {
                TemplatePass::Rewritten {
                    text: rewritten,
                    changes,
                    labels,
                } => {
                    let summary = edit_summary(
                        &names.old_full,
                        &names.new_full,
                        &labels,
                        rename.comment.as_deref(),
                    );
                    if self.save_page(title, &rewritten, &summary, report) {
                        self.progress.emit(&ProgressEvent::PageChanged {
                            page: title.to_string(),
                            phase: Phase::Templates,
                            changes,
                            templates: labels,
                        });
                        saved = true;
                    }
                }
                TemplatePass::Cancelled => {
                    debug!(page = %title, "Template rewrite discarded on cancel");
                }
                TemplatePass::Unchanged => {}
            }
        }

        if saved {
            report.pages_changed += 1;
        } else {
            self.progress.emit(&ProgressEvent::PageUnchanged {
                page: title.to_string(),
            });
        }
        saved
    }

    fn save_page(&self, title: &str, text: &str, summary: &str, report: &mut RunReport) -> bool {
        let start = Instant::now();
        match self.mutator.save(title, text, summary, self.options.minor_edits) {
            Ok(()) => {
                report.saves += 1;
                true
            }
            Err(err) => {
                report.failed_saves += 1;
                log_op_error!(
                    "save_page",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    page = %title
                );
                self.progress.emit(&ProgressEvent::Failed {
                    title: title.to_string(),
                    message: err.to_string(),
                });
                false
            }
        }
    }

    /// Phase 2 over `text`: stored rules, then one decision per invocation
    fn rewrite_templates(
        &self,
        rename: &CategoryRename,
        page: &str,
        text: &str,
        report: &mut RunReport,
    ) -> TemplatePass {
        let (cached_text, cached) = self.rules.apply_to_text(&self.project, text);
        let spans = flat_spans(&cached_text);

        let mut cancelled = false;
        let mut partial_templates: Vec<String> = Vec::new();
        let (rewritten, interactive) = rewrite_spans(&cached_text, &spans, |chunk| {
            if cancelled {
                return None;
            }
            match self.settle_invocation(rename, page, chunk, report) {
                Ok(Some(applied)) => {
                    if applied.partial {
                        if let Some(inv) = Invocation::parse(chunk) {
                            partial_templates.push(inv.name().to_string());
                        }
                    }
                    Some(applied.fragment)
                }
                Ok(None) => None,
                Err(_) => {
                    cancelled = true;
                    None
                }
            }
        });

        if cancelled {
            return TemplatePass::Cancelled;
        }
        if rewritten == text {
            return TemplatePass::Unchanged;
        }
        let labels = changed_templates(text, &rewritten)
            .into_iter()
            .map(|name| {
                let full = ensure_prefixed(
                    self.resolver.as_ref(),
                    &self.project,
                    &name,
                    NamespaceId::TEMPLATE,
                );
                if partial_templates.contains(&name) {
                    format!("[[{}]] [partial]", full)
                } else {
                    format!("[[{}]]", full)
                }
            })
            .collect();
        TemplatePass::Rewritten {
            text: rewritten,
            changes: cached + interactive,
            labels,
        }
    }

    /// Decide the replacement for one invocation
    ///
    /// Candidates are tried in parameter order; the first one applied
    /// settles the invocation. `Err` only on cancellation.
    fn settle_invocation(
        &self,
        rename: &CategoryRename,
        page: &str,
        chunk: &str,
        report: &mut RunReport,
    ) -> Result<Option<Applied>> {
        if !chunk.contains('|') {
            return Ok(None);
        }
        let Some(inv) = Invocation::parse(chunk) else {
            return Ok(None);
        };
        let template = inv.name().to_string();
        if self.rules.is_auto_skip(&self.project, &template) {
            self.progress.emit(&ProgressEvent::TemplateSkipped {
                page: page.to_string(),
                template,
                automatic: true,
                partial: false,
            });
            return Ok(None);
        }

        for candidate in find_candidates(&inv, &rename.names) {
            if self.cancel.is_cancelled() {
                return Err(ExError::from(WikicatError::Cancelled).with_page(page));
            }
            let partial = candidate.kind == MatchKind::Partial;

            if let Some(fragment) = self.from_stored_rule(&inv, &template, &candidate) {
                return Ok(Some(Applied { fragment, partial }));
            }

            let proposal = propose(&inv, &candidate);
            if proposal.duplicates.is_empty()
                && self.rules.is_auto_approve(&self.project, &template)
            {
                self.rules
                    .record_edit(&self.project, chunk, &proposal.fragment, AutoState::None, None);
                return Ok(Some(Applied {
                    fragment: proposal.fragment,
                    partial,
                }));
            }

            report.prompts += 1;
            let request = ConfirmationRequest {
                id: RequestId::new(),
                page: page.to_string(),
                template: template.clone(),
                fragment: chunk.to_string(),
                proposed: proposal.fragment.clone(),
                old_value: candidate.old_value.clone(),
                new_value: candidate.new_value.clone(),
                duplicates: proposal.duplicates.clone(),
                partial,
            };
            let response = match self.confirmations.request(request, &self.cancel) {
                Ok(response) => response,
                Err(err) => {
                    self.cancel.cancel();
                    return Err(err.with_page(page).with_template(template));
                }
            };

            match response.action {
                ReviewAction::Apply => {
                    let chosen = response
                        .edited_fragment
                        .as_deref()
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .unwrap_or(&proposal.fragment)
                        .to_string();
                    let auto = if response.auto_confirm_all {
                        self.rules.set_auto_approve(&self.project, &template, true);
                        AutoState::Approve
                    } else {
                        AutoState::None
                    };
                    self.rules
                        .record_edit(&self.project, chunk, &chosen, auto, response.dedupe);
                    let fragment = if proposal.duplicates.is_empty() {
                        chosen
                    } else {
                        apply_dedupe(&chosen, &candidate.new_value, response.dedupe)
                    };
                    return Ok(Some(Applied { fragment, partial }));
                }
                ReviewAction::Skip => {
                    self.progress.emit(&ProgressEvent::TemplateSkipped {
                        page: page.to_string(),
                        template: template.clone(),
                        automatic: false,
                        partial,
                    });
                    if response.auto_skip_all {
                        self.rules.set_auto_skip(&self.project, &template, true);
                        return Ok(None);
                    }
                }
                ReviewAction::Cancel => {
                    self.cancel.cancel();
                    return Err(ExError::from(WikicatError::Cancelled)
                        .with_page(page)
                        .with_template(template));
                }
            }
        }
        Ok(None)
    }

    /// Replacement from a stored rule, when one covers this candidate
    ///
    /// A stored value that would duplicate a positional value is only used
    /// when the rule also carries a dedupe policy.
    fn from_stored_rule(&self, inv: &Invocation, template: &str, candidate: &Candidate) -> Option<String> {
        let param = match candidate.named_key.as_deref() {
            Some(key) => ParamRef::Named(key),
            None => ParamRef::Positional,
        };
        let resolution =
            self.rules
                .resolve_value(&self.project, template, param, &candidate.old_value)?;
        let resolved = Candidate {
            new_value: resolution.to.clone(),
            ..candidate.clone()
        };
        let proposal = propose(inv, &resolved);
        if proposal.duplicates.is_empty() {
            return Some(proposal.fragment);
        }
        let policy = resolution.dedupe?;
        Some(apply_dedupe(&proposal.fragment, &resolved.new_value, Some(policy)))
    }
}

/// Drop duplicate positional copies of `value` from `fragment` per `policy`
fn apply_dedupe(fragment: &str, value: &str, policy: Option<DedupePolicy>) -> String {
    let Some(policy) = policy else {
        return fragment.to_string();
    };
    let Some(mut inv) = Invocation::parse(fragment) else {
        return fragment.to_string();
    };
    if dedupe_positional(&mut inv, unquote(value), policy) > 0 {
        inv.render()
    } else {
        fragment.to_string()
    }
}
