#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wikicat_core::errors::{ExError, ExErrorKind, Result, WikicatError};
use wikicat_core::pages::{MemberBatch, MembershipLister, PageStore};
use wikicat_core::review::{ConfirmationRequest, ConfirmationResponse, ReviewSurface};
use wikicat_core::{NamespacePrefixResolver, StaticNamespaceResolver};
use wikicat_engine::{
    confirmation_pair, parse_rows, spawn_migration, Collaborators, MigrationOptions,
    MigrationOrchestrator, ProgressEvent, ProgressSink, RunReport, ThrottleSettings,
};
use wikicat_store::RuleStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub title: String,
    pub text: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub redirect: bool,
}

/// In-memory wiki with explicit category membership
#[derive(Default)]
pub struct MemoryWiki {
    pages: Mutex<BTreeMap<String, String>>,
    members: Mutex<HashMap<String, Vec<String>>>,
    saves: Mutex<Vec<SaveRecord>>,
    moves: Mutex<Vec<MoveRecord>>,
    rate_limited_saves: AtomicU32,
    batch_size: usize,
}

impl MemoryWiki {
    pub fn new() -> Self {
        Self {
            batch_size: 2,
            ..Self::default()
        }
    }

    pub fn with_page(self, title: &str, text: &str) -> Self {
        self.pages.lock().insert(title.to_string(), text.to_string());
        self
    }

    /// Add a member page to `category` (full title)
    pub fn with_member(self, category: &str, title: &str, text: &str) -> Self {
        self.members
            .lock()
            .entry(category.to_string())
            .or_default()
            .push(title.to_string());
        self.with_page(title, text)
    }

    /// Fail the next `n` saves with a rate-limit message
    pub fn rate_limit_next_saves(&self, n: u32) {
        self.rate_limited_saves.store(n, Ordering::SeqCst);
    }

    pub fn text(&self, title: &str) -> Option<String> {
        self.pages.lock().get(title).cloned()
    }

    pub fn saves(&self) -> Vec<SaveRecord> {
        self.saves.lock().clone()
    }

    pub fn moves(&self) -> Vec<MoveRecord> {
        self.moves.lock().clone()
    }
}

impl PageStore for MemoryWiki {
    fn exists(&self, title: &str) -> Result<bool> {
        Ok(self.pages.lock().contains_key(title))
    }

    fn read(&self, title: &str) -> Result<String> {
        self.pages.lock().get(title).cloned().ok_or_else(|| {
            WikicatError::PageNotFound {
                title: title.to_string(),
            }
            .into()
        })
    }

    fn move_page(&self, title: &str, new_title: &str, reason: &str, leave_redirect: bool) -> Result<()> {
        let mut pages = self.pages.lock();
        if pages.contains_key(new_title) {
            return Err(WikicatError::PageExists {
                title: new_title.to_string(),
            }
            .into());
        }
        let text = pages.remove(title).ok_or_else(|| {
            ExError::from(WikicatError::PageNotFound {
                title: title.to_string(),
            })
        })?;
        pages.insert(new_title.to_string(), text);
        if leave_redirect {
            pages.insert(title.to_string(), format!("#REDIRECT [[{}]]", new_title));
        }
        self.moves.lock().push(MoveRecord {
            from: title.to_string(),
            to: new_title.to_string(),
            reason: reason.to_string(),
            redirect: leave_redirect,
        });
        Ok(())
    }

    fn save(&self, title: &str, text: &str, summary: &str, _minor: bool) -> Result<()> {
        let left = self.rate_limited_saves.load(Ordering::SeqCst);
        if left > 0 {
            self.rate_limited_saves.store(left - 1, Ordering::SeqCst);
            return Err(ExError::new(ExErrorKind::ExternalService)
                .with_page(title)
                .with_message("HTTP 429 Too Many Requests"));
        }
        self.pages.lock().insert(title.to_string(), text.to_string());
        self.saves.lock().push(SaveRecord {
            title: title.to_string(),
            text: text.to_string(),
            summary: summary.to_string(),
        });
        Ok(())
    }
}

impl MembershipLister for MemoryWiki {
    fn list_members(&self, category: &str, cursor: Option<&str>) -> Result<MemberBatch> {
        let all = self.members.lock().get(category).cloned().unwrap_or_default();
        let offset: usize = cursor.map_or(0, |c| c.parse().unwrap_or(0));
        let end = (offset + self.batch_size).min(all.len());
        Ok(MemberBatch {
            titles: all[offset.min(end)..end].to_vec(),
            next: (end < all.len()).then(|| end.to_string()),
        })
    }
}

type Script = Box<dyn FnMut(&ConfirmationRequest) -> ConfirmationResponse + Send>;

/// Review surface answering from a closure and keeping every request
pub struct ScriptedSurface {
    script: Script,
    seen: Arc<Mutex<Vec<ConfirmationRequest>>>,
}

impl ReviewSurface for ScriptedSurface {
    fn review(&mut self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        self.seen.lock().push(request.clone());
        Ok((self.script)(request))
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}

pub fn resolver() -> Arc<dyn NamespacePrefixResolver> {
    Arc::new(StaticNamespaceResolver::new())
}

/// Rule store backed by a file in a fresh temp dir
pub fn file_rules() -> (TempDir, Arc<RuleStore>) {
    let dir = TempDir::new().unwrap();
    let store = RuleStore::open(dir.path().join("template_rules.json"), resolver()).unwrap();
    (dir, Arc::new(store))
}

pub struct Outcome {
    pub report: RunReport,
    pub requests: Vec<ConfirmationRequest>,
    pub events: Vec<ProgressEvent>,
}

/// Run `rows_tsv` to completion, answering prompts with `script`
pub fn run_migration<F>(
    wiki: &Arc<MemoryWiki>,
    rules: &Arc<RuleStore>,
    options: MigrationOptions,
    rows_tsv: &str,
    script: F,
) -> Outcome
where
    F: FnMut(&ConfirmationRequest) -> ConfirmationResponse + Send + 'static,
{
    let (channel, endpoint) = confirmation_pair(Duration::from_millis(5));
    let progress = Arc::new(RecordingProgress::default());
    let orchestrator = MigrationOrchestrator::new(
        Collaborators {
            pages: wiki.clone(),
            members: wiki.clone(),
            resolver: resolver(),
            rules: rules.clone(),
            confirmations: channel,
        },
        options,
        ThrottleSettings::unthrottled(),
        progress.clone(),
    )
    .unwrap();

    let handle = spawn_migration(orchestrator, parse_rows(rows_tsv)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut surface = ScriptedSurface {
        script: Box::new(script),
        seen: seen.clone(),
    };
    endpoint.serve(&mut surface);
    let report = handle.wait().unwrap();

    let requests = seen.lock().clone();
    Outcome {
        report,
        requests,
        events: progress.events(),
    }
}

pub fn never_asked(request: &ConfirmationRequest) -> ConfirmationResponse {
    panic!("unexpected confirmation request for {}", request.fragment)
}
