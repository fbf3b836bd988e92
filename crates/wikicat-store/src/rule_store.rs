//! File-backed rule store
//!
//! Wraps a [`RuleBook`] behind a mutex and mirrors it to a JSON file:
//! - every mutation is written back immediately (best-effort: a failed write
//!   is logged and the in-memory book stays authoritative)
//! - lookups that drive unattended edits first check the file's modification
//!   time and reload wholesale when another process has written it
//! - legacy files are upgraded on first load and rewritten once

use crate::atomic::atomic_write;
use crate::errors::{io_error, serialization_error, Result};
use crate::rules_file::{upgrade, RulesDocument};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};
use wikicat_core::namespace::{NamespacePrefixResolver, ProjectRef};
use wikicat_core::rules::{AutoState, DedupePolicy, ParamRef, Resolution, RuleBook};

struct Inner {
    book: RuleBook,
    /// Modification time of the file as last loaded or written
    seen_mtime: Option<SystemTime>,
}

pub struct RuleStore {
    path: Option<PathBuf>,
    resolver: Arc<dyn NamespacePrefixResolver>,
    inner: Mutex<Inner>,
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn read_document(path: &Path) -> Result<(RulesDocument, bool)> {
    let raw = fs::read_to_string(path).map_err(|e| io_error("read_rules", e))?;
    if raw.trim().is_empty() {
        return Ok((RulesDocument::default(), false));
    }
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| serialization_error("parse_rules", e))?;
    let upgraded = upgrade(value)?;
    Ok((upgraded.document, upgraded.legacy))
}

impl RuleStore {
    /// Open the store at `path`; a missing file means an empty book
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>, resolver: Arc<dyn NamespacePrefixResolver>) -> Result<Self> {
        let path = path.into();
        let store = Self {
            path: Some(path.clone()),
            resolver: resolver.clone(),
            inner: Mutex::new(Inner {
                book: RuleBook::new(resolver.clone()),
                seen_mtime: None,
            }),
        };
        if !path.exists() {
            debug!(path = %path.display(), "No rule file yet, starting empty");
            return Ok(store);
        }

        let (document, legacy) = read_document(&path)?;
        debug!(
            path = %path.display(),
            buckets = document.bucket_count(),
            legacy,
            "Loaded rule file"
        );
        {
            let mut inner = store.inner.lock();
            inner.book = document.into_book(resolver);
            inner.seen_mtime = file_mtime(&path);
            if legacy {
                store.persist(&mut inner);
            }
        }
        Ok(store)
    }

    /// Store without a backing file
    pub fn in_memory(resolver: Arc<dyn NamespacePrefixResolver>) -> Self {
        Self {
            path: None,
            resolver: resolver.clone(),
            inner: Mutex::new(Inner {
                book: RuleBook::new(resolver),
                seen_mtime: None,
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn reload_if_stale(&self, inner: &mut Inner) {
        let Some(path) = &self.path else {
            return;
        };
        let current = file_mtime(path);
        let stale = match (current, inner.seen_mtime) {
            (Some(now), Some(seen)) => now > seen,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !stale {
            return;
        }
        inner.seen_mtime = current;
        match read_document(path) {
            Ok((document, _)) => {
                debug!(path = %path.display(), "Rule file changed on disk, reloading");
                inner.book = document.into_book(self.resolver.clone());
            }
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Rule file changed but could not be reloaded, keeping rules in memory"
            ),
        }
    }

    fn persist(&self, inner: &mut Inner) {
        let Some(path) = &self.path else {
            return;
        };
        let written = RulesDocument::from_book(&inner.book)
            .to_json_pretty()
            .and_then(|json| atomic_write(path, json.as_bytes()));
        match written {
            Ok(()) => inner.seen_mtime = file_mtime(path),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save rule file"),
        }
    }

    fn mutate<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut RuleBook) -> bool,
    {
        let mut inner = self.inner.lock();
        self.reload_if_stale(&mut inner);
        let changed = change(&mut inner.book);
        if changed {
            self.persist(&mut inner);
        }
        changed
    }

    /// Re-read the backing file if it changed since the last load or write
    pub fn refresh(&self) {
        let mut inner = self.inner.lock();
        self.reload_if_stale(&mut inner);
    }

    /// Learn rules from a confirmed edit and persist them
    pub fn record_edit(
        &self,
        project: &ProjectRef,
        before: &str,
        after: &str,
        auto: AutoState,
        dedupe: Option<DedupePolicy>,
    ) -> bool {
        self.mutate(|book| book.record_edit(project, before, after, auto, dedupe))
    }

    /// Apply stored rules to every template call in `text`
    pub fn apply_to_text(&self, project: &ProjectRef, text: &str) -> (String, usize) {
        let mut inner = self.inner.lock();
        self.reload_if_stale(&mut inner);
        inner.book.apply_to_text(project, text)
    }

    pub fn set_auto_approve(&self, project: &ProjectRef, template: &str, on: bool) -> bool {
        self.mutate(|book| book.set_auto_approve(project, template, on))
    }

    pub fn set_auto_skip(&self, project: &ProjectRef, template: &str, on: bool) -> bool {
        self.mutate(|book| book.set_auto_skip(project, template, on))
    }

    pub fn is_auto_skip(&self, project: &ProjectRef, template: &str) -> bool {
        let mut inner = self.inner.lock();
        self.reload_if_stale(&mut inner);
        inner.book.is_auto_skip(project, template)
    }

    pub fn is_auto_approve(&self, project: &ProjectRef, template: &str) -> bool {
        let mut inner = self.inner.lock();
        self.reload_if_stale(&mut inner);
        inner.book.is_auto_approve(project, template)
    }

    pub fn resolve_value(
        &self,
        project: &ProjectRef,
        template: &str,
        param: ParamRef<'_>,
        value: &str,
    ) -> Option<Resolution> {
        let mut inner = self.inner.lock();
        self.reload_if_stale(&mut inner);
        inner.book.resolve_value(project, template, param, value)
    }

    /// Drop every bucket and persist the empty book
    pub fn clear(&self) {
        self.mutate(|book| {
            book.clear();
            true
        });
    }

    /// Current contents in file layout
    pub fn snapshot(&self) -> RulesDocument {
        let mut inner = self.inner.lock();
        self.reload_if_stale(&mut inner);
        RulesDocument::from_book(&inner.book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wikicat_core::StaticNamespaceResolver;

    fn resolver() -> Arc<dyn NamespacePrefixResolver> {
        Arc::new(StaticNamespaceResolver::new())
    }

    fn enwiki() -> ProjectRef {
        ProjectRef::new("wikipedia", "en")
    }

    #[test]
    fn test_in_memory_store_learns_and_applies() {
        let store = RuleStore::in_memory(resolver());
        assert!(store.record_edit(
            &enwiki(),
            "{{Cats|Old Topic}}",
            "{{Cats|New Topic}}",
            AutoState::None,
            None,
        ));
        let (text, n) = store.apply_to_text(&enwiki(), "x {{Cats|Old Topic}} y");
        assert_eq!(text, "x {{Cats|New Topic}} y");
        assert_eq!(n, 1);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_missing_parent_dir_is_created_on_first_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".wikicat").join("template_rules.json");
        let store = RuleStore::open(&path, resolver()).unwrap();
        assert!(!path.exists());

        store.set_auto_skip(&enwiki(), "Navbox", true);
        assert!(path.exists());
    }

    #[test]
    fn test_clear_empties_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        let store = RuleStore::open(&path, resolver()).unwrap();
        store.set_auto_approve(&enwiki(), "Infobox", true);
        store.clear();

        assert_eq!(store.snapshot().bucket_count(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }
}
