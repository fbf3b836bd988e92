//! Directory-backed page store
//!
//! Each page is one `<encoded title>.wiki` file under a root directory. It lets
//! the migration run against an exported dump and is what the CLI drives.
//! Category membership is approximated by scanning page text for the bare
//! category name, which also catches templates that take the name as a value.

use crate::atomic::atomic_write;
use crate::errors::{io_error, page_io, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use wikicat_core::errors::{ExError, WikicatError};
use wikicat_core::pages::{MemberBatch, MembershipLister, PageStore};

const EXTENSION: &str = "wiki";
const DEFAULT_BATCH: usize = 50;

/// Escape characters that cannot appear in file names; spaces become `_`
pub fn encode_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for ch in title.trim().chars() {
        match ch {
            ' ' => out.push('_'),
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`encode_title`]; `None` for malformed escapes
pub fn decode_title(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = name.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

pub struct DirPageStore {
    root: PathBuf,
    batch_size: usize,
}

impl DirPageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            batch_size: DEFAULT_BATCH,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_path(&self, title: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_title(title), EXTENSION))
    }

    /// All page titles, sorted
    pub fn titles(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list_pages", e)),
        };
        let mut titles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("list_pages", e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(title) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_title)
            {
                titles.push(title);
            }
        }
        titles.sort();
        Ok(titles)
    }
}

fn same_title(a: &str, b: &str) -> bool {
    a.trim().replace('_', " ") == b.trim().replace('_', " ")
}

impl PageStore for DirPageStore {
    fn exists(&self, title: &str) -> Result<bool> {
        Ok(self.page_path(title).is_file())
    }

    fn read(&self, title: &str) -> Result<String> {
        fs::read_to_string(self.page_path(title)).map_err(|e| page_io("read_page", title, e))
    }

    fn move_page(
        &self,
        title: &str,
        new_title: &str,
        reason: &str,
        leave_redirect: bool,
    ) -> Result<()> {
        let from = self.page_path(title);
        let to = self.page_path(new_title);
        if !from.is_file() {
            return Err(ExError::from(WikicatError::PageNotFound {
                title: title.to_string(),
            })
            .with_op("move_page"));
        }
        if to.exists() && !same_title(title, new_title) {
            return Err(ExError::from(WikicatError::PageExists {
                title: new_title.to_string(),
            })
            .with_op("move_page"));
        }

        fs::rename(&from, &to).map_err(|e| page_io("move_page", title, e))?;
        if leave_redirect {
            let redirect = format!("#REDIRECT [[{}]]\n", new_title.trim());
            atomic_write(&from, redirect.as_bytes()).map_err(|e| e.with_page(title))?;
        }
        debug!(from = %title, to = %new_title, reason, leave_redirect, "Moved page");
        Ok(())
    }

    fn save(&self, title: &str, text: &str, summary: &str, minor: bool) -> Result<()> {
        atomic_write(&self.page_path(title), text.as_bytes()).map_err(|e| e.with_page(title))?;
        debug!(page = %title, summary, minor, "Saved page");
        Ok(())
    }
}

impl MembershipLister for DirPageStore {
    fn list_members(&self, category: &str, cursor: Option<&str>) -> Result<MemberBatch> {
        let needle = category
            .split_once(':')
            .map_or(category, |(_, rest)| rest)
            .trim()
            .replace('_', " ");
        if needle.is_empty() {
            return Ok(MemberBatch::default());
        }
        let offset = match cursor {
            Some(c) => c.parse::<usize>().map_err(|_| {
                ExError::from(WikicatError::InvalidConfig {
                    reason: format!("bad member cursor '{}'", c),
                })
                .with_op("list_members")
            })?,
            None => 0,
        };

        let mut members = Vec::new();
        for title in self.titles()? {
            if same_title(&title, category) {
                continue;
            }
            let text = self.read(&title)?;
            if text.replace('_', " ").contains(&needle) {
                members.push(title);
            }
        }

        let end = (offset + self.batch_size).min(members.len());
        let titles = members.get(offset..end).map(<[String]>::to_vec).unwrap_or_default();
        let next = (end < members.len()).then(|| end.to_string());
        Ok(MemberBatch { titles, next })
    }
}
