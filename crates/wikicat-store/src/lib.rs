//! wikicat store: file-backed persistence
//!
//! Provides:
//! - Atomic file writes (temp file + rename)
//! - The JSON rule-store file with staleness reload and a one-time legacy upgrade
//! - A directory-backed page store for offline migrations

pub mod atomic;
pub mod dir_pages;
pub mod errors;
pub mod rule_store;
pub mod rules_file;

pub use dir_pages::DirPageStore;
pub use errors::Result;
pub use rule_store::RuleStore;
