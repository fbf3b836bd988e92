use std::sync::Arc;
use wikicat_core::{ProjectRef, RuleBook, StaticNamespaceResolver};

/// English Wikipedia project used across tests
#[allow(dead_code)]
pub fn enwiki() -> ProjectRef {
    ProjectRef::new("wikipedia", "en")
}

/// Empty rule book with the fixed English namespace table
#[allow(dead_code)]
pub fn empty_book() -> RuleBook {
    RuleBook::new(Arc::new(StaticNamespaceResolver::new()))
}
