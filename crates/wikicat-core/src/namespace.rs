//! Namespace prefix resolution
//!
//! The migration only needs two facts about namespaces: the canonical local
//! prefix to write (`Category:` on English projects, `Категория:` on Russian
//! ones) and whether a title already carries a recognised prefix. Both come
//! from a [`NamespacePrefixResolver`]; [`StaticNamespaceResolver`] serves a
//! fixed English table plus optional per-project local tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wiki project coordinates, e.g. `ru` + `wikipedia`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRef {
    pub family: String,
    pub lang: String,
}

impl ProjectRef {
    pub fn new(family: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            lang: lang.into(),
        }
    }

    /// Persistence key, `"{lang}:{family}"`
    pub fn key(&self) -> String {
        format!("{}:{}", self.lang, self.family)
    }

    /// Inverse of [`ProjectRef::key`]
    pub fn from_key(key: &str) -> Option<Self> {
        let (lang, family) = key.split_once(':')?;
        if lang.trim().is_empty() || family.trim().is_empty() {
            return None;
        }
        Some(Self::new(family.trim(), lang.trim()))
    }
}

impl std::fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.lang, self.family)
    }
}

/// MediaWiki namespace number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(pub i32);

impl NamespaceId {
    pub const MAIN: NamespaceId = NamespaceId(0);
    pub const TEMPLATE: NamespaceId = NamespaceId(10);
    pub const CATEGORY: NamespaceId = NamespaceId(14);
}

/// Lookup service for namespace prefixes
pub trait NamespacePrefixResolver: Send + Sync {
    /// Canonical prefix to write for `ns`, including the trailing colon.
    /// Empty for the main namespace.
    fn policy_prefix(&self, project: &ProjectRef, ns: NamespaceId) -> String;

    /// Every prefix recognised for `ns` (local names, aliases and the
    /// English fallback), each with a trailing colon.
    fn known_prefixes(&self, project: &ProjectRef, ns: NamespaceId) -> Vec<String>;

    /// Whether `title` already starts with a recognised prefix of any of `namespaces`
    fn has_prefix(&self, project: &ProjectRef, title: &str, namespaces: &[NamespaceId]) -> bool {
        namespaces
            .iter()
            .any(|ns| matching_prefix(&self.known_prefixes(project, *ns), title).is_some())
    }
}

fn matching_prefix<'a>(prefixes: &'a [String], title: &str) -> Option<&'a str> {
    let lowered = title.trim_start().to_lowercase();
    prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find(|p| lowered.starts_with(&p.to_lowercase()))
        .map(String::as_str)
}

/// Title without its `ns` prefix, if it has one
pub fn strip_namespace(
    resolver: &dyn NamespacePrefixResolver,
    project: &ProjectRef,
    title: &str,
    ns: NamespaceId,
) -> String {
    let trimmed = title.trim();
    let prefixes = resolver.known_prefixes(project, ns);
    match matching_prefix(&prefixes, trimmed) {
        Some(prefix) => {
            let cut = prefix.chars().count();
            trimmed.chars().skip(cut).collect::<String>().trim().to_string()
        }
        None => trimmed.to_string(),
    }
}

/// Title guaranteed to carry a prefix of `ns` (the policy prefix when added)
pub fn ensure_prefixed(
    resolver: &dyn NamespacePrefixResolver,
    project: &ProjectRef,
    title: &str,
    ns: NamespaceId,
) -> String {
    let trimmed = title.trim();
    if ns == NamespaceId::MAIN || resolver.has_prefix(project, trimmed, &[ns]) {
        return trimmed.to_string();
    }
    format!("{}{}", resolver.policy_prefix(project, ns), trimmed)
}

/// Local prefix table for one namespace of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNamespace {
    pub id: NamespaceId,
    pub primary: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

fn with_colon(prefix: &str) -> String {
    let p = prefix.trim();
    if p.is_empty() || p.ends_with(':') {
        p.to_string()
    } else {
        format!("{}:", p)
    }
}

fn english_defaults(ns: NamespaceId) -> &'static [&'static str] {
    match ns.0 {
        1 => &["Talk:"],
        2 => &["User:"],
        3 => &["User talk:"],
        4 => &["Project:", "WP:"],
        6 => &["File:", "Image:"],
        8 => &["MediaWiki:"],
        10 => &["Template:", "T:"],
        12 => &["Help:"],
        14 => &["Category:", "CAT:"],
        100 => &["Portal:"],
        828 => &["Module:"],
        _ => &[],
    }
}

/// Resolver backed by a fixed English table and optional local overrides
#[derive(Debug, Clone, Default)]
pub struct StaticNamespaceResolver {
    local: HashMap<(String, NamespaceId), LocalNamespace>,
}

impl StaticNamespaceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the local names of one namespace for `project`
    pub fn with_local(mut self, project: &ProjectRef, entry: LocalNamespace) -> Self {
        self.local.insert((project.key(), entry.id), entry);
        self
    }
}

impl NamespacePrefixResolver for StaticNamespaceResolver {
    fn policy_prefix(&self, project: &ProjectRef, ns: NamespaceId) -> String {
        if ns == NamespaceId::MAIN {
            return String::new();
        }
        if let Some(local) = self.local.get(&(project.key(), ns)) {
            return with_colon(&local.primary);
        }
        english_defaults(ns)
            .first()
            .map(|p| p.to_string())
            .unwrap_or_default()
    }

    fn known_prefixes(&self, project: &ProjectRef, ns: NamespaceId) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        if let Some(local) = self.local.get(&(project.key(), ns)) {
            out.push(with_colon(&local.primary));
            out.extend(local.aliases.iter().map(|a| with_colon(a)));
        }
        out.extend(english_defaults(ns).iter().map(|p| p.to_string()));
        out.retain(|p| !p.is_empty());
        let mut seen = std::collections::HashSet::new();
        out.retain(|p| seen.insert(p.to_lowercase()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ru() -> ProjectRef {
        ProjectRef::new("wikipedia", "ru")
    }

    fn resolver() -> StaticNamespaceResolver {
        StaticNamespaceResolver::new().with_local(
            &ru(),
            LocalNamespace {
                id: NamespaceId::CATEGORY,
                primary: "Категория".to_string(),
                aliases: vec!["К:".to_string()],
            },
        )
    }

    #[test]
    fn test_project_key_round_trip() {
        let p = ru();
        assert_eq!(p.key(), "ru:wikipedia");
        assert_eq!(ProjectRef::from_key("ru:wikipedia"), Some(p));
        assert_eq!(ProjectRef::from_key("nonsense"), None);
    }

    #[test]
    fn test_policy_prefix_prefers_local() {
        let r = resolver();
        assert_eq!(r.policy_prefix(&ru(), NamespaceId::CATEGORY), "Категория:");
        let en = ProjectRef::new("wikipedia", "en");
        assert_eq!(r.policy_prefix(&en, NamespaceId::CATEGORY), "Category:");
        assert_eq!(r.policy_prefix(&en, NamespaceId::MAIN), "");
    }

    #[test]
    fn test_has_prefix_accepts_local_alias_and_english_fallback() {
        let r = resolver();
        assert!(r.has_prefix(&ru(), "К:Физика", &[NamespaceId::CATEGORY]));
        assert!(r.has_prefix(&ru(), "category:Physics", &[NamespaceId::CATEGORY]));
        assert!(!r.has_prefix(&ru(), "Физика", &[NamespaceId::CATEGORY]));
    }

    #[test]
    fn test_strip_and_ensure() {
        let r = resolver();
        assert_eq!(
            strip_namespace(&r, &ru(), "Категория: Физика", NamespaceId::CATEGORY),
            "Физика"
        );
        assert_eq!(
            ensure_prefixed(&r, &ru(), "Физика", NamespaceId::CATEGORY),
            "Категория:Физика"
        );
        assert_eq!(
            ensure_prefixed(&r, &ru(), "К:Физика", NamespaceId::CATEGORY),
            "К:Физика"
        );
    }
}
