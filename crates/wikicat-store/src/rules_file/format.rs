//! Current rule-file layout and its mapping onto [`RuleBook`]

use crate::errors::{serialization_error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;
use wikicat_core::namespace::{NamespacePrefixResolver, ProjectRef};
use wikicat_core::rules::{RuleBook, RuleBucket};

/// Buckets of one project, keyed by template display name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRules {
    #[serde(default)]
    pub templates: BTreeMap<String, RuleBucket>,
}

/// Whole rule file, keyed by `"{lang}:{family}"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulesDocument(pub BTreeMap<String, ProjectRules>);

impl RulesDocument {
    pub fn from_book(book: &RuleBook) -> Self {
        let mut projects: BTreeMap<String, ProjectRules> = BTreeMap::new();
        for (key, bucket) in book.buckets() {
            let name = if bucket.display_name.is_empty() {
                key.template.clone()
            } else {
                bucket.display_name.clone()
            };
            projects
                .entry(key.project.clone())
                .or_default()
                .templates
                .insert(name, bucket.clone());
        }
        Self(projects)
    }

    /// Build a book; entries under unparseable project keys are dropped
    pub fn into_book(self, resolver: Arc<dyn NamespacePrefixResolver>) -> RuleBook {
        let mut book = RuleBook::new(resolver);
        for (project_key, project_rules) in self.0 {
            let Some(project) = ProjectRef::from_key(&project_key) else {
                warn!(project = %project_key, "Ignoring rules under malformed project key");
                continue;
            };
            for (name, mut bucket) in project_rules.templates {
                bucket.display_name = name;
                book.insert_bucket(&project, bucket);
            }
        }
        book
    }

    pub fn bucket_count(&self) -> usize {
        self.0.values().map(|p| p.templates.len()).sum()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| serialization_error("encode_rules", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikicat_core::rules::{AutoState, Rule};
    use wikicat_core::StaticNamespaceResolver;

    fn resolver() -> Arc<dyn NamespacePrefixResolver> {
        Arc::new(StaticNamespaceResolver::new())
    }

    #[test]
    fn test_book_to_document_uses_display_names() {
        let project = ProjectRef::new("wikipedia", "en");
        let mut book = RuleBook::new(resolver());
        book.upsert(
            &project,
            "Template:Infobox settlement",
            Rule::named("location", "Old", "New").with_auto(AutoState::Approve),
        );

        let doc = RulesDocument::from_book(&book);
        let templates = &doc.0["en:wikipedia"].templates;
        assert!(templates.contains_key("Infobox settlement"));
        assert_eq!(doc.bucket_count(), 1);

        let json = doc.to_json_pretty().unwrap();
        assert!(json.contains("\"type\": \"named\""));
        assert!(json.contains("\"auto\": \"approve\""));
    }

    #[test]
    fn test_document_to_book_merges_case_variants() {
        let raw = r#"{
            "en:wikipedia": {"templates": {
                "Infobox": {"auto": "approve", "rules": []},
                "infobox": {"rules": [{"type": "unnamed_single", "from": "A", "to": "B"}]}
            }},
            "broken": {"templates": {"X": {}}}
        }"#;
        let doc: RulesDocument = serde_json::from_str(raw).unwrap();
        let book = doc.into_book(resolver());

        assert_eq!(book.len(), 1);
        let project = ProjectRef::new("wikipedia", "en");
        assert!(book.is_auto_approve(&project, "INFOBOX"));
        assert_eq!(book.bucket(&project, "Infobox").unwrap().rules.len(), 1);
    }
}
