//! One-time upgrade of older rule files
//!
//! Accepted shapes, oldest first:
//! - a `rename_worker` container keyed by `"{family}::{lang}::{template}"`
//! - project entries holding template buckets directly, without `templates`
//! - buckets with `approve`/`skip` booleans instead of `auto`
//! - buckets with bucket-level `named`, `unnamed_single` and
//!   `unnamed_sequence` maps instead of `rules`
//! - rules without `auto`, sequences as `[idx, from, to]` triples, dedupe as
//!   `keep_first`/`keep_second`
//!
//! Everything is normalised on a [`Value`] tree first and only then decoded,
//! so one bad bucket is dropped instead of failing the whole file.

use super::format::{ProjectRules, RulesDocument};
use crate::errors::{rules_file_invalid, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::warn;
use wikicat_core::rules::{DedupePolicy, RuleBucket};

const LEGACY_CONTAINER: &str = "rename_worker";

/// Decoded document plus whether anything had to be rewritten
#[derive(Debug, Clone)]
pub struct Upgraded {
    pub document: RulesDocument,
    pub legacy: bool,
}

pub fn upgrade(value: Value) -> Result<Upgraded> {
    let Value::Object(mut top) = value else {
        return Err(rules_file_invalid("rule file must hold a JSON object"));
    };
    let mut legacy = false;
    let mut raw: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    if let Some(container) = top.remove(LEGACY_CONTAINER) {
        legacy = true;
        if let Value::Object(entries) = container {
            for (scoped, bucket) in entries {
                let mut parts = scoped.splitn(3, "::");
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(family), Some(lang), Some(name))
                        if !family.is_empty() && !lang.is_empty() && !name.is_empty() =>
                    {
                        raw.entry(format!("{}:{}", lang, family))
                            .or_default()
                            .insert(name.to_string(), bucket);
                    }
                    _ => warn!(key = %scoped, "Dropping legacy bucket with malformed key"),
                }
            }
        }
    }

    for (project_key, entry) in top {
        let Value::Object(mut entry) = entry else {
            warn!(project = %project_key, "Dropping non-object project entry");
            legacy = true;
            continue;
        };
        let templates = match entry.remove("templates") {
            Some(Value::Object(templates)) => templates,
            _ => {
                legacy = true;
                entry
            }
        };
        let slot = raw.entry(project_key).or_default();
        for (name, bucket) in templates {
            slot.insert(name, bucket);
        }
    }

    let mut document = RulesDocument::default();
    for (project_key, templates) in raw {
        let mut project = ProjectRules::default();
        for (name, bucket) in templates {
            let Value::Object(mut bucket) = bucket else {
                warn!(template = %name, "Dropping non-object bucket");
                legacy = true;
                continue;
            };
            legacy |= normalize_bucket(&mut bucket);
            match serde_json::from_value::<RuleBucket>(Value::Object(bucket)) {
                Ok(decoded) => {
                    project.templates.insert(name, decoded);
                }
                Err(e) => {
                    warn!(template = %name, error = %e, "Dropping undecodable bucket");
                    legacy = true;
                }
            }
        }
        document.0.insert(project_key, project);
    }

    Ok(Upgraded { document, legacy })
}

fn auto_token(value: Option<&Value>) -> Option<&'static str> {
    match value?.as_str()?.trim().to_lowercase().as_str() {
        "approve" => Some("approve"),
        "skip" => Some("skip"),
        "none" => Some("none"),
        _ => None,
    }
}

fn flag(bucket: &Map<String, Value>, key: &str) -> bool {
    bucket.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Rewrite one bucket in place; returns whether anything changed
fn normalize_bucket(bucket: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    let auto = match auto_token(bucket.get("auto")) {
        Some(token) => {
            changed |= bucket.get("auto").and_then(Value::as_str) != Some(token);
            token
        }
        None => {
            changed = true;
            if flag(bucket, "approve") {
                "approve"
            } else if flag(bucket, "skip") {
                "skip"
            } else {
                "none"
            }
        }
    };
    for stale in ["approve", "skip"] {
        changed |= bucket.remove(stale).is_some();
    }
    bucket.insert("auto".to_string(), json!(auto));

    let mut rules = match bucket.remove("rules") {
        Some(Value::Array(rules)) => rules,
        Some(_) | None => {
            changed = true;
            Vec::new()
        }
    };

    if let Some(named) = bucket.remove("named") {
        changed = true;
        rules.extend(legacy_named(named));
    }
    if let Some(single) = bucket.remove("unnamed_single") {
        changed = true;
        if let Value::Object(map) = single {
            for (from, to) in map {
                if let Some(to) = to.as_str() {
                    rules.push(json!({"type": "unnamed_single", "from": from, "to": to}));
                }
            }
        }
    }
    if let Some(sequences) = bucket.remove("unnamed_sequence") {
        changed = true;
        if let Value::Array(sequences) = sequences {
            for seq in sequences {
                rules.push(json!({"type": "unnamed_sequence", "sequence": seq}));
            }
        }
    }

    let mut kept = Vec::with_capacity(rules.len());
    for rule in rules {
        match rule {
            Value::Object(mut rule) => {
                changed |= normalize_rule(&mut rule);
                kept.push(Value::Object(rule));
            }
            _ => changed = true,
        }
    }
    bucket.insert("rules".to_string(), Value::Array(kept));
    changed
}

/// Bucket-level `named` map: `{param: [from, to]}` or `{param: {from: to}}`
fn legacy_named(named: Value) -> Vec<Value> {
    let Value::Object(map) = named else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (param, pair) in map {
        match pair {
            Value::Array(pair) => {
                if let [Value::String(from), Value::String(to)] = pair.as_slice() {
                    out.push(json!({"type": "named", "param": param, "from": from, "to": to}));
                }
            }
            Value::Object(pairs) => {
                for (from, to) in pairs {
                    if let Some(to) = to.as_str() {
                        out.push(json!({"type": "named", "param": param, "from": from, "to": to}));
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn normalize_rule(rule: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    match auto_token(rule.get("auto")) {
        Some(token) if rule.get("auto").and_then(Value::as_str) == Some(token) => {}
        Some(token) => {
            rule.insert("auto".to_string(), json!(token));
            changed = true;
        }
        None => {
            rule.insert("auto".to_string(), json!("none"));
            changed = true;
        }
    }

    if !rule.contains_key("type") {
        let inferred = if rule.contains_key("sequence") {
            "unnamed_sequence"
        } else if rule.contains_key("param") {
            "named"
        } else {
            "unnamed_single"
        };
        rule.insert("type".to_string(), json!(inferred));
        changed = true;
    }

    if let Some(dedupe) = rule.remove("dedupe") {
        let parsed = dedupe.as_str().and_then(DedupePolicy::parse);
        match parsed.and_then(|p| serde_json::to_value(p).ok()) {
            Some(canonical) => {
                changed |= canonical != dedupe;
                rule.insert("dedupe".to_string(), canonical);
            }
            None => changed |= !dedupe.is_null(),
        }
    }

    if let Some(Value::Array(steps)) = rule.get_mut("sequence") {
        for step in steps.iter_mut() {
            let replacement = match step.as_array().map(Vec::as_slice) {
                Some([idx, from, to]) => json!({"idx": idx, "from": from, "to": to}),
                _ => continue,
            };
            *step = replacement;
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikicat_core::rules::{AutoState, RuleKind};

    fn bucket<'a>(up: &'a Upgraded, project: &str, name: &str) -> &'a RuleBucket {
        &up.document.0[project].templates[name]
    }

    #[test]
    fn test_current_file_is_not_legacy() {
        let value = json!({
            "en:wikipedia": {"templates": {"Infobox": {
                "auto": "none",
                "rules": [{"type": "named", "param": "location", "from": "A", "to": "B", "auto": "approve"}]
            }}}
        });
        let up = upgrade(value).unwrap();
        assert!(!up.legacy);
        assert_eq!(bucket(&up, "en:wikipedia", "Infobox").rules.len(), 1);
    }

    #[test]
    fn test_rename_worker_container() {
        let value = json!({
            "rename_worker": {
                "wikipedia::ru::Население": {"approve": true, "rules": []},
                "broken-key": {}
            }
        });
        let up = upgrade(value).unwrap();
        assert!(up.legacy);
        assert_eq!(bucket(&up, "ru:wikipedia", "Население").auto, AutoState::Approve);
        assert_eq!(up.document.bucket_count(), 1);
    }

    #[test]
    fn test_missing_templates_wrapper_and_skip_flag() {
        let value = json!({"en:wikipedia": {"Navbox": {"skip": true}}});
        let up = upgrade(value).unwrap();
        assert!(up.legacy);
        assert_eq!(bucket(&up, "en:wikipedia", "Navbox").auto, AutoState::Skip);
    }

    #[test]
    fn test_bucket_level_mappings_become_rules() {
        let value = json!({"en:wikipedia": {"templates": {"Cats": {
            "auto": "none",
            "named": {"location": ["Old", "New"]},
            "unnamed_single": {"Old Topic": "New Topic"},
            "unnamed_sequence": [[[1, "A", "B"], [2, "C", "D"]]]
        }}}});
        let up = upgrade(value).unwrap();
        assert!(up.legacy);
        let rules = &bucket(&up, "en:wikipedia", "Cats").rules;
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|r| r.auto == AutoState::None));
        match &rules[2].kind {
            RuleKind::PositionalSequence { sequence } => {
                assert_eq!(sequence.len(), 2);
                assert_eq!(sequence[1].index, 2);
                assert_eq!(sequence[1].to, "D");
            }
            other => panic!("unexpected rule kind: {:?}", other),
        }
    }

    #[test]
    fn test_rule_defaults_and_dedupe_aliases() {
        let value = json!({"en:wikipedia": {"templates": {"Cats": {
            "auto": "NONE",
            "rules": [
                {"type": "unnamed_single", "from": "A", "to": "B", "dedupe": "keep_second"},
                {"from": "C", "to": "D", "dedupe": "bogus"}
            ]
        }}}});
        let up = upgrade(value).unwrap();
        assert!(up.legacy);
        let rules = &bucket(&up, "en:wikipedia", "Cats").rules;
        assert_eq!(
            rules[0].kind,
            RuleKind::PositionalSingle {
                from: "A".to_string(),
                to: "B".to_string(),
                dedupe: Some(DedupePolicy::Right),
            }
        );
        assert_eq!(
            rules[1].kind,
            RuleKind::PositionalSingle {
                from: "C".to_string(),
                to: "D".to_string(),
                dedupe: None,
            }
        );
    }

    #[test]
    fn test_non_object_file_is_rejected() {
        assert!(upgrade(json!([1, 2, 3])).is_err());
    }
}
