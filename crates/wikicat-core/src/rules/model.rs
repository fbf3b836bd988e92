//! Learned substitution rules and their buckets

use serde::{Deserialize, Serialize};

/// Auto-disposition of a rule or a whole bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoState {
    /// Apply future identical templates without asking
    Approve,
    /// Never touch, never ask
    Skip,
    /// Ask for new values; previously confirmed values still apply
    #[default]
    None,
}

impl AutoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoState::Approve => "approve",
            AutoState::Skip => "skip",
            AutoState::None => "none",
        }
    }
}

/// What to do with duplicate positional values a substitution creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupePolicy {
    /// Keep the first occurrence, drop later ones
    #[serde(alias = "keep_first")]
    Left,
    /// Keep the last occurrence, drop earlier ones
    #[serde(alias = "keep_second")]
    Right,
    KeepBoth,
}

impl DedupePolicy {
    /// Parse the tokens a reviewer may type or a legacy file may hold
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" | "keep_first" | "l" => Some(DedupePolicy::Left),
            "right" | "keep_second" | "r" => Some(DedupePolicy::Right),
            "keep_both" | "both" | "b" => Some(DedupePolicy::KeepBoth),
            _ => None,
        }
    }
}

/// One position of a sequence rule (1-based)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    #[serde(rename = "idx")]
    pub index: usize,
    pub from: String,
    pub to: String,
}

/// Matching part of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Named {
        /// Normalized parameter key
        param: String,
        from: String,
        to: String,
    },
    #[serde(rename = "unnamed_single")]
    PositionalSingle {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dedupe: Option<DedupePolicy>,
    },
    #[serde(rename = "unnamed_sequence")]
    PositionalSequence { sequence: Vec<SequenceStep> },
}

impl RuleKind {
    /// Same (kind, param, from, to, sequence); dedupe is not part of identity
    pub fn same_identity(&self, other: &RuleKind) -> bool {
        match (self, other) {
            (
                RuleKind::Named { param, from, to },
                RuleKind::Named {
                    param: p2,
                    from: f2,
                    to: t2,
                },
            ) => param == p2 && from == f2 && to == t2,
            (
                RuleKind::PositionalSingle { from, to, .. },
                RuleKind::PositionalSingle {
                    from: f2, to: t2, ..
                },
            ) => from == f2 && to == t2,
            (
                RuleKind::PositionalSequence { sequence },
                RuleKind::PositionalSequence { sequence: s2 },
            ) => sequence == s2,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub auto: AutoState,
}

impl Rule {
    pub fn named(param: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Named {
                param: param.into(),
                from: from.into(),
                to: to.into(),
            },
            auto: AutoState::None,
        }
    }

    pub fn positional(
        from: impl Into<String>,
        to: impl Into<String>,
        dedupe: Option<DedupePolicy>,
    ) -> Self {
        Self {
            kind: RuleKind::PositionalSingle {
                from: from.into(),
                to: to.into(),
                dedupe,
            },
            auto: AutoState::None,
        }
    }

    pub fn sequence(steps: Vec<SequenceStep>) -> Self {
        Self {
            kind: RuleKind::PositionalSequence { sequence: steps },
            auto: AutoState::None,
        }
    }

    pub fn with_auto(mut self, auto: AutoState) -> Self {
        self.auto = auto;
        self
    }
}

/// Rules plus bucket-level disposition for one template of one project
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleBucket {
    /// Template name as first seen, used as the persisted key
    #[serde(skip)]
    pub display_name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub auto: AutoState,
}

impl RuleBucket {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            rules: Vec::new(),
            auto: AutoState::None,
        }
    }

    /// Whether cached rules may be applied without a prompt
    pub fn is_eligible(&self) -> bool {
        self.auto != AutoState::Skip && (!self.rules.is_empty() || self.auto == AutoState::Approve)
    }
}

/// Normalized bucket identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    /// `"{lang}:{family}"`
    pub project: String,
    /// Case-folded, whitespace-normalized template name without namespace prefix
    pub template: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_serializes_flat_with_type_tag() {
        let rule = Rule::positional("Old", "New", Some(DedupePolicy::Left));
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            json!({"type": "unnamed_single", "from": "Old", "to": "New", "dedupe": "left", "auto": "none"})
        );
    }

    #[test]
    fn test_rule_without_auto_defaults_to_none() {
        let rule: Rule =
            serde_json::from_value(json!({"type": "named", "param": "p", "from": "a", "to": "b"}))
                .unwrap();
        assert_eq!(rule.auto, AutoState::None);
    }

    #[test]
    fn test_legacy_dedupe_names_are_accepted() {
        let rule: Rule = serde_json::from_value(
            json!({"type": "unnamed_single", "from": "a", "to": "b", "dedupe": "keep_second"}),
        )
        .unwrap();
        assert_eq!(
            rule.kind,
            RuleKind::PositionalSingle {
                from: "a".to_string(),
                to: "b".to_string(),
                dedupe: Some(DedupePolicy::Right),
            }
        );
    }

    #[test]
    fn test_identity_ignores_dedupe() {
        let a = Rule::positional("x", "y", Some(DedupePolicy::Left));
        let b = Rule::positional("x", "y", None);
        assert!(a.kind.same_identity(&b.kind));
        assert!(!a.kind.same_identity(&Rule::named("p", "x", "y").kind));
    }

    #[test]
    fn test_bucket_eligibility() {
        let mut bucket = RuleBucket::new("InfoBox");
        assert!(!bucket.is_eligible());
        bucket.auto = AutoState::Approve;
        assert!(bucket.is_eligible());
        bucket.auto = AutoState::Skip;
        bucket.rules.push(Rule::named("p", "a", "b"));
        assert!(!bucket.is_eligible());
    }

    #[test]
    fn test_dedupe_parse() {
        assert_eq!(DedupePolicy::parse("keep_first"), Some(DedupePolicy::Left));
        assert_eq!(DedupePolicy::parse(" R "), Some(DedupePolicy::Right));
        assert_eq!(DedupePolicy::parse("both"), Some(DedupePolicy::KeepBoth));
        assert_eq!(DedupePolicy::parse("?"), None);
    }
}
