//! In-memory rule book: bucket lookup, upsert and text application

use super::matcher::apply_bucket;
use super::model::{AutoState, BucketKey, DedupePolicy, Rule, RuleBucket, RuleKind, SequenceStep};
use crate::invocation::{diff, rewrite_spans, shallow_spans, Invocation, PositionalShape};
use crate::namespace::{strip_namespace, NamespaceId, NamespacePrefixResolver, ProjectRef};
use crate::text::{normalize_for_compare, normalize_key};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which parameter a cached value lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRef<'a> {
    /// Normalized key
    Named(&'a str),
    Positional,
}

/// Stored answer for one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub to: String,
    pub dedupe: Option<DedupePolicy>,
}

/// All buckets of all projects
pub struct RuleBook {
    buckets: BTreeMap<BucketKey, RuleBucket>,
    resolver: Arc<dyn NamespacePrefixResolver>,
}

impl RuleBook {
    pub fn new(resolver: Arc<dyn NamespacePrefixResolver>) -> Self {
        Self {
            buckets: BTreeMap::new(),
            resolver,
        }
    }

    fn display_name(&self, project: &ProjectRef, template: &str) -> String {
        strip_namespace(
            self.resolver.as_ref(),
            project,
            template,
            NamespaceId::TEMPLATE,
        )
    }

    /// Normalized key for `template` (prefix stripped, case-folded)
    pub fn bucket_key(&self, project: &ProjectRef, template: &str) -> BucketKey {
        BucketKey {
            project: project.key(),
            template: normalize_key(&self.display_name(project, template)),
        }
    }

    pub fn bucket(&self, project: &ProjectRef, template: &str) -> Option<&RuleBucket> {
        self.buckets.get(&self.bucket_key(project, template))
    }

    fn bucket_entry(&mut self, project: &ProjectRef, template: &str) -> &mut RuleBucket {
        let key = self.bucket_key(project, template);
        let display = self.display_name(project, template);
        self.buckets
            .entry(key)
            .or_insert_with(|| RuleBucket::new(display))
    }

    /// Insert a bucket loaded from storage, merging into an existing key
    pub fn insert_bucket(&mut self, project: &ProjectRef, bucket: RuleBucket) {
        let name = bucket.display_name.clone();
        let entry = self.bucket_entry(project, &name);
        if entry.auto == AutoState::None {
            entry.auto = bucket.auto;
        }
        for rule in bucket.rules {
            upsert(entry, rule);
        }
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&BucketKey, &RuleBucket)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Add `rule` to the bucket of `template`; returns whether the book changed
    pub fn upsert(&mut self, project: &ProjectRef, template: &str, rule: Rule) -> bool {
        upsert(self.bucket_entry(project, template), rule)
    }

    /// Learn rules from a confirmed edit of one invocation
    ///
    /// Returns whether any rule was added or updated. Fragments that do not
    /// parse, or edits that change nothing, record nothing.
    pub fn record_edit(
        &mut self,
        project: &ProjectRef,
        before: &str,
        after: &str,
        auto: AutoState,
        dedupe: Option<DedupePolicy>,
    ) -> bool {
        let Some(delta) = diff(before, after) else {
            return false;
        };
        if delta.is_empty() {
            return false;
        }

        let mut rules = Vec::new();
        for change in &delta.named {
            if !change.key.is_empty() {
                rules.push(Rule::named(&change.key, &change.from, &change.to).with_auto(auto));
            }
        }
        match delta.positional_shape() {
            PositionalShape::Unchanged => {}
            PositionalShape::Single(change) => {
                if !change.from.is_empty() {
                    rules.push(Rule::positional(&change.from, &change.to, dedupe).with_auto(auto));
                }
            }
            PositionalShape::Sequence(changes) => {
                let steps = changes
                    .iter()
                    .map(|c| SequenceStep {
                        index: c.index,
                        from: c.from.clone(),
                        to: c.to.clone(),
                    })
                    .collect();
                rules.push(Rule::sequence(steps).with_auto(auto));
            }
        }

        let mut changed = false;
        for rule in rules {
            changed |= self.upsert(project, &delta.template, rule);
        }
        changed
    }

    /// Toggle bucket-level approve; clears skip when switched on
    pub fn set_auto_approve(&mut self, project: &ProjectRef, template: &str, on: bool) -> bool {
        set_disposition(self.bucket_entry(project, template), AutoState::Approve, on)
    }

    /// Toggle bucket-level skip; clears approve when switched on
    pub fn set_auto_skip(&mut self, project: &ProjectRef, template: &str, on: bool) -> bool {
        set_disposition(self.bucket_entry(project, template), AutoState::Skip, on)
    }

    pub fn is_auto_skip(&self, project: &ProjectRef, template: &str) -> bool {
        self.bucket(project, template)
            .is_some_and(|b| b.auto == AutoState::Skip)
    }

    pub fn is_auto_approve(&self, project: &ProjectRef, template: &str) -> bool {
        self.bucket(project, template)
            .is_some_and(|b| b.auto == AutoState::Approve)
    }

    /// Stored answer for `value` in the given parameter of `template`, if any
    pub fn resolve_value(
        &self,
        project: &ProjectRef,
        template: &str,
        param: ParamRef<'_>,
        value: &str,
    ) -> Option<Resolution> {
        let bucket = self.bucket(project, template)?;
        if bucket.auto == AutoState::Skip {
            return None;
        }
        let wanted = normalize_for_compare(value);
        bucket
            .rules
            .iter()
            .filter(|r| r.auto != AutoState::Skip)
            .find_map(|r| match (&r.kind, param) {
                (RuleKind::Named { param: p, from, to }, ParamRef::Named(key))
                    if p == key && normalize_for_compare(from) == wanted =>
                {
                    Some(Resolution {
                        to: to.clone(),
                        dedupe: None,
                    })
                }
                (RuleKind::PositionalSingle { from, to, dedupe }, ParamRef::Positional)
                    if normalize_for_compare(from) == wanted =>
                {
                    Some(Resolution {
                        to: to.clone(),
                        dedupe: *dedupe,
                    })
                }
                _ => None,
            })
    }

    /// Apply cached rules to every `{{...}}` span of `text`
    ///
    /// Spans are found by shallow scanning; spans without a `|` and spans whose
    /// bucket is missing or ineligible are left alone. Returns the new text and
    /// the number of spans rewritten.
    pub fn apply_to_text(&self, project: &ProjectRef, text: &str) -> (String, usize) {
        let spans = shallow_spans(text);
        rewrite_spans(text, &spans, |chunk| {
            if !chunk.contains('|') {
                return None;
            }
            let mut inv = Invocation::parse(chunk)?;
            let bucket = self.bucket(project, inv.name())?;
            if !bucket.is_eligible() {
                return None;
            }
            apply_bucket(bucket, &mut inv).then(|| inv.render())
        })
    }
}

fn raise_auto(rule: &mut Rule, auto: AutoState) -> bool {
    if auto != AutoState::None && rule.auto != auto {
        rule.auto = auto;
        return true;
    }
    false
}

/// Upsert into one bucket, keeping identities unique
fn upsert(bucket: &mut RuleBucket, rule: Rule) -> bool {
    if let RuleKind::PositionalSingle { from, to, dedupe } = &rule.kind {
        let existing = bucket.rules.iter_mut().find(
            |r| matches!(&r.kind, RuleKind::PositionalSingle { from: f, .. } if f == from),
        );
        if let Some(existing) = existing {
            let mut changed = false;
            if let RuleKind::PositionalSingle {
                to: old_to,
                dedupe: old_dedupe,
                ..
            } = &mut existing.kind
            {
                if !to.is_empty() && old_to != to {
                    *old_to = to.clone();
                    changed = true;
                }
                if dedupe.is_some() && old_dedupe != dedupe {
                    *old_dedupe = *dedupe;
                    changed = true;
                }
            }
            return raise_auto(existing, rule.auto) || changed;
        }
    }

    if let Some(existing) = bucket
        .rules
        .iter_mut()
        .find(|r| r.kind.same_identity(&rule.kind))
    {
        return raise_auto(existing, rule.auto);
    }

    bucket.rules.push(rule);
    true
}

fn set_disposition(bucket: &mut RuleBucket, state: AutoState, on: bool) -> bool {
    let next = if on {
        state
    } else if bucket.auto == state {
        AutoState::None
    } else {
        bucket.auto
    };
    let changed = next != bucket.auto;
    bucket.auto = next;
    changed
}
