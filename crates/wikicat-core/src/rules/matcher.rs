//! Applying a bucket's rules to one invocation

use super::model::{AutoState, DedupePolicy, Rule, RuleBucket, RuleKind, SequenceStep};
use crate::invocation::{Invocation, Param};
use crate::text::normalize_for_compare;

fn same_value(a: &str, b: &str) -> bool {
    normalize_for_compare(a) == normalize_for_compare(b)
}

/// Apply every usable rule of `bucket` to `inv`, in stored order
///
/// Returns whether anything changed. Rules marked `skip` are ignored.
pub fn apply_bucket(bucket: &RuleBucket, inv: &mut Invocation) -> bool {
    let mut changed = false;
    for rule in bucket.rules.iter().filter(|r| r.auto != AutoState::Skip) {
        changed |= apply_rule(rule, inv);
    }
    changed
}

pub fn apply_rule(rule: &Rule, inv: &mut Invocation) -> bool {
    match &rule.kind {
        RuleKind::Named { param, from, to } => apply_named(inv, param, from, to),
        RuleKind::PositionalSingle { from, to, dedupe } => {
            apply_positional(inv, from, to, *dedupe)
        }
        RuleKind::PositionalSequence { sequence } => apply_sequence(inv, sequence),
    }
}

fn apply_named(inv: &mut Invocation, param: &str, from: &str, to: &str) -> bool {
    let mut changed = false;
    for p in inv.params_mut().iter_mut() {
        let hit = p.key().as_deref() == Some(param) && same_value(p.value(), from);
        if hit && p.value().trim() != to {
            p.set_value(to);
            changed = true;
        }
    }
    changed
}

/// Slots (indices into params) of positional values equal to `value`
pub fn duplicate_slots(inv: &Invocation, value: &str) -> Vec<usize> {
    if normalize_for_compare(value).is_empty() {
        return Vec::new();
    }
    inv.positional_slots()
        .into_iter()
        .filter(|&slot| same_value(inv.params()[slot].value(), value))
        .collect()
}

/// Remove duplicate positional occurrences of `value` per `policy`
///
/// Returns the number of params removed.
pub fn dedupe_positional(inv: &mut Invocation, value: &str, policy: DedupePolicy) -> usize {
    let dups = duplicate_slots(inv, value);
    if dups.len() < 2 {
        return 0;
    }
    let doomed: Vec<usize> = match policy {
        DedupePolicy::Left => dups[1..].to_vec(),
        DedupePolicy::Right => dups[..dups.len() - 1].to_vec(),
        DedupePolicy::KeepBoth => Vec::new(),
    };
    for slot in doomed.iter().rev() {
        inv.params_mut().remove(*slot);
    }
    doomed.len()
}

fn apply_positional(
    inv: &mut Invocation,
    from: &str,
    to: &str,
    dedupe: Option<DedupePolicy>,
) -> bool {
    let hits: Vec<usize> = inv
        .positional_slots()
        .into_iter()
        .filter(|&slot| same_value(inv.params()[slot].value(), from))
        .collect();
    let [slot] = hits.as_slice() else {
        return false;
    };

    let mut trial = inv.clone();
    trial.params_mut()[*slot].set_value(to);
    if duplicate_slots(&trial, to).len() >= 2 {
        match dedupe {
            None => return false,
            Some(policy) => {
                dedupe_positional(&mut trial, to, policy);
            }
        }
    }
    if trial == *inv {
        return false;
    }
    *inv = trial;
    true
}

fn apply_sequence(inv: &mut Invocation, steps: &[SequenceStep]) -> bool {
    let slots = inv.positional_slots();
    let all_match = steps.iter().all(|step| {
        let current = step
            .index
            .checked_sub(1)
            .and_then(|i| slots.get(i))
            .map(|&slot| inv.params()[slot].value())
            .unwrap_or("");
        step.index > 0 && same_value(current, &step.from)
    });
    if !all_match || steps.is_empty() {
        return false;
    }

    let mut changed = false;
    for step in steps {
        let slots = inv.positional_slots();
        match slots.get(step.index - 1) {
            Some(&slot) => {
                if inv.params()[slot].value().trim() != step.to {
                    inv.params_mut()[slot].set_value(&step.to);
                    changed = true;
                }
            }
            None if !step.to.is_empty() => {
                while inv.positional_slots().len() < step.index - 1 {
                    inv.params_mut().push(Param::Positional(String::new()));
                }
                inv.params_mut().push(Param::Positional(step.to.clone()));
                changed = true;
            }
            None => {}
        }
    }
    changed
}
