//! Structural delta between two versions of one invocation

use super::Invocation;

/// A named parameter whose value changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedChange {
    /// Normalized key
    pub key: String,
    pub from: String,
    pub to: String,
}

/// A positional parameter whose value changed (1-based index)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalChange {
    pub index: usize,
    pub from: String,
    pub to: String,
}

/// How many positional params changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionalShape<'a> {
    Unchanged,
    Single(&'a PositionalChange),
    Sequence(&'a [PositionalChange]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationDelta {
    /// Template name as written in the `before` fragment
    pub template: String,
    pub named: Vec<NamedChange>,
    pub positional: Vec<PositionalChange>,
}

impl InvocationDelta {
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positional.is_empty()
    }

    pub fn positional_shape(&self) -> PositionalShape<'_> {
        match self.positional.as_slice() {
            [] => PositionalShape::Unchanged,
            [single] => PositionalShape::Single(single),
            many => PositionalShape::Sequence(many),
        }
    }
}

/// Last value wins for repeated keys, first position wins for ordering
fn named_map(inv: &Invocation) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for p in inv.params() {
        if let Some(key) = p.key() {
            let value = p.value().trim().to_string();
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
    }
    out
}

/// Compare two fragments of the same invocation
///
/// Returns `None` when either side does not parse. Named params are paired by
/// normalized key and only keys present on both sides are compared. Positional
/// params are paired by index, the shorter side padded with empty values.
pub fn diff(before: &str, after: &str) -> Option<InvocationDelta> {
    let old = Invocation::parse(before)?;
    let new = Invocation::parse(after)?;

    let new_named = named_map(&new);
    let named = named_map(&old)
        .into_iter()
        .filter_map(|(key, from)| {
            let (_, to) = new_named.iter().find(|(k, _)| *k == key)?;
            (from != *to).then(|| NamedChange {
                key,
                from,
                to: to.clone(),
            })
        })
        .collect();

    let old_pos = old.positional_values();
    let new_pos = new.positional_values();
    let width = old_pos.len().max(new_pos.len());
    let positional = (0..width)
        .filter_map(|i| {
            let from = old_pos.get(i).map(|v| v.trim()).unwrap_or("");
            let to = new_pos.get(i).map(|v| v.trim()).unwrap_or("");
            (from != to).then(|| PositionalChange {
                index: i + 1,
                from: from.to_string(),
                to: to.to_string(),
            })
        })
        .collect();

    Some(InvocationDelta {
        template: old.name().to_string(),
        named,
        positional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_named_change() {
        let d = diff(
            "{{InfoBox|location=Old Topic|year=1990}}",
            "{{InfoBox|location = New Topic|year=1990}}",
        )
        .unwrap();
        assert_eq!(
            d.named,
            vec![NamedChange {
                key: "location".to_string(),
                from: "Old Topic".to_string(),
                to: "New Topic".to_string(),
            }]
        );
        assert_eq!(d.positional_shape(), PositionalShape::Unchanged);
    }

    #[test]
    fn test_named_keys_missing_on_one_side_are_ignored() {
        let d = diff("{{A|x=1}}", "{{A|y=2}}").unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn test_named_keys_match_after_normalization() {
        let d = diff("{{A|Birth_place=Old}}", "{{A|birth place=New}}").unwrap();
        assert_eq!(d.named.len(), 1);
        assert_eq!(d.named[0].key, "birth place");
    }

    #[test]
    fn test_positional_single_and_sequence() {
        let d = diff("{{A|Old|b|c}}", "{{A|New|b|c}}").unwrap();
        match d.positional_shape() {
            PositionalShape::Single(c) => {
                assert_eq!((c.index, c.from.as_str(), c.to.as_str()), (1, "Old", "New"))
            }
            other => panic!("expected single, got {:?}", other),
        }

        let d = diff("{{A|X|Y}}", "{{A|P|Q}}").unwrap();
        assert!(matches!(d.positional_shape(), PositionalShape::Sequence(s) if s.len() == 2));
    }

    #[test]
    fn test_positional_padding() {
        let d = diff("{{A|a}}", "{{A|a|b}}").unwrap();
        assert_eq!(
            d.positional,
            vec![PositionalChange {
                index: 2,
                from: String::new(),
                to: "b".to_string(),
            }]
        );
    }

    #[test]
    fn test_unparseable_side() {
        assert!(diff("{{A}}", "{{A|b}}").is_none());
    }
}
