//! Finding category references inside template parameters
//!
//! Each parameter of an invocation is tested against the renamed category,
//! first as a whole value (bare or prefixed name, quoted or HTML-encoded,
//! first letter in either case), then against partial pairs derived from the
//! point where the old and new names diverge. The first test that matches
//! wins for that parameter.

use crate::invocation::{Invocation, Param};
use crate::rules::duplicate_slots;
use crate::text::{
    align_first_letter_case, decode_html_entities, encode_html_entities,
    eq_ignoring_first_letter_case, unquote,
};

/// Old and new category names, bare and prefixed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameNames {
    pub old_bare: String,
    pub new_bare: String,
    pub old_full: String,
    pub new_full: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Direct,
    Partial,
}

/// One parameter that references the old category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Index into [`Invocation::params`]
    pub param_index: usize,
    /// Normalized key when the parameter is named
    pub named_key: Option<String>,
    /// Literal text found in the parameter
    pub old_value: String,
    /// Replacement for `old_value`
    pub new_value: String,
    pub kind: MatchKind,
}

/// Invocation after substituting one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub invocation: Invocation,
    pub fragment: String,
    /// 1-based positional indices holding the new value, when there are two or more
    pub duplicates: Vec<usize>,
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '-' | '–' | '—')
}

fn tokens(s: &str) -> Vec<&str> {
    s.split(is_separator).filter(|t| !t.is_empty()).collect()
}

/// Sub-name pairs around the first differing token of `old` and `new`
///
/// Yields up to three pairs: the differing token alone, the token before it
/// joined with it, and everything from the divergence to the end.
pub fn partial_pairs(old: &str, new: &str) -> Vec<(String, String)> {
    let a = tokens(old);
    let b = tokens(new);
    let Some(idx) = (0..a.len().min(b.len())).find(|&i| a[i] != b[i]) else {
        return Vec::new();
    };

    let mut pairs = vec![(a[idx].to_string(), b[idx].to_string())];
    if idx > 0 {
        pairs.push((
            format!("{} {}", a[idx - 1], a[idx]),
            format!("{} {}", b[idx - 1], b[idx]),
        ));
    }
    pairs.push((a[idx..].join(" "), b[idx..].join(" ")));

    let mut seen = Vec::new();
    pairs.retain(|(o, n)| {
        let keep = !o.is_empty() && o != n && o != old && !seen.contains(o);
        if keep {
            seen.push(o.clone());
        }
        keep
    });
    pairs
}

fn direct_match(value: &str, names: &RenameNames) -> Option<(String, String)> {
    let plain = unquote(value);
    if plain.is_empty() {
        return None;
    }
    let decoded = decode_html_entities(plain);
    let encoded = decoded != plain;

    let pairs = [
        (names.old_bare.as_str(), names.new_bare.as_str()),
        (names.old_full.as_str(), names.new_full.as_str()),
    ];
    for (old, new) in pairs {
        if old.is_empty() {
            continue;
        }
        if plain == old {
            return Some((plain.to_string(), new.to_string()));
        }
        if encoded && decoded == old {
            return Some((plain.to_string(), encode_html_entities(new)));
        }
    }
    for (old, new) in pairs {
        if old.is_empty() {
            continue;
        }
        if eq_ignoring_first_letter_case(plain, old) {
            return Some((plain.to_string(), align_first_letter_case(plain, new)));
        }
        if encoded && eq_ignoring_first_letter_case(&decoded, old) {
            let aligned = align_first_letter_case(&decoded, new);
            return Some((plain.to_string(), encode_html_entities(&aligned)));
        }
    }
    None
}

fn partial_match(value: &str, partials: &[(String, String)]) -> Option<(String, String)> {
    let plain = unquote(value);
    if plain.is_empty() {
        return None;
    }
    let decoded = decode_html_entities(plain);
    partials.iter().find_map(|(old, new)| {
        if plain == old {
            Some((plain.to_string(), new.clone()))
        } else if decoded != plain && decoded == *old {
            Some((plain.to_string(), encode_html_entities(new)))
        } else {
            None
        }
    })
}

/// Every parameter of `inv` referencing the renamed category
pub fn find_candidates(inv: &Invocation, names: &RenameNames) -> Vec<Candidate> {
    let partials = partial_pairs(&names.old_bare, &names.new_bare);
    inv.params()
        .iter()
        .enumerate()
        .filter_map(|(param_index, param)| {
            let value = param.value();
            let (found, kind) = match direct_match(value, names) {
                Some(found) => (found, MatchKind::Direct),
                None => (partial_match(value, &partials)?, MatchKind::Partial),
            };
            Some(Candidate {
                param_index,
                named_key: param.key(),
                old_value: found.0,
                new_value: found.1,
                kind,
            })
        })
        .collect()
}

/// Substitute `candidate` into a copy of `inv` and look for duplicates
pub fn propose(inv: &Invocation, candidate: &Candidate) -> Proposal {
    let mut invocation = inv.clone();
    if let Some(param) = invocation.params_mut().get_mut(candidate.param_index) {
        let replaced = param
            .value()
            .replacen(&candidate.old_value, &candidate.new_value, 1);
        *param = match param {
            Param::Positional(_) => Param::Positional(replaced),
            Param::Named { key, eq, .. } => Param::Named {
                key: key.clone(),
                eq: eq.clone(),
                value: replaced,
            },
        };
    }

    let positional = candidate.named_key.is_none();
    let duplicates = if positional {
        let slots = invocation.positional_slots();
        let dups = duplicate_slots(&invocation, unquote(&candidate.new_value));
        if dups.len() >= 2 {
            dups.iter()
                .filter_map(|slot| slots.iter().position(|s| s == slot).map(|p| p + 1))
                .collect()
        } else {
            Vec::new()
        }
    } else {
        Vec::new()
    };

    let fragment = invocation.render();
    Proposal {
        invocation,
        fragment,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> RenameNames {
        RenameNames {
            old_bare: "Old Topic".to_string(),
            new_bare: "New Topic".to_string(),
            old_full: "Category:Old Topic".to_string(),
            new_full: "Category:New Topic".to_string(),
        }
    }

    fn first(src: &str) -> Candidate {
        let inv = Invocation::parse(src).unwrap();
        find_candidates(&inv, &names()).remove(0)
    }

    #[test]
    fn test_named_direct_match() {
        let c = first("{{InfoBox|location=Old Topic}}");
        assert_eq!(c.param_index, 0);
        assert_eq!(c.named_key.as_deref(), Some("location"));
        assert_eq!((c.old_value.as_str(), c.new_value.as_str()), ("Old Topic", "New Topic"));
        assert_eq!(c.kind, MatchKind::Direct);
    }

    #[test]
    fn test_prefixed_quoted_and_lowercase_values() {
        let c = first("{{A|x|\"Category:Old Topic\"}}");
        assert_eq!(c.param_index, 1);
        assert_eq!(c.new_value, "Category:New Topic");

        let c = first("{{A|old Topic}}");
        assert_eq!(c.new_value, "new Topic");
    }

    #[test]
    fn test_entity_encoded_value() {
        let n = RenameNames {
            old_bare: "Tom & Jerry".to_string(),
            new_bare: "Tom & Jerry films".to_string(),
            old_full: "Category:Tom & Jerry".to_string(),
            new_full: "Category:Tom & Jerry films".to_string(),
        };
        let inv = Invocation::parse("{{A|Tom &amp; Jerry}}").unwrap();
        let c = find_candidates(&inv, &n).remove(0);
        assert_eq!(c.old_value, "Tom &amp; Jerry");
        assert_eq!(c.new_value, "Tom &amp; Jerry films");
    }

    #[test]
    fn test_partial_pairs() {
        let pairs = partial_pairs("Films of 1990 Italy", "Films from 1990 Italy");
        assert_eq!(
            pairs,
            vec![
                ("of".to_string(), "from".to_string()),
                ("Films of".to_string(), "Films from".to_string()),
                ("of 1990 Italy".to_string(), "from 1990 Italy".to_string()),
            ]
        );
        assert!(partial_pairs("Same", "Same").is_empty());
    }

    #[test]
    fn test_partial_match_on_parameter() {
        let n = RenameNames {
            old_bare: "Rivers of Chile".to_string(),
            new_bare: "Rivers in Chile".to_string(),
            old_full: "Category:Rivers of Chile".to_string(),
            new_full: "Category:Rivers in Chile".to_string(),
        };
        let inv = Invocation::parse("{{Rivers|of|Chile}}").unwrap();
        let found = find_candidates(&inv, &n);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, MatchKind::Partial);
        assert_eq!(found[0].new_value, "in");
    }

    #[test]
    fn test_unrelated_params_do_not_match() {
        let inv = Invocation::parse("{{A|Old Topics|x=Older Topic}}").unwrap();
        assert!(find_candidates(&inv, &names()).is_empty());
    }

    #[test]
    fn test_propose_reports_duplicates() {
        let inv = Invocation::parse("{{Cats|Old Topic|New Topic}}").unwrap();
        let c = find_candidates(&inv, &names()).remove(0);
        let p = propose(&inv, &c);
        assert_eq!(p.fragment, "{{Cats|New Topic|New Topic}}");
        assert_eq!(p.duplicates, vec![1, 2]);
    }

    #[test]
    fn test_propose_named_has_no_duplicate_check() {
        let inv = Invocation::parse("{{A|New Topic|loc = Old Topic }}").unwrap();
        let c = find_candidates(&inv, &names()).remove(0);
        let p = propose(&inv, &c);
        assert_eq!(p.fragment, "{{A|New Topic|loc = New Topic }}");
        assert!(p.duplicates.is_empty());
    }
}
