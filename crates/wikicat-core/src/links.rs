//! Direct category link rewriting
//!
//! `[[Category:Old Topic|Sort]]` becomes `[[Category:New Topic|Sort]]`. Any
//! recognised local prefix or alias is matched case-insensitively; the
//! rewritten link always uses the canonical prefix. Sort keys are carried
//! over verbatim.

use crate::errors::{ExError, ExErrorKind, Result};
use regex::{Captures, Regex};

/// Outcome of one rewrite pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRewrite {
    pub text: String,
    pub replaced: usize,
}

/// Title pattern tolerant to `_`/space interchange
fn title_pattern(name: &str) -> String {
    name.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[_\s]+")
}

/// Build the link matcher for `old_name` under any of `prefixes`
///
/// Prefixes may carry a trailing colon; longer ones are tried first.
pub fn category_link_regex(prefixes: &[String], old_name: &str) -> Result<Regex> {
    let mut alternatives: Vec<String> = prefixes
        .iter()
        .map(|p| p.trim().trim_end_matches(':').trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if alternatives.is_empty() {
        alternatives.push("Category".to_string());
    }
    alternatives.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    alternatives.dedup();

    let prefix_alt = alternatives
        .iter()
        .map(|p| title_pattern(p))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?i)\[\[\s*(?:{})\s*:\s*{}\s*(?:\|(?P<sort>[^\]]*))?\]\]",
        prefix_alt,
        title_pattern(old_name)
    );
    Regex::new(&pattern).map_err(|e| {
        ExError::new(ExErrorKind::InvalidInput)
            .with_op("category_link_regex")
            .with_message(e.to_string())
    })
}

/// Rewrite every direct link to `old_name` into a link to `new_name`
///
/// `new_prefix` is written as-is in front of `new_name` (e.g. `"Category:"`).
pub fn rewrite_category_links(
    text: &str,
    prefixes: &[String],
    old_name: &str,
    new_prefix: &str,
    new_name: &str,
) -> Result<LinkRewrite> {
    if old_name.trim().is_empty() {
        return Ok(LinkRewrite {
            text: text.to_string(),
            replaced: 0,
        });
    }
    let re = category_link_regex(prefixes, old_name)?;
    let mut replaced = 0;
    let out = re.replace_all(text, |caps: &Captures<'_>| {
        replaced += 1;
        match caps.name("sort") {
            Some(sort) => format!("[[{}{}|{}]]", new_prefix, new_name, sort.as_str()),
            None => format!("[[{}{}]]", new_prefix, new_name),
        }
    });
    Ok(LinkRewrite {
        text: out.into_owned(),
        replaced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["Category:".to_string(), "CAT:".to_string()]
    }

    #[test]
    fn test_rewrite_keeps_sort_key() {
        let out = rewrite_category_links(
            "text\n[[Category:Old Topic|Sort]]\n",
            &prefixes(),
            "Old Topic",
            "Category:",
            "New Topic",
        )
        .unwrap();
        assert_eq!(out.text, "text\n[[Category:New Topic|Sort]]\n");
        assert_eq!(out.replaced, 1);
    }

    #[test]
    fn test_rewrite_tolerates_case_spacing_and_underscores() {
        let out = rewrite_category_links(
            "[[ category : Old_Topic ]] [[CAT:Old  Topic| ]]",
            &prefixes(),
            "Old Topic",
            "Category:",
            "New Topic",
        )
        .unwrap();
        assert_eq!(out.text, "[[Category:New Topic]] [[Category:New Topic| ]]");
        assert_eq!(out.replaced, 2);
    }

    #[test]
    fn test_other_categories_untouched() {
        let text = "[[Category:Old Topics]] [[Category:Older Topic]]";
        let out =
            rewrite_category_links(text, &prefixes(), "Old Topic", "Category:", "New").unwrap();
        assert_eq!(out.text, text);
        assert_eq!(out.replaced, 0);
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let out = rewrite_category_links(
            "[[Category:C++ (language)]]",
            &prefixes(),
            "C++ (language)",
            "Category:",
            "C++",
        )
        .unwrap();
        assert_eq!(out.text, "[[Category:C++]]");
    }
}
