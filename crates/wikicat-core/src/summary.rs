//! Edit summaries

use crate::invocation::{shallow_spans, Invocation};

/// `[[Old]] → [[New]]`, optionally naming templates and a comment
///
/// ```
/// use wikicat_core::summary::edit_summary;
///
/// let s = edit_summary(
///     "Category:Old",
///     "Category:New",
///     &["[[Template:Infobox]]".to_string()],
///     Some("merge"),
/// );
/// assert_eq!(s, "[[Category:Old]] → [[Category:New]] (via [[Template:Infobox]]) — merge");
/// ```
pub fn edit_summary(
    old_title: &str,
    new_title: &str,
    template_labels: &[String],
    comment: Option<&str>,
) -> String {
    let mut out = format!("[[{}]] → [[{}]]", old_title, new_title);
    if !template_labels.is_empty() {
        out.push_str(" (via ");
        out.push_str(&template_labels.join(", "));
        out.push(')');
    }
    if let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) {
        out.push_str(" — ");
        out.push_str(comment);
    }
    out
}

/// Names of templates whose spans differ between `before` and `after`
///
/// A span counts as changed when its exact text does not occur in `before`.
/// Names are returned in order of first appearance, without repeats.
pub fn changed_templates(before: &str, after: &str) -> Vec<String> {
    let old_chunks: Vec<&str> = shallow_spans(before)
        .iter()
        .map(|s| s.slice(before))
        .collect();
    let mut names: Vec<String> = Vec::new();
    for span in shallow_spans(after) {
        let chunk = span.slice(after);
        if old_chunks.contains(&chunk) {
            continue;
        }
        if let Some(inv) = Invocation::parse(chunk) {
            let name = inv.name().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_summary() {
        assert_eq!(
            edit_summary("Category:Old Topic", "Category:New Topic", &[], None),
            "[[Category:Old Topic]] → [[Category:New Topic]]"
        );
        assert_eq!(
            edit_summary("A", "B", &[], Some("   ")),
            "[[A]] → [[B]]"
        );
    }

    #[test]
    fn test_changed_templates() {
        let before = "{{A|x}} {{B|y}} {{A|z}}";
        let after = "{{A|x2}} {{B|y}} {{A|z2}} {{C|w}}";
        assert_eq!(changed_templates(before, after), vec!["A", "C"]);
        assert!(changed_templates(before, before).is_empty());
    }
}
