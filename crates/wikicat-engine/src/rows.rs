//! Tab-separated migration rows
//!
//! One row per line: `old<TAB>new<TAB>comment`. Extra columns are ignored.

use wikicat_core::errors::WikicatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRow {
    /// 1-based line number in the input
    pub line: usize,
    pub old: String,
    pub new: String,
    /// Row comment; empty when absent
    pub comment: String,
}

impl MigrationRow {
    pub fn new(old: impl Into<String>, new: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            line: 0,
            old: old.into(),
            new: new.into(),
            comment: comment.into(),
        }
    }
}

fn clean(cell: &str) -> String {
    cell.trim().trim_start_matches('\u{feff}').trim().to_string()
}

/// Parse every non-blank line; short rows become `InvalidRow` entries
pub fn parse_rows(input: &str) -> Vec<Result<MigrationRow, WikicatError>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, raw)| !clean(raw).is_empty())
        .map(|(idx, raw)| {
            let line = idx + 1;
            let cells: Vec<&str> = raw.split('\t').collect();
            if cells.len() < 3 {
                return Err(WikicatError::InvalidRow {
                    line,
                    reason: format!("expected 3 tab-separated columns, found {}", cells.len()),
                });
            }
            let (old, new) = (clean(cells[0]), clean(cells[1]));
            if old.is_empty() || new.is_empty() {
                return Err(WikicatError::InvalidRow {
                    line,
                    reason: "old and new titles must not be empty".to_string(),
                });
            }
            Ok(MigrationRow {
                line,
                old,
                new,
                comment: clean(cells[2]),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_with_bom_and_whitespace() {
        let rows = parse_rows("\u{feff}Category:Old Topic\t Category:New Topic \tmerge\r\n");
        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.old, "Category:Old Topic");
        assert_eq!(row.new, "Category:New Topic");
        assert_eq!(row.comment, "merge");
        assert_eq!(row.line, 1);
    }

    #[test]
    fn test_short_rows_are_reported() {
        let rows = parse_rows("A\tB\n\nC\tD\t\nE\n");
        assert_eq!(rows.len(), 3);
        assert!(matches!(rows[0], Err(WikicatError::InvalidRow { line: 1, .. })));
        assert_eq!(rows[1].as_ref().unwrap().comment, "");
        assert_eq!(rows[1].as_ref().unwrap().line, 3);
        assert!(rows[2].is_err());
    }

    #[test]
    fn test_empty_titles_rejected() {
        let rows = parse_rows(" \tNew\tc\n");
        assert!(matches!(rows[0], Err(WikicatError::InvalidRow { .. })));
    }
}
