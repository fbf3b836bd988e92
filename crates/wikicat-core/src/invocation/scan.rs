//! Locating `{{...}}` spans in page text

/// Byte range of one span, braces included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Spans from each `{{` to the first following `}}`
///
/// Not nesting-aware: `{{A|{{B}}|c}}` yields `{{A|{{B}}`. Scanning resumes
/// after the closing braces.
pub fn shallow_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(open) = text[pos..].find("{{") {
        let start = pos + open;
        match text[start + 2..].find("}}") {
            Some(close) => {
                let end = start + 2 + close + 2;
                spans.push(Span { start, end });
                pos = end;
            }
            None => break,
        }
    }
    spans
}

/// Spans with no brace characters between the delimiters
///
/// Only innermost invocations qualify; `{{A|{{B|x}}|c}}` yields `{{B|x}}`.
pub fn flat_spans(text: &str) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(open) = text[pos..].find("{{") {
        let start = pos + open;
        let mut j = start + 2;
        while j < bytes.len() && bytes[j] != b'{' && bytes[j] != b'}' {
            j += 1;
        }
        if j > start + 2 && j + 1 < bytes.len() && bytes[j] == b'}' && bytes[j + 1] == b'}' {
            spans.push(Span { start, end: j + 2 });
            pos = j + 2;
        } else {
            pos = start + 1;
        }
    }
    spans
}

/// Rebuild `text`, letting `rewrite` replace each span; returns the number replaced
pub fn rewrite_spans<F>(text: &str, spans: &[Span], mut rewrite: F) -> (String, usize)
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut changed = 0;
    for span in spans {
        out.push_str(&text[last..span.start]);
        let chunk = span.slice(text);
        match rewrite(chunk) {
            Some(new_chunk) if new_chunk != chunk => {
                out.push_str(&new_chunk);
                changed += 1;
            }
            _ => out.push_str(chunk),
        }
        last = span.end;
    }
    out.push_str(&text[last..]);
    (out, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slices(text: &str, spans: &[Span]) -> Vec<String> {
        spans.iter().map(|s| s.slice(text).to_string()).collect()
    }

    #[test]
    fn test_shallow_stops_at_first_close() {
        let text = "a {{A|{{B}}|c}} b {{C|d}}";
        assert_eq!(
            slices(text, &shallow_spans(text)),
            vec!["{{A|{{B}}", "{{C|d}}"]
        );
    }

    #[test]
    fn test_flat_finds_innermost() {
        let text = "{{A|{{B|x}}|c}} {{{p}}}";
        assert_eq!(slices(text, &flat_spans(text)), vec!["{{B|x}}", "{{p}}"]);
    }

    #[test]
    fn test_unclosed_span_is_ignored() {
        assert!(shallow_spans("{{A|b").is_empty());
        assert!(flat_spans("{{A|b").is_empty());
    }

    #[test]
    fn test_rewrite_spans_counts_real_changes() {
        let text = "x {{A|1}} y {{B|2}} z";
        let spans = shallow_spans(text);
        let (out, n) = rewrite_spans(text, &spans, |chunk| {
            if chunk.starts_with("{{A") {
                Some("{{A|9}}".to_string())
            } else {
                Some(chunk.to_string())
            }
        });
        assert_eq!(out, "x {{A|9}} y {{B|2}} z");
        assert_eq!(n, 1);
    }
}
