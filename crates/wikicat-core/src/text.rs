//! Text normalization helpers shared by the rule engine and candidate detection

/// Zero-width and bidi control marks that editors leave behind invisibly
fn is_invisible_mark(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}'
    )
}

fn is_unicode_space(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}' | '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

/// Canonical form used when comparing parameter values
///
/// Drops invisible marks, maps exotic spaces to ASCII space, collapses runs of
/// whitespace and trims.
pub fn normalize_for_compare(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if is_invisible_mark(c) {
            continue;
        }
        if c.is_whitespace() || is_unicode_space(c) {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Key form for template names and named parameters
///
/// Case-folded, with runs of underscores and whitespace collapsed to one space.
pub fn normalize_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.trim().chars() {
        if c == '_' || c.is_whitespace() || is_unicode_space(c) {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.extend(c.to_lowercase());
    }
    out
}

const QUOTES: &[char] = &['"', '\'', '«', '»', '„', '“', '”'];

/// Trim whitespace and surrounding quote characters
pub fn unquote(s: &str) -> &str {
    s.trim().trim_matches(QUOTES).trim()
}

/// Decode the HTML entities wiki editors commonly type into parameters
pub fn decode_html_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|end| *end <= 10) {
            Some(end) => match decode_entity(&tail[1..end]) {
                Some(c) => {
                    out.push(c);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Escape the characters that HTML-encoded parameter values carry
pub fn encode_html_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Equal except possibly for the letter case of the first character
pub fn eq_ignoring_first_letter_case(a: &str, b: &str) -> bool {
    let mut ca = a.chars();
    let mut cb = b.chars();
    match (ca.next(), cb.next()) {
        (Some(x), Some(y)) => {
            x.to_lowercase().eq(y.to_lowercase()) && ca.as_str() == cb.as_str()
        }
        (None, None) => true,
        _ => false,
    }
}

/// Give `value` the first-letter case of `model`
pub fn align_first_letter_case(model: &str, value: &str) -> String {
    let Some(first) = model.chars().next() else {
        return value.to_string();
    };
    let mut chars = value.chars();
    let Some(head) = chars.next() else {
        return String::new();
    };
    let mut out = String::with_capacity(value.len());
    if first.is_lowercase() {
        out.extend(head.to_lowercase());
    } else if first.is_uppercase() {
        out.extend(head.to_uppercase());
    } else {
        out.push(head);
    }
    out.push_str(chars.as_str());
    out
}

/// Replace the trimmed core of `slot` with `value`, keeping surrounding whitespace
pub fn replace_core(slot: &str, value: &str) -> String {
    let start = slot.len() - slot.trim_start().len();
    let end = slot.trim_end().len().max(start);
    format!("{}{}{}", &slot[..start], value, &slot[end..])
}
