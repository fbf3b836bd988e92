//! Template invocations: `{{Name|positional|key = value}}`
//!
//! Parsing is deliberately shallow. The fragment is split on every `|`, so a
//! nested invocation or a piped link inside a parameter is not understood;
//! callers only ever hand in spans found by [`scan`], which stop at the first
//! `}}` anyway. Rendering reproduces the fragment byte for byte when nothing
//! was changed.

pub mod diff;
pub mod scan;

pub use diff::{diff, InvocationDelta, NamedChange, PositionalChange, PositionalShape};
pub use scan::{flat_spans, rewrite_spans, shallow_spans, Span};

use crate::text::{normalize_key, replace_core};

/// One parameter of an invocation, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Positional(String),
    /// `key` and `value` are raw; `eq` holds the `=` with its surrounding whitespace
    Named {
        key: String,
        eq: String,
        value: String,
    },
}

impl Param {
    /// Classify one `|`-separated chunk
    pub fn parse(raw: &str) -> Param {
        if let Some(idx) = raw.find('=') {
            let before = &raw[..idx];
            let key_end = before.trim_end().len();
            if !before.trim().is_empty() {
                let after = &raw[idx + 1..];
                let value_start = after.len() - after.trim_start().len();
                return Param::Named {
                    key: before[..key_end].to_string(),
                    eq: format!("{}={}", &before[key_end..], &after[..value_start]),
                    value: after[value_start..].to_string(),
                };
            }
        }
        Param::Positional(raw.to_string())
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Param::Named { .. })
    }

    /// Raw value text (the whole chunk for positional params)
    pub fn value(&self) -> &str {
        match self {
            Param::Positional(v) => v,
            Param::Named { value, .. } => value,
        }
    }

    /// Normalized key of a named param
    pub fn key(&self) -> Option<String> {
        match self {
            Param::Positional(_) => None,
            Param::Named { key, .. } => Some(normalize_key(key)),
        }
    }

    /// Replace the value, keeping the whitespace that surrounded it
    pub fn set_value(&mut self, new_value: &str) {
        match self {
            Param::Positional(v) => *v = replace_core(v, new_value),
            Param::Named { value, .. } => *value = replace_core(value, new_value),
        }
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Param::Positional(v) => out.push_str(v),
            Param::Named { key, eq, value } => {
                out.push_str(key);
                out.push_str(eq);
                out.push_str(value);
            }
        }
    }

    /// Chunk text as it appears between the pipes
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }
}

/// A parsed `{{...}}` fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    raw_name: String,
    params: Vec<Param>,
}

impl Invocation {
    /// Parse a fragment; `None` when it is not a braced invocation with at least one parameter
    pub fn parse(fragment: &str) -> Option<Invocation> {
        let inner = fragment.strip_prefix("{{")?.strip_suffix("}}")?;
        let mut parts = inner.split('|');
        let raw_name = parts.next()?.to_string();
        if raw_name.trim().is_empty() {
            return None;
        }
        let params: Vec<Param> = parts.map(Param::parse).collect();
        if params.is_empty() {
            return None;
        }
        Some(Invocation { raw_name, params })
    }

    /// Template name, trimmed
    pub fn name(&self) -> &str {
        self.raw_name.trim()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Vec<Param> {
        &mut self.params
    }

    /// Indices into [`Invocation::params`] of the positional params, in order
    pub fn positional_slots(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_named())
            .map(|(i, _)| i)
            .collect()
    }

    /// Raw positional values, in order
    pub fn positional_values(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| !p.is_named())
            .map(Param::value)
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("{{");
        out.push_str(&self.raw_name);
        for p in &self.params {
            out.push('|');
            p.render_into(&mut out);
        }
        out.push_str("}}");
        out
    }
}
