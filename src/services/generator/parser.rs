//! Tolerant parser for language model completions
//!
//! Completions are asked to contain one flat JSON object, but often arrive
//! truncated, prefixed with chatter, or written as a Python dict literal.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of paragraphs a generated article may carry
pub const MAX_GENERATED_PARAGRAPHS: usize = 5;

static PARAGRAPH_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^paragraph([1-9][0-9]*)_(title|text)$").expect("paragraph key pattern is valid")
});

/// A generated article in its flat key shape:
/// `title`, `paragraph1_title`, `paragraph1_text`, ... `paragraph5_text`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedArticle {
    fields: BTreeMap<String, String>,
}

impl GeneratedArticle {
    pub fn from_fields<K: Into<String>, V: Into<String>>(fields: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Record returned when the endpoint cannot be reached
    pub fn connection_error() -> Self {
        Self::from_fields([("title", "Connection error")])
    }

    /// Record returned when the completion cannot be parsed; keeps the raw text
    pub fn format_error(raw: &str) -> Self {
        Self::from_fields([
            ("title", "format error"),
            ("paragraph1_title", "Raw text:"),
            ("paragraph1_text", raw),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn title(&self) -> &str {
        self.get("title").unwrap_or_default()
    }

    /// `(title, text)` pairs in paragraph order, at most five.
    ///
    /// A paragraph is included when either of its keys is present.
    pub fn paragraphs(&self) -> Vec<(String, String)> {
        let mut numbered: BTreeMap<usize, (String, String)> = BTreeMap::new();
        for (key, value) in &self.fields {
            let Some(caps) = PARAGRAPH_KEY.captures(key) else {
                continue;
            };
            let Ok(index) = caps[1].parse::<usize>() else {
                continue;
            };
            if index > MAX_GENERATED_PARAGRAPHS {
                continue;
            }
            let entry = numbered.entry(index).or_default();
            if &caps[2] == "title" {
                entry.0 = value.clone();
            } else {
                entry.1 = value.clone();
            }
        }
        numbered.into_values().collect()
    }
}

impl Serialize for GeneratedArticle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Coerce a raw completion into a [`GeneratedArticle`].
///
/// Text before the first `{` is dropped, a truncated tail is closed off, and
/// both JSON and single-quoted dict literals are accepted. Keys are
/// lower-cased. Anything unparseable yields [`GeneratedArticle::format_error`].
pub fn parse_completion(raw: &str) -> GeneratedArticle {
    let Some(start) = raw.find('{') else {
        return GeneratedArticle::format_error(raw);
    };
    let content = repair_tail(&raw[start..]);

    let parsed = serde_json::from_str::<Value>(&content)
        .ok()
        .or_else(|| python_literal_to_json(&content).and_then(|json| serde_json::from_str(&json).ok()));

    match parsed {
        Some(Value::Object(map)) => GeneratedArticle {
            fields: map
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), value_to_text(value)))
                .collect(),
        },
        _ => GeneratedArticle::format_error(raw),
    }
}

/// Close a completion cut off mid-object
fn repair_tail(content: &str) -> String {
    let mut content = content.trim_end().to_string();
    if content.ends_with(':') {
        content.push_str("''");
    }
    if !matches!(content.chars().last(), Some('"' | '}' | '\'')) {
        // Reuse the quote style of the object's first key
        let quote = if content.starts_with("{'") || content.starts_with("{ '") {
            '\''
        } else {
            '"'
        };
        content.push(quote);
    }
    if !content.ends_with('}') {
        content.push('}');
    }
    content
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Rewrite a Python literal (single-quoted strings, True/False/None) as JSON.
///
/// Returns `None` when a string is left unterminated.
fn python_literal_to_json(literal: &str) -> Option<String> {
    let mut out = String::with_capacity(literal.len() + 8);
    let mut chars = literal.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push('"');
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => match chars.next()? {
                            '\'' => out.push('\''),
                            '"' => out.push_str("\\\""),
                            'n' => out.push_str("\\n"),
                            't' => out.push_str("\\t"),
                            '\\' => out.push_str("\\\\"),
                            other => {
                                out.push_str("\\\\");
                                out.push(other);
                            }
                        },
                        _ if ch == c => {
                            closed = true;
                            break;
                        }
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\t' => out.push_str("\\t"),
                        _ => out.push(ch),
                    }
                }
                if !closed {
                    return None;
                }
                out.push('"');
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            _ => out.push(c),
        }
    }
    Some(out)
}
