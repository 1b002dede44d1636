//! Struct tag parsing utilities.
//!
//! Parses source-language struct tags like `json:"name,omitempty" toml:"other"`.

use std::borrow::Cow;
use std::fmt;

/// Get the raw (still escaped) value for a specific key from a struct tag.
///
/// Tag format: `key:"value" key2:"value2"`
///
/// Returns None if the key is not found or the tag is malformed before it.
pub fn get_tag_value<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let mut remaining = tag;

    while !remaining.is_empty() {
        remaining = remaining.trim_start();
        if remaining.is_empty() {
            break;
        }

        // Keys are non-empty and contain no spaces, quotes or colons.
        let colon_pos = remaining.find(':')?;
        let current_key = &remaining[..colon_pos];
        if current_key.is_empty() || current_key.contains(|c: char| c == ' ' || c == '"') {
            return None;
        }
        remaining = &remaining[colon_pos + 1..];

        if !remaining.starts_with('"') {
            return None;
        }
        remaining = &remaining[1..];

        // Find closing quote, skipping escapes.
        let bytes = remaining.as_bytes();
        let mut value_end = 0;
        while value_end < bytes.len() {
            match bytes[value_end] {
                b'"' => break,
                b'\\' if value_end + 1 < bytes.len() => value_end += 2,
                _ => value_end += 1,
            }
        }
        if value_end >= bytes.len() {
            return None;
        }

        let value = &remaining[..value_end];
        if current_key == key {
            return Some(value);
        }
        remaining = &remaining[value_end + 1..];
    }

    None
}

/// Parse field options from a tag value like "name,omitempty".
///
/// Returns (field_name, omitempty).
/// If field_name is empty, the original field name should be used.
/// If field_name is "-", the field should be skipped.
pub fn parse_field_options(value: &str) -> (&str, bool) {
    let mut parts = value.split(',');
    let name = parts.next().unwrap_or("");
    let omitempty = parts.any(|p| p == "omitempty");
    (name, omitempty)
}

fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

/// A struct field tag as written in the source program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructTag(String);

impl StructTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for `key`, distinguishing a missing key from an empty value.
    pub fn lookup(&self, key: &str) -> Option<Cow<'_, str>> {
        get_tag_value(&self.0, key).map(unescape)
    }

    /// Value for `key`, or the empty string.
    pub fn get(&self, key: &str) -> Cow<'_, str> {
        self.lookup(key).unwrap_or(Cow::Borrowed(""))
    }
}

impl From<&str> for StructTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
