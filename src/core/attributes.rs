//! Named string attributes attached to archive groups.
//!
//! Attributes are key-value pairs of strings. The archive layer uses them to
//! record how a group should be reconstructed (its scheme tag, or the legacy
//! class/module pair written by older archives).

use smallvec::SmallVec;
use std::fmt;

/// Attribute storage - key-value pairs of strings.
///
/// Uses SmallVec optimization for the common case of few entries.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: SmallVec<[(String, String); 4]>,
}

impl Attributes {
    /// Attribute holding the scheme tag (current format).
    pub const SCHEME_KEY: &'static str = "data_scheme";

    /// Legacy attribute holding the bare type name.
    pub const LEGACY_CLASS_KEY: &'static str = "class_name";

    /// Legacy attribute holding the owning namespace.
    pub const LEGACY_NAMESPACE_KEY: &'static str = "module_name";

    /// Create empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute value, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        for (k, v) in &mut self.entries {
            if k == &key {
                *v = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    /// Get an attribute value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Remove a key and return its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Scheme tag, if present.
    pub fn scheme(&self) -> Option<&str> {
        self.get(Self::SCHEME_KEY)
    }

    /// Serialize to the on-disk string format.
    /// Format: "key=value;key2=value2;..."
    pub fn serialize(&self) -> String {
        let mut result = String::new();
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                result.push(';');
            }
            result.push_str(&escape(k));
            result.push('=');
            result.push_str(&escape(v));
        }
        result
    }

    /// Parse from the on-disk string format.
    pub fn parse(s: &str) -> Self {
        let mut attrs = Self::new();

        for part in split_unescaped(s, b';') {
            if let Some(eq_pos) = find_unescaped(part, b'=') {
                let key = unescape(&part[..eq_pos]);
                let value = unescape(&part[eq_pos + 1..]);
                if !key.is_empty() {
                    attrs.set(key, value);
                }
            }
        }

        attrs
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl FromIterator<(String, String)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            ';' => result.push_str("\\;"),
            '=' => result.push_str("\\="),
            _ => result.push(c),
        }
    }
    result
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next @ ('\\' | ';' | '=')) => {
                    result.push(next);
                    chars.next();
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// True if the byte at `i` is preceded by an even number of backslashes.
fn is_unescaped(bytes: &[u8], i: usize) -> bool {
    let backslashes = bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count();
    backslashes % 2 == 0
}

/// Find first unescaped occurrence of a byte.
fn find_unescaped(s: &str, ch: u8) -> Option<usize> {
    let bytes = s.as_bytes();
    (0..bytes.len()).find(|&i| bytes[i] == ch && is_unescaped(bytes, i))
}

/// Split by a separator byte, respecting escapes.
fn split_unescaped(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;

    for i in 0..bytes.len() {
        if bytes[i] == sep && is_unescaped(bytes, i) {
            parts.push(&s[start..i]);
            start = i + 1;
        }
    }

    if start < s.len() {
        parts.push(&s[start..]);
    }

    parts
}
