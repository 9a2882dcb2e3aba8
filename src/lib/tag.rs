//! Struct tag handling
//!
//! Tags are kept as an ordered list of `key:"value"` pairs, so that a tag
//! which is parsed and rendered again comes out in the order it was written.
use std::fmt::{self, Display, Formatter};

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StructTag(Vec<(String, String)>);

impl StructTag {
    /// Parses the contents of a tag literal.
    ///
    /// Parsing stops at the first malformed pair, keeping whatever was
    /// parsed up to that point. A repeated key overwrites the earlier value.
    pub fn parse(lit: &str) -> StructTag {
        let mut tag = StructTag::default();
        let mut rest = lit.trim();
        while !rest.is_empty() {
            let (key, value_start) = match rest.split_once(":\"") {
                Some(split) => split,
                None => break,
            };
            let end = match value_start.find('"') {
                Some(end) => end,
                None => break,
            };
            tag.insert(key.trim(), &value_start[..end]);
            rest = value_start[end + 1..].trim();
        }
        tag
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.0.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) { self.0.retain(|(k, _)| k != key); }

    /// Whether `key` is present and one of the parts of its value, split on
    /// any of `delimiters`, equals `expected`.
    pub fn has_part(&self, key: &str, expected: &str, delimiters: &[char]) -> bool {
        self.get(key)
            .map(|value| contains_part(value, expected, delimiters))
            .unwrap_or(false)
    }
}

impl Display for StructTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:\"{}\"", key, value)?;
        }
        Ok(())
    }
}

pub fn contains_part(value: &str, expected: &str, delimiters: &[char]) -> bool {
    value
        .split(|c: char| delimiters.contains(&c))
        .any(|part| part.trim() == expected)
}
