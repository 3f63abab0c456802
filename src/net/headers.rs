//! Header collection used by requests
//!
//! A deliberately small model: one value per name, names kept exactly as
//! supplied, iteration in order of first insertion, no removal.

use std::collections::HashMap;

/// Ordered name/value header store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Same as [`set`](Self::set): the last value written for a name wins
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, value);
    }

    /// Write `value` for `name`, keeping the name's original position
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Whether a value was written for `name`
    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Names in order of first insertion
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Name/value pairs in order of first insertion
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no header was written
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into the plain mapping the native transport expects
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries.iter().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    /// Builds from pairs; for a repeated name only the first value is kept
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            let name = name.into();
            if !headers.has(&name) {
                headers.entries.push((name, value.into()));
            }
        }
        headers
    }
}
