//! `localStorage` / `sessionStorage`
//!
//! Process-lifetime key/value stores. Values are stored in their string form.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

/// Storage area; clones share the same data
#[derive(Debug, Default, Clone)]
pub struct Storage {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.data.lock().ok()?.get(key).cloned()
    }

    /// Store the string form of `value`
    pub fn set_item(&self, key: &str, value: impl Display) {
        if let Ok(mut data) = self.data.lock() {
            data.insert(key.to_string(), value.to_string());
        }
    }

    /// Returns whether `key` was present
    pub fn remove_item(&self, key: &str) -> bool {
        self.data
            .lock()
            .map(|mut data| data.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut data) = self.data.lock() {
            data.clear();
        }
    }

    pub fn length(&self) -> usize {
        self.data.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .lock()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
