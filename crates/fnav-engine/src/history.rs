//! Session history
//!
//! `HistoryState` is the state object stored on every entry the navigator
//! creates. `HistoryManager` is an in-memory session history used by the
//! headless host.

use serde::{Deserialize, Serialize};

/// State attached to navigator-created history entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    pub path: String,
    pub spa: bool,
}

impl HistoryState {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), spa: true }
    }

    pub fn to_json(&self) -> String {
        // Two string/bool fields cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a stored state; foreign or malformed state yields `None`
    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// History entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub url: String,
    /// JSON-serialized state
    pub state: Option<String>,
}

impl HistoryEntry {
    pub fn spa_state(&self) -> Option<HistoryState> {
        self.state.as_deref().and_then(HistoryState::from_json)
    }
}

/// In-memory session history
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    current: usize,
}

impl HistoryManager {
    pub fn new(initial_url: &str) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: initial_url.to_string(),
                state: None,
            }],
            current: 0,
        }
    }

    /// Push a new entry, dropping forward history
    pub fn push_state(&mut self, state: Option<String>, url: String) {
        self.entries.truncate(self.current + 1);
        self.entries.push(HistoryEntry { url, state });
        self.current = self.entries.len() - 1;
    }

    pub fn replace_state(&mut self, state: Option<String>, url: String) {
        if let Some(entry) = self.entries.get_mut(self.current) {
            entry.url = url;
            entry.state = state;
        }
    }

    pub fn back(&mut self) -> Option<&HistoryEntry> {
        if self.current > 0 {
            self.current -= 1;
            Some(&self.entries[self.current])
        } else {
            None
        }
    }

    pub fn forward(&mut self) -> Option<&HistoryEntry> {
        if self.current + 1 < self.entries.len() {
            self.current += 1;
            Some(&self.entries[self.current])
        } else {
            None
        }
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.current]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}
