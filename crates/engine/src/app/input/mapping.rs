use std::collections::{BTreeMap, BTreeSet};

use super::config::is_valid_key_identifier;

const DEFAULT_MAPPINGS: &[(&str, &[&str])] = &[
    ("MOVE_UP", &["ArrowUp", "KeyW"]),
    ("MOVE_DOWN", &["ArrowDown", "KeyS"]),
    ("MOVE_LEFT", &["ArrowLeft", "KeyA"]),
    ("MOVE_RIGHT", &["ArrowRight", "KeyD"]),
    ("ACTION", &["Space", "Enter"]),
    ("PAUSE", &["Escape", "KeyP"]),
];

/// Action name → equivalent key identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ActionMap {
    actions: BTreeMap<String, BTreeSet<String>>,
}

impl ActionMap {
    pub(crate) fn with_defaults() -> Self {
        let mut map = Self::default();
        for (action, keys) in DEFAULT_MAPPINGS {
            map.set(action, keys.iter().copied());
        }
        map
    }

    /// Replaces the key set for `action`. Blank identifiers are skipped;
    /// returns false (and leaves the map untouched) if none remain.
    pub(crate) fn set<'a, I>(&mut self, action: &str, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys: BTreeSet<String> = keys
            .into_iter()
            .filter(|key| is_valid_key_identifier(key))
            .map(|key| key.trim().to_string())
            .collect();
        if keys.is_empty() {
            return false;
        }
        self.actions.insert(action.to_string(), keys);
        true
    }

    pub(crate) fn remove(&mut self, action: &str) -> bool {
        self.actions.remove(action).is_some()
    }

    pub(crate) fn keys_for(&self, action: &str) -> Option<&BTreeSet<String>> {
        self.actions.get(action)
    }

    pub(crate) fn is_mapped_key(&self, key: &str) -> bool {
        self.actions.values().any(|keys| keys.contains(key))
    }

    pub(crate) fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}
