use std::collections::{HashMap, HashSet};

/// Pressed flags plus the timestamp of each key's initial press.
#[derive(Debug, Default)]
pub(crate) struct KeyStates {
    pressed: HashSet<String>,
    press_times: HashMap<String, f64>,
}

impl KeyStates {
    /// Marks `key` pressed. Returns true only on the unpressed → pressed edge,
    /// which is also the only time the press timestamp is written.
    pub(crate) fn press(&mut self, key: &str, timestamp_ms: f64) -> bool {
        if self.pressed.contains(key) {
            return false;
        }
        self.pressed.insert(key.to_string());
        self.press_times.insert(key.to_string(), timestamp_ms);
        true
    }

    /// Returns whether the key had been pressed.
    pub(crate) fn release(&mut self, key: &str) -> bool {
        self.press_times.remove(key);
        self.pressed.remove(key)
    }

    pub(crate) fn clear(&mut self) {
        self.pressed.clear();
        self.press_times.clear();
    }

    pub(crate) fn is_pressed(&self, key: &str) -> bool {
        self.pressed.contains(key)
    }

    pub(crate) fn press_time(&self, key: &str) -> Option<f64> {
        self.press_times.get(key).copied()
    }

    pub(crate) fn any_pressed(&self) -> bool {
        !self.pressed.is_empty()
    }

    pub(crate) fn pressed_count(&self) -> usize {
        self.pressed.len()
    }

    /// Drops press timestamps recorded before `cutoff_ms`; pressed flags stay.
    pub(crate) fn purge_stale_times(&mut self, cutoff_ms: f64) -> usize {
        let before = self.press_times.len();
        self.press_times.retain(|_, pressed_at| *pressed_at >= cutoff_ms);
        before - self.press_times.len()
    }
}
