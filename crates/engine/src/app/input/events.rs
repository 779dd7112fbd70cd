use serde::Serialize;

use crate::app::events::BusEvent;

use super::manager::InputState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputEventType {
    KeyDown,
    KeyUp,
}

/// One buffered key transition. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputEvent {
    kind: InputEventType,
    key: String,
    timestamp_ms: f64,
    repeat: bool,
}

impl InputEvent {
    pub fn key_down(key: &str, timestamp_ms: f64, repeat: bool) -> Self {
        Self {
            kind: InputEventType::KeyDown,
            key: key.to_string(),
            timestamp_ms,
            repeat,
        }
    }

    pub fn key_up(key: &str, timestamp_ms: f64) -> Self {
        Self {
            kind: InputEventType::KeyUp,
            key: key.to_string(),
            timestamp_ms,
            repeat: false,
        }
    }

    pub fn kind(&self) -> InputEventType {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEventKind {
    KeyDown,
    KeyUp,
    InputBufferFull,
    RateLimitExceeded,
    StateChanged,
    Initialized,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputNotification {
    KeyDown(InputEvent),
    KeyUp(InputEvent),
    BufferFull {
        evicted: InputEvent,
        capacity: usize,
    },
    RateLimitExceeded {
        key: String,
        timestamp_ms: f64,
        hits: u64,
    },
    StateChanged {
        from: InputState,
        to: InputState,
    },
    Initialized,
    Destroyed,
}

impl BusEvent for InputNotification {
    type Kind = InputEventKind;

    fn kind(&self) -> InputEventKind {
        match self {
            InputNotification::KeyDown(_) => InputEventKind::KeyDown,
            InputNotification::KeyUp(_) => InputEventKind::KeyUp,
            InputNotification::BufferFull { .. } => InputEventKind::InputBufferFull,
            InputNotification::RateLimitExceeded { .. } => InputEventKind::RateLimitExceeded,
            InputNotification::StateChanged { .. } => InputEventKind::StateChanged,
            InputNotification::Initialized => InputEventKind::Initialized,
            InputNotification::Destroyed => InputEventKind::Destroyed,
        }
    }
}

/// Raw signal delivered by the host platform.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    KeyDown {
        key: String,
        timestamp_ms: f64,
        repeat: bool,
    },
    KeyUp {
        key: String,
        timestamp_ms: f64,
    },
    Blur,
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    KeyDown,
    KeyUp,
    Blur,
    Focus,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 4] = [
        HostEventKind::KeyDown,
        HostEventKind::KeyUp,
        HostEventKind::Blur,
        HostEventKind::Focus,
    ];
}

/// Whether the host should skip its own handling of a key signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Allow,
    Suppress,
}
