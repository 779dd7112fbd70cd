mod buffer;
mod config;
mod events;
mod keys;
mod manager;
mod mapping;
mod rate_limit;

pub use config::{
    InputConfig, DEFAULT_BUFFER_SIZE, DEFAULT_CLEANUP_INTERVAL_MS, DEFAULT_MAX_INPUTS_PER_WINDOW,
    DEFAULT_RATE_LIMIT_WINDOW_MS, DEFAULT_STALE_PRESS_THRESHOLD_MS, MAX_BUFFER_SIZE,
};
pub use events::{
    DefaultAction, HostEvent, HostEventKind, InputEvent, InputEventKind, InputEventType,
    InputNotification,
};
pub use manager::{
    CleanupReport, EventSource, InputError, InputManager, InputMetrics, InputState,
    ManualEventSource,
};
