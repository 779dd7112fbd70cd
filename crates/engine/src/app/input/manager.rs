use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::app::config::ConfigError;
use crate::app::events::{EventBus, ListenerResult, Subscription};
use crate::app::task::{PendingTask, TaskId};

use super::buffer::InputBuffer;
use super::config::InputConfig;
use super::events::{
    DefaultAction, HostEvent, HostEventKind, InputEvent, InputEventKind, InputNotification,
};
use super::keys::KeyStates;
use super::mapping::ActionMap;
use super::rate_limit::RateLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputState {
    Idle,
    Active,
    Buffering,
    RateLimited,
    Disabled,
}

impl fmt::Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputState::Idle => "idle",
            InputState::Active => "active",
            InputState::Buffering => "buffering",
            InputState::RateLimited => "rate_limited",
            InputState::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("input manager is already initialized")]
    AlreadyInitialized,
    #[error("event source cannot register listeners")]
    UnsupportedEventSource,
    #[error("failed to register {kind:?} listener: {reason}")]
    ListenerRegistration { kind: HostEventKind, reason: String },
    #[error("key mapping for action {action:?} has no valid key identifiers")]
    EmptyMapping { action: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Host-side registry the manager attaches to: listener registration for raw
/// key/focus signals plus a repeating timer for cleanup.
pub trait EventSource {
    fn can_register_listeners(&self) -> bool {
        true
    }

    fn add_listener(&mut self, kind: HostEventKind) -> Result<TaskId, String>;

    fn remove_listener(&mut self, id: TaskId);

    fn start_interval(&mut self, period_ms: f64) -> TaskId;

    fn cancel_interval(&mut self, id: TaskId);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InputMetrics {
    pub total_inputs: u64,
    pub rate_limit_hits: u64,
    pub buffer_overflows: u64,
    pub buffered_events: usize,
    pub pressed_keys: usize,
    pub rate_window_len: usize,
    pub state: InputState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub stale_press_times: usize,
    pub expired_window_entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    total_inputs: u64,
    rate_limit_hits: u64,
    buffer_overflows: u64,
}

pub struct InputManager {
    config: InputConfig,
    source: Box<dyn EventSource>,
    keys: KeyStates,
    buffer: InputBuffer,
    limiter: RateLimiter,
    mappings: ActionMap,
    bus: EventBus<InputNotification>,
    host_listeners: Vec<TaskId>,
    cleanup_task: PendingTask,
    initialized: bool,
    state: InputState,
    counters: Counters,
}

impl fmt::Debug for InputManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputManager")
            .field("state", &self.state)
            .field("initialized", &self.initialized)
            .field("buffered", &self.buffer.len())
            .field("pressed", &self.keys.pressed_count())
            .finish()
    }
}

impl InputManager {
    pub fn new(config: InputConfig, source: Box<dyn EventSource>) -> Result<Self, InputError> {
        config.validate()?;

        let mut mappings = ActionMap::with_defaults();
        for (action, keys) in &config.key_mappings {
            if !mappings.set(action, keys.iter().map(String::as_str)) {
                return Err(InputError::EmptyMapping {
                    action: action.clone(),
                });
            }
        }

        Ok(Self {
            buffer: InputBuffer::new(config.buffer_size),
            limiter: RateLimiter::new(config.rate_limit_window_ms, config.max_inputs_per_window),
            config,
            source,
            keys: KeyStates::default(),
            mappings,
            bus: EventBus::new("input"),
            host_listeners: Vec::new(),
            cleanup_task: PendingTask::default(),
            initialized: false,
            state: InputState::Idle,
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn initialize(&mut self) -> Result<(), InputError> {
        if self.initialized {
            return Err(InputError::AlreadyInitialized);
        }
        if !self.source.can_register_listeners() {
            return Err(InputError::UnsupportedEventSource);
        }

        for kind in HostEventKind::ALL {
            match self.source.add_listener(kind) {
                Ok(id) => self.host_listeners.push(id),
                Err(reason) => {
                    self.detach_listeners();
                    return Err(InputError::ListenerRegistration { kind, reason });
                }
            }
        }
        let cleanup = self.source.start_interval(self.config.cleanup_interval_ms);
        self.cleanup_task.arm(cleanup);
        self.initialized = true;

        info!(
            buffer_size = self.buffer.capacity(),
            rate_limiting = self.config.enable_rate_limiting,
            actions = self.mappings.actions().count(),
            "input_initialized"
        );
        self.set_state(InputState::Active);
        self.bus.emit(&InputNotification::Initialized);
        Ok(())
    }

    /// Safe to call repeatedly; only the first call after `initialize` acts.
    pub fn destroy(&mut self) {
        if !self.initialized {
            return;
        }

        self.detach_listeners();
        if let Some(cleanup) = self.cleanup_task.take() {
            self.source.cancel_interval(cleanup);
        }
        self.keys.clear();
        self.buffer.clear();
        self.limiter.clear();
        self.set_state(InputState::Disabled);
        self.bus.emit(&InputNotification::Destroyed);
        self.bus.clear();
        self.initialized = false;
        info!("input_destroyed");
    }

    /// Routes a raw host signal and tells the host whether to suppress its
    /// default handling.
    pub fn handle_host_event(&mut self, event: HostEvent) -> DefaultAction {
        match event {
            HostEvent::KeyDown {
                key,
                timestamp_ms,
                repeat,
            } => {
                self.on_key_down(&key, timestamp_ms, repeat);
                self.default_action_for(&key)
            }
            HostEvent::KeyUp { key, timestamp_ms } => {
                self.on_key_up(&key, timestamp_ms);
                self.default_action_for(&key)
            }
            HostEvent::Blur => {
                self.on_blur();
                DefaultAction::Allow
            }
            HostEvent::Focus => {
                self.on_focus();
                DefaultAction::Allow
            }
        }
    }

    pub fn default_action_for(&self, key: &str) -> DefaultAction {
        if self.mappings.is_mapped_key(key) {
            DefaultAction::Suppress
        } else {
            DefaultAction::Allow
        }
    }

    pub fn on_key_down(&mut self, key: &str, timestamp_ms: f64, repeat: bool) {
        if self.state == InputState::Disabled {
            return;
        }

        if self.config.enable_rate_limiting && !self.limiter.try_accept(timestamp_ms) {
            self.counters.rate_limit_hits += 1;
            warn!(
                key,
                timestamp_ms,
                hits = self.counters.rate_limit_hits,
                "input_rate_limited"
            );
            self.bus.emit(&InputNotification::RateLimitExceeded {
                key: key.to_string(),
                timestamp_ms,
                hits: self.counters.rate_limit_hits,
            });
            return;
        }

        if self.keys.press(key, timestamp_ms) {
            let event = InputEvent::key_down(key, timestamp_ms, repeat);
            self.enqueue(event.clone());
            trace!(key, timestamp_ms, "key_down");
            self.bus.emit(&InputNotification::KeyDown(event));
        }
        self.counters.total_inputs += 1;
        self.set_state(InputState::Active);
    }

    pub fn on_key_up(&mut self, key: &str, timestamp_ms: f64) {
        if self.state == InputState::Disabled {
            return;
        }

        if self.keys.release(key) {
            let event = InputEvent::key_up(key, timestamp_ms);
            self.enqueue(event.clone());
            trace!(key, timestamp_ms, "key_up");
            self.bus.emit(&InputNotification::KeyUp(event));
        }
        self.refresh_activity();
    }

    /// Focus loss makes release signals unreliable, so every key counts as
    /// released and the state drops to Idle. The one exception is a disabled
    /// manager: it stays Disabled, since only `set_enabled(true)` re-enables
    /// input.
    pub fn on_blur(&mut self) {
        self.keys.clear();
        debug!("input_blur_released_all_keys");
        if self.state != InputState::Disabled {
            self.set_state(InputState::Idle);
        }
    }

    pub fn on_focus(&mut self) {
        if self.state == InputState::Disabled {
            return;
        }
        self.set_state(InputState::Idle);
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.keys.is_pressed(key)
    }

    pub fn key_press_time(&self, key: &str) -> Option<f64> {
        self.keys.press_time(key)
    }

    pub fn is_action_pressed(&self, action: &str) -> bool {
        match self.mappings.keys_for(action) {
            Some(keys) => keys.iter().any(|key| self.keys.is_pressed(key)),
            None => {
                warn!(action, "unmapped_action_queried");
                false
            }
        }
    }

    pub fn action_keys(&self, action: &str) -> Option<&BTreeSet<String>> {
        self.mappings.keys_for(action)
    }

    /// Returns a copy of the buffer; with `consume` the buffer is drained.
    pub fn buffered_input(&mut self, consume: bool) -> Vec<InputEvent> {
        if !consume {
            return self.buffer.snapshot();
        }
        let events = self.buffer.drain();
        self.refresh_activity();
        events
    }

    pub fn add_key_mapping<'a, I>(&mut self, action: &str, keys: I) -> Result<(), InputError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.mappings.set(action, keys) {
            return Err(InputError::EmptyMapping {
                action: action.to_string(),
            });
        }
        debug!(action, "key_mapping_added");
        Ok(())
    }

    pub fn remove_key_mapping(&mut self, action: &str) -> bool {
        let removed = self.mappings.remove(action);
        if removed {
            debug!(action, "key_mapping_removed");
        }
        removed
    }

    pub fn subscribe<F>(&mut self, kind: InputEventKind, callback: F) -> Subscription
    where
        F: FnMut(&InputNotification) -> ListenerResult + 'static,
    {
        self.bus.subscribe(kind, callback)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.state == InputState::Disabled {
                self.set_state(InputState::Active);
            }
            return;
        }

        self.keys.clear();
        self.buffer.clear();
        self.set_state(InputState::Disabled);
    }

    /// Observed state. Stored Idle/Active/Disabled are refined by the rate
    /// limiter and by undrained events.
    pub fn state(&self) -> InputState {
        match self.state {
            InputState::Disabled => InputState::Disabled,
            _ if self.limiter.is_throttled() => InputState::RateLimited,
            InputState::Idle if !self.buffer.is_empty() => InputState::Buffering,
            stored => stored,
        }
    }

    pub fn metrics(&self) -> InputMetrics {
        InputMetrics {
            total_inputs: self.counters.total_inputs,
            rate_limit_hits: self.counters.rate_limit_hits,
            buffer_overflows: self.counters.buffer_overflows,
            buffered_events: self.buffer.len(),
            pressed_keys: self.keys.pressed_count(),
            rate_window_len: self.limiter.len(),
            state: self.state(),
        }
    }

    pub fn cleanup_task(&self) -> Option<TaskId> {
        self.cleanup_task.id()
    }

    /// Body of the periodic cleanup task. Does nothing once the task has been
    /// cancelled.
    pub fn run_cleanup(&mut self, now_ms: f64) -> CleanupReport {
        if !self.cleanup_task.is_armed() {
            return CleanupReport::default();
        }

        let report = CleanupReport {
            stale_press_times: self
                .keys
                .purge_stale_times(now_ms - self.config.stale_press_threshold_ms),
            expired_window_entries: self.limiter.prune(now_ms),
        };
        if report != CleanupReport::default() {
            debug!(
                stale_press_times = report.stale_press_times,
                expired_window_entries = report.expired_window_entries,
                "input_cleanup"
            );
        }
        report
    }

    fn enqueue(&mut self, event: InputEvent) {
        if let Some(evicted) = self.buffer.push(event) {
            self.counters.buffer_overflows += 1;
            debug!(
                capacity = self.buffer.capacity(),
                evicted_key = evicted.key(),
                "input_buffer_full"
            );
            self.bus.emit(&InputNotification::BufferFull {
                evicted,
                capacity: self.buffer.capacity(),
            });
        }
    }

    fn refresh_activity(&mut self) {
        if self.state == InputState::Disabled {
            return;
        }
        let next = if self.keys.any_pressed() {
            InputState::Active
        } else {
            InputState::Idle
        };
        self.set_state(next);
    }

    fn set_state(&mut self, next: InputState) {
        if self.state == next {
            return;
        }
        let from = self.state;
        self.state = next;
        trace!(%from, to = %next, "input_state_changed");
        self.bus
            .emit(&InputNotification::StateChanged { from, to: next });
    }

    fn detach_listeners(&mut self) {
        for id in self.host_listeners.drain(..) {
            self.source.remove_listener(id);
        }
    }
}

#[derive(Debug, Default)]
struct ManualSourceState {
    next_id: u64,
    listeners: Vec<(TaskId, HostEventKind)>,
    intervals: Vec<(TaskId, f64)>,
    refuse_listeners: bool,
    fail_on: Option<HostEventKind>,
}

/// In-memory [`EventSource`] for tests and headless hosts. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManualEventSource {
    inner: Rc<RefCell<ManualSourceState>>,
}

impl ManualEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that reports it cannot register listeners at all.
    pub fn incapable() -> Self {
        let source = Self::default();
        source.inner.borrow_mut().refuse_listeners = true;
        source
    }

    pub fn fail_registration_of(&self, kind: HostEventKind) {
        self.inner.borrow_mut().fail_on = Some(kind);
    }

    pub fn listener_kinds(&self) -> Vec<HostEventKind> {
        self.inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, kind)| *kind)
            .collect()
    }

    pub fn active_intervals(&self) -> Vec<(TaskId, f64)> {
        self.inner.borrow().intervals.clone()
    }

    fn next_id(&self) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        TaskId(inner.next_id)
    }
}

impl EventSource for ManualEventSource {
    fn can_register_listeners(&self) -> bool {
        !self.inner.borrow().refuse_listeners
    }

    fn add_listener(&mut self, kind: HostEventKind) -> Result<TaskId, String> {
        if self.inner.borrow().fail_on == Some(kind) {
            return Err(format!("{kind:?} listeners are unavailable"));
        }
        let id = self.next_id();
        self.inner.borrow_mut().listeners.push((id, kind));
        Ok(id)
    }

    fn remove_listener(&mut self, id: TaskId) {
        self.inner
            .borrow_mut()
            .listeners
            .retain(|(listener, _)| *listener != id);
    }

    fn start_interval(&mut self, period_ms: f64) -> TaskId {
        let id = self.next_id();
        self.inner.borrow_mut().intervals.push((id, period_ms));
        id
    }

    fn cancel_interval(&mut self, id: TaskId) {
        self.inner
            .borrow_mut()
            .intervals
            .retain(|(interval, _)| *interval != id);
    }
}
