use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use cadence_engine::{
    EventSource, FrameHost, HostEvent, HostEventKind, RenderSurface, TaskId, FAULT_MESSAGE,
    PAUSED_MESSAGE,
};
use tracing::{debug, trace};
use winit::event::ElementState;
use winit::keyboard::PhysicalKey;
use winit::window::Window;

use super::canvas::{draw_banner, fill, PixelCanvas, CLEAR_COLOR};

const PAUSED_BANNER_COLOR: [u8; 4] = [70, 60, 20, 230];
const FAULT_BANNER_COLOR: [u8; 4] = [110, 24, 24, 255];
const STATUS_BANNER_COLOR: [u8; 4] = [40, 44, 60, 255];

/// Milliseconds since the loop started; shared by the frame host and the
/// event source so every timestamp lives on one clock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostClock {
    epoch: Instant,
}

impl HostClock {
    pub(crate) fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub(crate) fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Default)]
struct FrameRequestState {
    next_id: u64,
    pending: Option<TaskId>,
}

/// The one outstanding redraw the scheduler asked for.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameRequests {
    inner: Rc<RefCell<FrameRequestState>>,
}

impl FrameRequests {
    pub(crate) fn is_pending(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    pub(crate) fn take_pending(&self) -> Option<TaskId> {
        self.inner.borrow_mut().pending.take()
    }

    fn issue(&self) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = TaskId(inner.next_id);
        inner.pending = Some(id);
        id
    }

    fn cancel(&self, id: TaskId) {
        let mut inner = self.inner.borrow_mut();
        if inner.pending == Some(id) {
            inner.pending = None;
        }
    }
}

pub(crate) struct WinitFrameHost {
    clock: HostClock,
    window: Arc<Window>,
    requests: FrameRequests,
}

impl WinitFrameHost {
    pub(crate) fn new(clock: HostClock, window: Arc<Window>, requests: FrameRequests) -> Self {
        Self {
            clock,
            window,
            requests,
        }
    }
}

impl FrameHost for WinitFrameHost {
    fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    fn request_frame(&mut self) -> TaskId {
        let id = self.requests.issue();
        self.window.request_redraw();
        id
    }

    fn cancel_frame(&mut self, id: TaskId) {
        self.requests.cancel(id);
    }
}

#[derive(Debug)]
struct Interval {
    period_ms: f64,
    next_due_ms: f64,
}

#[derive(Debug, Default)]
struct SourceState {
    next_id: u64,
    listeners: BTreeMap<TaskId, HostEventKind>,
    intervals: BTreeMap<TaskId, Interval>,
}

/// Listener and timer registry backed by the winit event loop. The loop asks
/// it which signals to forward and which intervals are due.
#[derive(Debug, Clone)]
pub(crate) struct WinitEventSource {
    clock: HostClock,
    inner: Rc<RefCell<SourceState>>,
}

impl WinitEventSource {
    pub(crate) fn new(clock: HostClock) -> Self {
        Self {
            clock,
            inner: Rc::default(),
        }
    }

    pub(crate) fn is_listening(&self, kind: HostEventKind) -> bool {
        self.inner
            .borrow()
            .listeners
            .values()
            .any(|listening| *listening == kind)
    }

    /// Ids of intervals whose deadline has passed; each is rescheduled one
    /// period after `now_ms`.
    pub(crate) fn take_due_intervals(&self, now_ms: f64) -> Vec<TaskId> {
        let mut inner = self.inner.borrow_mut();
        let mut due = Vec::new();
        for (id, interval) in inner.intervals.iter_mut() {
            if interval.next_due_ms <= now_ms {
                interval.next_due_ms = now_ms + interval.period_ms;
                due.push(*id);
            }
        }
        due
    }

    fn next_id(&self) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        TaskId(inner.next_id)
    }
}

impl EventSource for WinitEventSource {
    fn add_listener(&mut self, kind: HostEventKind) -> Result<TaskId, String> {
        let id = self.next_id();
        self.inner.borrow_mut().listeners.insert(id, kind);
        trace!(?kind, id = id.0, "host_listener_added");
        Ok(id)
    }

    fn remove_listener(&mut self, id: TaskId) {
        self.inner.borrow_mut().listeners.remove(&id);
    }

    fn start_interval(&mut self, period_ms: f64) -> TaskId {
        let id = self.next_id();
        let next_due_ms = self.clock.now_ms() + period_ms;
        self.inner.borrow_mut().intervals.insert(
            id,
            Interval {
                period_ms,
                next_due_ms,
            },
        );
        debug!(period_ms, id = id.0, "host_interval_started");
        id
    }

    fn cancel_interval(&mut self, id: TaskId) {
        self.inner.borrow_mut().intervals.remove(&id);
    }
}

/// Key identifiers follow winit's physical key code names (`KeyW`,
/// `ArrowUp`, `Space`), which line up with the built-in action mappings.
pub(crate) fn key_identifier(key: PhysicalKey) -> Option<String> {
    match key {
        PhysicalKey::Code(code) => Some(format!("{code:?}")),
        PhysicalKey::Unidentified(_) => None,
    }
}

pub(crate) fn host_key_event(
    key: PhysicalKey,
    state: ElementState,
    repeat: bool,
    timestamp_ms: f64,
) -> Option<HostEvent> {
    let key = key_identifier(key)?;
    Some(match state {
        ElementState::Pressed => HostEvent::KeyDown {
            key,
            timestamp_ms,
            repeat,
        },
        ElementState::Released => HostEvent::KeyUp { key, timestamp_ms },
    })
}

pub(crate) fn banner_color(message: &str) -> [u8; 4] {
    match message {
        PAUSED_MESSAGE => PAUSED_BANNER_COLOR,
        FAULT_MESSAGE => FAULT_BANNER_COLOR,
        _ => STATUS_BANNER_COLOR,
    }
}

/// Draws into the shared canvas; messages become a banner plus the window
/// title suffix.
pub(crate) struct PixelsSurface {
    canvas: Rc<RefCell<PixelCanvas>>,
    base_title: String,
    applied_title: Option<String>,
}

impl PixelsSurface {
    pub(crate) fn new(canvas: Rc<RefCell<PixelCanvas>>, base_title: String) -> Self {
        Self {
            canvas,
            base_title,
            applied_title: None,
        }
    }

    fn apply_title(&mut self, title: String) {
        if self.applied_title.as_ref() == Some(&title) {
            return;
        }
        self.canvas.borrow().window().set_title(&title);
        self.applied_title = Some(title);
    }
}

impl RenderSurface for PixelsSurface {
    fn size(&self) -> (u32, u32) {
        self.canvas.borrow().size()
    }

    fn clear(&mut self) {
        fill(self.canvas.borrow_mut().frame_mut(), CLEAR_COLOR);
        let title = self.base_title.clone();
        self.apply_title(title);
    }

    fn draw_message(&mut self, message: &str) {
        {
            let mut canvas = self.canvas.borrow_mut();
            let (width, height) = canvas.size();
            draw_banner(canvas.frame_mut(), width, height, banner_color(message));
        }
        let title = format!("{} | {message}", self.base_title);
        self.apply_title(title);
    }
}
