mod config;
mod events;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;
mod state;
mod task;

pub use config::ConfigError;
pub use events::{BusEvent, EventBus, ListenerError, ListenerResult, Subscription};
pub use input::{
    CleanupReport, DefaultAction, EventSource, HostEvent, HostEventKind, InputConfig, InputError,
    InputEvent, InputEventKind, InputEventType, InputManager, InputMetrics, InputNotification,
    InputState, ManualEventSource, DEFAULT_BUFFER_SIZE, DEFAULT_CLEANUP_INTERVAL_MS,
    DEFAULT_MAX_INPUTS_PER_WINDOW, DEFAULT_RATE_LIMIT_WINDOW_MS, DEFAULT_STALE_PRESS_THRESHOLD_MS,
    MAX_BUFFER_SIZE,
};
pub use loop_runner::{
    clamp_frame_delta, steps_due, FrameFault, FrameHost, FrameScheduler, FrameStats, LoopConfig,
    ManualFrameHost, TickOutcome, DEFAULT_FIXED_STEP_MS, DEFAULT_MAX_FRAME_DELTA_MS,
};
pub use metrics::{PerformanceMonitor, PerformanceSnapshot, DEFAULT_SAMPLE_WINDOW};
pub use rendering::{
    RecordingSurface, RenderSurface, SurfaceOp, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH,
};
pub use scene::{
    FaultScene, IdleScene, PauseOverlayScene, SceneCommand, SceneContext, SceneError, SceneTable,
    StateScene, FAULT_MESSAGE, PAUSED_MESSAGE,
};
pub use state::{GameState, GameStateManager, StateData, StateEntered, StateError};
pub use task::{PendingTask, TaskId};
