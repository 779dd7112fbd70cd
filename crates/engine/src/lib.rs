pub mod app;

pub use app::{
    clamp_frame_delta, steps_due, BusEvent, CleanupReport, ConfigError, DefaultAction, EventBus,
    EventSource, FaultScene, FrameFault, FrameHost, FrameScheduler, FrameStats, GameState,
    GameStateManager, HostEvent, HostEventKind, IdleScene, InputConfig, InputError, InputEvent,
    InputEventKind, InputEventType, InputManager, InputMetrics, InputNotification, InputState,
    ListenerError, ListenerResult, LoopConfig, ManualEventSource, ManualFrameHost,
    PauseOverlayScene, PendingTask, PerformanceMonitor, PerformanceSnapshot, RecordingSurface,
    RenderSurface, SceneCommand, SceneContext, SceneError, SceneTable, StateData, StateEntered,
    StateError, StateScene, Subscription, SurfaceOp, TaskId, TickOutcome, DEFAULT_BUFFER_SIZE,
    DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_CLEANUP_INTERVAL_MS,
    DEFAULT_FIXED_STEP_MS, DEFAULT_MAX_FRAME_DELTA_MS, DEFAULT_MAX_INPUTS_PER_WINDOW,
    DEFAULT_RATE_LIMIT_WINDOW_MS, DEFAULT_SAMPLE_WINDOW, DEFAULT_STALE_PRESS_THRESHOLD_MS,
    FAULT_MESSAGE, MAX_BUFFER_SIZE, PAUSED_MESSAGE,
};
