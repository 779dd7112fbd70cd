use std::cell::RefCell;
use std::rc::Rc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use super::config::{require_positive, ConfigError};
use super::events::{supervise, ListenerResult, Subscription};
use super::metrics::{PerformanceMonitor, PerformanceSnapshot, DEFAULT_SAMPLE_WINDOW};
use super::rendering::{RenderSurface, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
use super::scene::{SceneCommand, SceneContext, SceneTable};
use super::state::{GameState, GameStateManager, StateData, StateEntered, StateError};
use super::task::{PendingTask, TaskId};

pub const DEFAULT_FIXED_STEP_MS: f64 = 1000.0 / 60.0;
/// Lowest simulated rate the loop catches up to: 30 steps per second.
pub const DEFAULT_MAX_FRAME_DELTA_MS: f64 = 1000.0 / 30.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    pub fixed_step_ms: f64,
    pub max_frame_delta_ms: f64,
    pub perf_sample_window: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub metrics_log_interval_ms: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fixed_step_ms: DEFAULT_FIXED_STEP_MS,
            max_frame_delta_ms: DEFAULT_MAX_FRAME_DELTA_MS,
            perf_sample_window: DEFAULT_SAMPLE_WINDOW,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            metrics_log_interval_ms: 1000.0,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fixed_step_ms = require_positive("fixed_step_ms", self.fixed_step_ms)?;
        let max_frame_delta_ms = require_positive("max_frame_delta_ms", self.max_frame_delta_ms)?;
        if max_frame_delta_ms < fixed_step_ms {
            return Err(ConfigError::TooSmall {
                field: "max_frame_delta_ms",
                value: max_frame_delta_ms,
                min: fixed_step_ms,
            });
        }
        if self.perf_sample_window == 0 {
            return Err(ConfigError::TooSmall {
                field: "perf_sample_window",
                value: 0.0,
                min: 1.0,
            });
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::CanvasSize {
                width: self.canvas_width,
                height: self.canvas_height,
            });
        }
        require_positive("metrics_log_interval_ms", self.metrics_log_interval_ms)?;
        Ok(())
    }
}

/// Host side of the frame trigger: a clock plus one-shot frame callbacks.
/// The host answers each request by calling [`FrameScheduler::tick`] once.
pub trait FrameHost {
    fn now_ms(&self) -> f64;

    fn request_frame(&mut self) -> TaskId;

    fn cancel_frame(&mut self, id: TaskId);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameFault {
    #[error("update failed in state {state}: {message}")]
    Update { state: GameState, message: String },
    #[error("render failed in state {state}: {message}")]
    Render { state: GameState, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The scheduler was not running.
    Ignored,
    Completed { steps: u32 },
    /// A routine failed; the Error state rendered and the loop keeps going.
    Faulted(FrameFault),
    /// Even the fault render failed; no further frames are requested.
    Halted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub ticks: u64,
    pub steps: u64,
    /// Total clamped time fed into the accumulator.
    pub accumulated_ms: f64,
    pub accumulator_ms: f64,
}

#[derive(Debug, Default)]
struct MetricsInterval {
    start_ms: f64,
    steps: u32,
}

pub struct FrameScheduler {
    config: LoopConfig,
    host: Box<dyn FrameHost>,
    surface: Box<dyn RenderSurface>,
    scenes: SceneTable,
    states: GameStateManager,
    performance: PerformanceMonitor,
    frame_request: PendingTask,
    running: bool,
    paused: bool,
    halted: bool,
    destroyed: bool,
    last_time_ms: f64,
    accumulator_ms: f64,
    stats: FrameStats,
    metrics_interval: MetricsInterval,
}

impl FrameScheduler {
    pub fn new(
        config: LoopConfig,
        host: Box<dyn FrameHost>,
        surface: Box<dyn RenderSurface>,
        scenes: SceneTable,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (width, height) = surface.size();
        if (width, height) != (config.canvas_width, config.canvas_height) {
            warn!(
                surface_width = width,
                surface_height = height,
                canvas_width = config.canvas_width,
                canvas_height = config.canvas_height,
                "surface_size_mismatch"
            );
        }
        let performance = PerformanceMonitor::new(config.perf_sample_window);
        Ok(Self {
            config,
            host,
            surface,
            scenes,
            states: GameStateManager::new(),
            performance,
            frame_request: PendingTask::default(),
            running: false,
            paused: false,
            halted: false,
            destroyed: false,
            last_time_ms: 0.0,
            accumulator_ms: 0.0,
            stats: FrameStats::default(),
            metrics_interval: MetricsInterval::default(),
        })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn has_pending_frame(&self) -> bool {
        self.frame_request.is_armed()
    }

    pub fn game_state(&self) -> GameState {
        self.states.current()
    }

    pub fn state_data(&self) -> Option<&StateData> {
        self.states.state_data()
    }

    pub fn performance_metrics(&self) -> PerformanceSnapshot {
        self.performance.metrics()
    }

    pub fn frame_stats(&self) -> FrameStats {
        FrameStats {
            accumulator_ms: self.accumulator_ms,
            ..self.stats
        }
    }

    /// Entering Paused while running pauses the loop; leaving Paused resumes
    /// it from a fresh timing origin.
    pub fn change_state(&mut self, state: GameState, data: Option<StateData>) {
        self.enter_state(state, data);
    }

    pub fn change_state_named(
        &mut self,
        name: &str,
        data: Option<StateData>,
    ) -> Result<(), StateError> {
        let state = name.parse::<GameState>()?;
        self.enter_state(state, data);
        Ok(())
    }

    pub fn on_state_enter<F>(&mut self, state: GameState, callback: F) -> Subscription
    where
        F: FnMut(&StateEntered) -> ListenerResult + 'static,
    {
        self.states.on_enter(state, callback)
    }

    pub fn start(&mut self) {
        if self.destroyed {
            warn!("start_ignored_destroyed");
            return;
        }
        if self.running {
            warn!("start_ignored_already_running");
            return;
        }
        if self.halted {
            warn!("start_ignored_halted; restart required");
            return;
        }

        self.running = true;
        self.paused = false;
        self.accumulator_ms = 0.0;
        self.last_time_ms = self.host.now_ms();
        self.metrics_interval = MetricsInterval {
            start_ms: self.last_time_ms,
            steps: 0,
        };
        info!(
            fixed_step_ms = self.config.fixed_step_ms,
            max_frame_delta_ms = self.config.max_frame_delta_ms,
            origin_ms = self.last_time_ms,
            "loop_started"
        );
        self.states.change_state(GameState::Playing, None);
        self.request_next_frame();
    }

    pub fn tick(&mut self, current_time_ms: f64) -> TickOutcome {
        if !self.running {
            trace!(current_time_ms, "tick_ignored_not_running");
            return TickOutcome::Ignored;
        }
        self.frame_request.take();

        let delta_ms = clamp_frame_delta(
            current_time_ms - self.last_time_ms,
            self.config.max_frame_delta_ms,
        );
        self.last_time_ms = current_time_ms;
        if delta_ms > 0.0 {
            self.performance.record_frame(delta_ms);
        }
        self.stats.ticks = self.stats.ticks.saturating_add(1);

        match self.run_frame(delta_ms) {
            Ok(steps) => {
                self.maybe_log_metrics(current_time_ms, steps);
                if self.running {
                    self.request_next_frame();
                }
                TickOutcome::Completed { steps }
            }
            Err(fault) => self.recover_from_fault(fault, delta_ms),
        }
    }

    pub fn pause(&mut self) {
        if !self.running || self.paused {
            return;
        }
        self.enter_state(GameState::Paused, None);
    }

    pub fn resume(&mut self) {
        if !self.running || !self.paused {
            return;
        }
        self.enter_state(GameState::Playing, None);
    }

    pub fn stop(&mut self) {
        if let Some(id) = self.frame_request.take() {
            self.host.cancel_frame(id);
        }
        self.running = false;
        self.paused = false;
        info!("loop_stopped");
        self.states.change_state(GameState::Menu, None);
    }

    pub fn restart(&mut self) {
        self.stop();
        self.performance.reset();
        self.halted = false;
        self.accumulator_ms = 0.0;
        self.stats = FrameStats::default();
        info!("loop_restarted");
    }

    /// Stops the loop and drops every routine and state listener. A destroyed
    /// scheduler never starts again.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.scenes.clear();
        self.states.clear_listeners();
        self.destroyed = true;
        info!("loop_destroyed");
    }

    fn run_frame(&mut self, delta_ms: f64) -> Result<u32, FrameFault> {
        let fixed_step_ms = self.config.fixed_step_ms;
        let mut steps = 0u32;

        if !self.paused {
            self.accumulator_ms += delta_ms;
            self.stats.accumulated_ms += delta_ms;

            for _ in 0..steps_due(self.accumulator_ms, fixed_step_ms) {
                if self.paused || !self.running {
                    break;
                }
                self.accumulator_ms -= fixed_step_ms;
                self.run_step(fixed_step_ms)?;
                self.stats.steps = self.stats.steps.saturating_add(1);
                steps += 1;
            }
        }

        self.render_frame(delta_ms)?;
        Ok(steps)
    }

    fn run_step(&mut self, fixed_step_ms: f64) -> Result<(), FrameFault> {
        let state = self.states.current();
        let context = SceneContext {
            state,
            previous: self.states.previous(),
            data: self.states.state_data(),
        };
        let scenes = &mut self.scenes;
        let command = supervise(|| scenes.update(fixed_step_ms, &context))
            .map_err(|message| FrameFault::Update { state, message })?;
        self.apply_command(command);
        Ok(())
    }

    fn render_frame(&mut self, delta_ms: f64) -> Result<(), FrameFault> {
        let state = self.states.current();
        self.surface.clear();
        let context = SceneContext {
            state,
            previous: self.states.previous(),
            data: self.states.state_data(),
        };
        let (scenes, surface) = (&mut self.scenes, &mut self.surface);
        supervise(|| scenes.render(&mut **surface, delta_ms, &context))
            .map_err(|message| FrameFault::Render { state, message })
    }

    fn apply_command(&mut self, command: SceneCommand) {
        match command {
            SceneCommand::None => {}
            SceneCommand::Pause => self.pause(),
            SceneCommand::ChangeState(state, data) => self.enter_state(state, data),
        }
    }

    /// Single path for state changes so the paused flag always mirrors the
    /// Paused state. Pausing drops unspent time; resuming restarts the clock.
    fn enter_state(&mut self, state: GameState, data: Option<StateData>) {
        let was_paused = self.paused;
        self.paused = self.running && state == GameState::Paused;
        if self.paused && !was_paused {
            self.accumulator_ms = 0.0;
            info!("loop_paused");
        } else if was_paused && !self.paused {
            self.accumulator_ms = 0.0;
            self.last_time_ms = self.host.now_ms();
            info!(origin_ms = self.last_time_ms, "loop_resumed");
        }
        self.states.change_state(state, data);
    }

    fn recover_from_fault(&mut self, fault: FrameFault, delta_ms: f64) -> TickOutcome {
        error!(error = %fault, "frame_fault");
        self.enter_state(GameState::Error, Some(StateData::Fault(fault.clone())));

        match self.render_frame(delta_ms) {
            Ok(()) => {
                self.request_next_frame();
                TickOutcome::Faulted(fault)
            }
            Err(render_fault) => {
                error!(error = %render_fault, "fault_render_failed; loop halted");
                self.running = false;
                self.paused = false;
                self.halted = true;
                TickOutcome::Halted
            }
        }
    }

    fn request_next_frame(&mut self) {
        if let Some(stale) = self.frame_request.take() {
            self.host.cancel_frame(stale);
        }
        let id = self.host.request_frame();
        self.frame_request.arm(id);
    }

    fn maybe_log_metrics(&mut self, now_ms: f64, steps: u32) {
        self.metrics_interval.steps = self.metrics_interval.steps.saturating_add(steps);
        if now_ms - self.metrics_interval.start_ms < self.config.metrics_log_interval_ms {
            return;
        }

        let snapshot = self.performance.metrics();
        debug!(
            average_fps = snapshot.average_fps,
            min_fps = snapshot.min_fps,
            max_fps = snapshot.max_fps,
            sample_count = snapshot.sample_count,
            steps = self.metrics_interval.steps,
            state = %self.states.current(),
            "loop_metrics"
        );
        self.metrics_interval = MetricsInterval {
            start_ms: now_ms,
            steps: 0,
        };
    }
}

/// Number of whole fixed steps the accumulator can pay for.
pub fn steps_due(mut accumulator_ms: f64, fixed_step_ms: f64) -> u32 {
    let mut steps = 0u32;
    while accumulator_ms >= fixed_step_ms {
        accumulator_ms -= fixed_step_ms;
        steps = steps.saturating_add(1);
    }
    steps
}

/// Negative gaps (clock skew) count as zero elapsed time.
pub fn clamp_frame_delta(raw_delta_ms: f64, max_frame_delta_ms: f64) -> f64 {
    if raw_delta_ms.is_nan() {
        return 0.0;
    }
    raw_delta_ms.clamp(0.0, max_frame_delta_ms)
}

#[derive(Debug, Default)]
struct ManualHostState {
    now_ms: f64,
    next_id: u64,
    outstanding: Vec<TaskId>,
    cancelled: Vec<TaskId>,
    requested_total: u64,
}

/// Deterministic [`FrameHost`] driven by hand. Clones share one clock and one
/// request queue.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameHost {
    inner: Rc<RefCell<ManualHostState>>,
}

impl ManualFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_now(&self, now_ms: f64) {
        self.inner.borrow_mut().now_ms = now_ms;
    }

    /// Fires the oldest outstanding frame request, if any.
    pub fn take_request(&self) -> Option<TaskId> {
        let mut inner = self.inner.borrow_mut();
        if inner.outstanding.is_empty() {
            None
        } else {
            Some(inner.outstanding.remove(0))
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inner.borrow().outstanding.len()
    }

    pub fn cancelled(&self) -> Vec<TaskId> {
        self.inner.borrow().cancelled.clone()
    }

    pub fn requested_total(&self) -> u64 {
        self.inner.borrow().requested_total
    }
}

impl FrameHost for ManualFrameHost {
    fn now_ms(&self) -> f64 {
        self.inner.borrow().now_ms
    }

    fn request_frame(&mut self) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = TaskId(inner.next_id);
        inner.outstanding.push(id);
        inner.requested_total += 1;
        id
    }

    fn cancel_frame(&mut self, id: TaskId) {
        let mut inner = self.inner.borrow_mut();
        inner.outstanding.retain(|pending| *pending != id);
        inner.cancelled.push(id);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::app::rendering::{RecordingSurface, SurfaceOp};
    use crate::app::scene::{SceneError, StateScene, FAULT_MESSAGE, PAUSED_MESSAGE};

    #[derive(Default)]
    struct Counters {
        updates: Cell<u32>,
        renders: Cell<u32>,
        last_render_delta: Cell<f64>,
    }

    struct CountingScene {
        counters: Rc<Counters>,
        fail_update: bool,
        fail_render: bool,
    }

    impl StateScene for CountingScene {
        fn update(
            &mut self,
            fixed_step_ms: f64,
            _context: &SceneContext<'_>,
        ) -> Result<SceneCommand, SceneError> {
            assert!((fixed_step_ms - DEFAULT_FIXED_STEP_MS).abs() < 1e-9);
            self.counters.updates.set(self.counters.updates.get() + 1);
            if self.fail_update {
                return Err(SceneError::new("update exploded"));
            }
            Ok(SceneCommand::None)
        }

        fn render(
            &mut self,
            _surface: &mut dyn RenderSurface,
            delta_ms: f64,
            _context: &SceneContext<'_>,
        ) -> Result<(), SceneError> {
            self.counters.renders.set(self.counters.renders.get() + 1);
            self.counters.last_render_delta.set(delta_ms);
            if self.fail_render {
                return Err(SceneError::new("render exploded"));
            }
            Ok(())
        }
    }

    struct BrokenFaultScene;

    impl StateScene for BrokenFaultScene {
        fn render(
            &mut self,
            _surface: &mut dyn RenderSurface,
            _delta_ms: f64,
            _context: &SceneContext<'_>,
        ) -> Result<(), SceneError> {
            Err(SceneError::new("fault screen broken"))
        }
    }

    struct Harness {
        scheduler: FrameScheduler,
        host: ManualFrameHost,
        surface: RecordingSurface,
        counters: Rc<Counters>,
    }

    fn harness_with(fail_update: bool, fail_render: bool, scenes: SceneTable) -> Harness {
        let host = ManualFrameHost::new();
        let surface = RecordingSurface::default();
        let counters = Rc::new(Counters::default());
        let scenes = scenes.with(
            GameState::Playing,
            Box::new(CountingScene {
                counters: Rc::clone(&counters),
                fail_update,
                fail_render,
            }),
        );
        let scheduler = FrameScheduler::new(
            LoopConfig::default(),
            Box::new(host.clone()),
            Box::new(surface.clone()),
            scenes,
        )
        .expect("scheduler");
        Harness {
            scheduler,
            host,
            surface,
            counters,
        }
    }

    fn harness() -> Harness {
        harness_with(false, false, SceneTable::default())
    }

    impl Harness {
        fn fire(&mut self, time_ms: f64) -> TickOutcome {
            self.host.set_now(time_ms);
            assert!(self.host.take_request().is_some(), "frame was requested");
            self.scheduler.tick(time_ms)
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_gap() {
        assert_eq!(
            clamp_frame_delta(500.0, DEFAULT_MAX_FRAME_DELTA_MS),
            DEFAULT_MAX_FRAME_DELTA_MS
        );
        assert_eq!(clamp_frame_delta(-3.0, DEFAULT_MAX_FRAME_DELTA_MS), 0.0);
        assert_eq!(clamp_frame_delta(f64::NAN, DEFAULT_MAX_FRAME_DELTA_MS), 0.0);
    }

    #[test]
    fn steps_due_counts_whole_steps() {
        assert_eq!(steps_due(48.0, 16.0), 3);
        assert_eq!(steps_due(15.9, 16.0), 0);
        assert_eq!(steps_due(DEFAULT_MAX_FRAME_DELTA_MS, DEFAULT_FIXED_STEP_MS), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LoopConfig {
            max_frame_delta_ms: 5.0,
            ..LoopConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooSmall {
                field: "max_frame_delta_ms",
                ..
            })
        ));

        let config = LoopConfig {
            fixed_step_ms: 0.0,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn start_enters_playing_and_requests_one_frame() {
        let mut h = harness();
        h.host.set_now(100.0);
        h.scheduler.start();

        assert!(h.scheduler.is_running());
        assert_eq!(h.scheduler.game_state(), GameState::Playing);
        assert_eq!(h.host.outstanding(), 1);

        h.scheduler.start();
        assert_eq!(h.host.outstanding(), 1);
    }

    #[test]
    fn tick_is_ignored_when_not_running() {
        let mut h = harness();
        assert_eq!(h.scheduler.tick(10.0), TickOutcome::Ignored);
        assert_eq!(h.counters.renders.get(), 0);
        assert_eq!(h.host.outstanding(), 0);
    }

    #[test]
    fn large_gap_is_clamped_to_two_steps() {
        let mut h = harness();
        h.scheduler.start();

        assert_eq!(h.fire(0.0), TickOutcome::Completed { steps: 0 });
        assert_eq!(h.fire(500.0), TickOutcome::Completed { steps: 2 });

        assert_eq!(h.counters.updates.get(), 2);
        assert_eq!(h.counters.renders.get(), 2);
        assert!((h.counters.last_render_delta.get() - DEFAULT_MAX_FRAME_DELTA_MS).abs() < 1e-9);
        assert!(h.scheduler.frame_stats().accumulator_ms.abs() < 1e-9);
        assert_eq!(h.host.outstanding(), 1);
    }

    #[test]
    fn short_frames_accumulate_until_a_step_is_due() {
        let mut h = harness();
        h.scheduler.start();

        assert_eq!(h.fire(10.0), TickOutcome::Completed { steps: 0 });
        assert_eq!(h.fire(20.0), TickOutcome::Completed { steps: 1 });
        let stats = h.scheduler.frame_stats();
        assert!((stats.accumulator_ms - (20.0 - DEFAULT_FIXED_STEP_MS)).abs() < 1e-9);
        assert_eq!(stats.steps, 1);
    }

    #[test]
    fn pause_freezes_simulation_but_renders_overlay() {
        let mut h = harness();
        h.scheduler.start();
        h.fire(0.0);
        h.scheduler.pause();
        assert_eq!(h.scheduler.game_state(), GameState::Paused);
        h.surface.take_ops();

        assert_eq!(h.fire(30.0), TickOutcome::Completed { steps: 0 });

        assert_eq!(h.counters.updates.get(), 0);
        assert_eq!(
            h.surface.ops(),
            vec![
                SurfaceOp::Clear,
                SurfaceOp::Message(PAUSED_MESSAGE.to_string())
            ]
        );
    }

    #[test]
    fn resume_resets_timing_origin() {
        let mut h = harness();
        h.scheduler.start();
        h.fire(0.0);
        h.scheduler.pause();
        h.fire(16.0);

        h.host.set_now(10_000.0);
        h.scheduler.resume();
        assert_eq!(h.scheduler.game_state(), GameState::Playing);

        assert_eq!(h.fire(10_005.0), TickOutcome::Completed { steps: 0 });
        assert!((h.scheduler.performance_metrics().last_frame_ms - 5.0).abs() < 1e-9);
    }

    #[test]
    fn pause_and_resume_are_noops_when_stopped() {
        let mut h = harness();
        h.scheduler.pause();
        h.scheduler.resume();

        assert!(!h.scheduler.is_paused());
        assert_eq!(h.scheduler.game_state(), GameState::Loading);
    }

    #[test]
    fn stop_cancels_pending_frame_and_enters_menu() {
        let mut h = harness();
        h.scheduler.start();
        h.scheduler.stop();

        assert!(!h.scheduler.is_running());
        assert_eq!(h.host.outstanding(), 0);
        assert_eq!(h.host.cancelled().len(), 1);
        assert_eq!(h.scheduler.game_state(), GameState::Menu);
        assert_eq!(h.scheduler.tick(50.0), TickOutcome::Ignored);
    }

    #[test]
    fn update_fault_enters_error_state_and_keeps_rendering() {
        let mut h = harness_with(true, false, SceneTable::default());
        h.scheduler.start();
        h.fire(0.0);

        let outcome = h.fire(20.0);

        let expected = FrameFault::Update {
            state: GameState::Playing,
            message: "update exploded".to_string(),
        };
        assert_eq!(outcome, TickOutcome::Faulted(expected.clone()));
        assert_eq!(h.scheduler.game_state(), GameState::Error);
        assert_eq!(
            h.scheduler.state_data().and_then(StateData::as_fault),
            Some(&expected)
        );
        assert_eq!(h.surface.last_message().as_deref(), Some(FAULT_MESSAGE));
        assert_eq!(h.host.outstanding(), 1);
    }

    #[test]
    fn failing_fault_render_halts_the_loop() {
        let scenes = SceneTable::default().with(GameState::Error, Box::new(BrokenFaultScene));
        let mut h = harness_with(false, true, scenes);
        h.scheduler.start();

        assert_eq!(h.fire(0.0), TickOutcome::Halted);
        assert!(h.scheduler.is_halted());
        assert_eq!(h.host.outstanding(), 0);

        h.scheduler.start();
        assert!(!h.scheduler.is_running());

        h.scheduler.restart();
        assert_eq!(h.scheduler.game_state(), GameState::Menu);
        h.scheduler.start();
        assert!(h.scheduler.is_running());
    }

    #[test]
    fn restart_resets_performance_monitor() {
        let mut h = harness();
        h.scheduler.start();
        h.fire(0.0);
        h.fire(16.0);
        assert_eq!(h.scheduler.performance_metrics().sample_count, 1);

        h.scheduler.restart();

        assert_eq!(h.scheduler.performance_metrics().sample_count, 0);
        assert_eq!(h.scheduler.game_state(), GameState::Menu);
        assert!(!h.scheduler.is_running());
    }

    #[test]
    fn destroy_prevents_future_starts() {
        let mut h = harness();
        h.scheduler.start();
        h.scheduler.destroy();

        assert_eq!(h.host.outstanding(), 0);
        h.scheduler.start();
        assert!(!h.scheduler.is_running());
    }

    #[test]
    fn scene_pause_command_stops_remaining_steps() {
        struct PausingScene(Rc<Cell<u32>>);

        impl StateScene for PausingScene {
            fn update(
                &mut self,
                _fixed_step_ms: f64,
                _context: &SceneContext<'_>,
            ) -> Result<SceneCommand, SceneError> {
                self.0.set(self.0.get() + 1);
                Ok(SceneCommand::Pause)
            }

            fn render(
                &mut self,
                _surface: &mut dyn RenderSurface,
                _delta_ms: f64,
                _context: &SceneContext<'_>,
            ) -> Result<(), SceneError> {
                Ok(())
            }
        }

        let host = ManualFrameHost::new();
        let updates = Rc::new(Cell::new(0));
        let mut scheduler = FrameScheduler::new(
            LoopConfig::default(),
            Box::new(host.clone()),
            Box::new(RecordingSurface::default()),
            SceneTable::default()
                .with(GameState::Playing, Box::new(PausingScene(Rc::clone(&updates)))),
        )
        .expect("scheduler");
        scheduler.start();
        host.take_request();

        assert_eq!(scheduler.tick(33.0), TickOutcome::Completed { steps: 1 });
        assert_eq!(updates.get(), 1);
        assert_eq!(scheduler.game_state(), GameState::Paused);
    }

    struct CommandScene {
        command: SceneCommand,
        repeat: bool,
    }

    impl StateScene for CommandScene {
        fn update(
            &mut self,
            _fixed_step_ms: f64,
            _context: &SceneContext<'_>,
        ) -> Result<SceneCommand, SceneError> {
            if self.repeat {
                return Ok(self.command.clone());
            }
            Ok(std::mem::replace(&mut self.command, SceneCommand::None))
        }

        fn render(
            &mut self,
            _surface: &mut dyn RenderSurface,
            _delta_ms: f64,
            _context: &SceneContext<'_>,
        ) -> Result<(), SceneError> {
            Ok(())
        }
    }

    fn command_scheduler(
        command: SceneCommand,
        repeat: bool,
    ) -> (FrameScheduler, ManualFrameHost) {
        let host = ManualFrameHost::new();
        let scheduler = FrameScheduler::new(
            LoopConfig::default(),
            Box::new(host.clone()),
            Box::new(RecordingSurface::default()),
            SceneTable::default().with(
                GameState::Playing,
                Box::new(CommandScene { command, repeat }),
            ),
        )
        .expect("scheduler");
        (scheduler, host)
    }

    #[test]
    fn routine_change_to_paused_pauses_the_loop() {
        let (mut scheduler, _host) =
            command_scheduler(SceneCommand::ChangeState(GameState::Paused, None), false);
        scheduler.start();

        assert_eq!(scheduler.tick(20.0), TickOutcome::Completed { steps: 1 });
        assert_eq!(scheduler.game_state(), GameState::Paused);
        assert!(scheduler.is_paused());
        assert_eq!(scheduler.tick(60.0), TickOutcome::Completed { steps: 0 });

        scheduler.resume();

        assert_eq!(scheduler.game_state(), GameState::Playing);
        assert!(!scheduler.is_paused());
    }

    #[test]
    fn changing_state_directly_keeps_pause_flag_in_step() {
        let mut h = harness();
        h.scheduler.start();
        h.fire(0.0);

        h.scheduler.change_state(GameState::Paused, None);
        assert!(h.scheduler.is_paused());
        assert_eq!(h.fire(30.0), TickOutcome::Completed { steps: 0 });

        h.host.set_now(500.0);
        h.scheduler.change_state(GameState::Playing, None);
        assert!(!h.scheduler.is_paused());
        assert_eq!(h.fire(510.0), TickOutcome::Completed { steps: 0 });
        assert_eq!(h.fire(530.0), TickOutcome::Completed { steps: 1 });
        assert_eq!(h.counters.updates.get(), 1);
    }

    #[test]
    fn pause_drops_unspent_catch_up_time() {
        let (mut scheduler, host) = command_scheduler(SceneCommand::Pause, true);
        scheduler.start();

        assert_eq!(scheduler.tick(500.0), TickOutcome::Completed { steps: 1 });
        assert!(scheduler.frame_stats().accumulator_ms < DEFAULT_FIXED_STEP_MS);

        let mut now = 500.0;
        for _ in 0..5 {
            host.set_now(now);
            scheduler.resume();
            now += DEFAULT_MAX_FRAME_DELTA_MS;
            assert_eq!(scheduler.tick(now), TickOutcome::Completed { steps: 1 });
            let accumulator = scheduler.frame_stats().accumulator_ms;
            assert!((0.0..DEFAULT_FIXED_STEP_MS).contains(&accumulator));
        }
    }

    #[test]
    fn restart_enters_menu_once() {
        let mut h = harness();
        let entries = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&entries);
        let _menu = h.scheduler.on_state_enter(GameState::Menu, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        h.scheduler.start();

        h.scheduler.restart();

        assert_eq!(entries.get(), 1);
        assert_eq!(h.scheduler.game_state(), GameState::Menu);
    }
}
