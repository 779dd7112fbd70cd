use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use cadence_engine::{
    ConfigError, DefaultAction, FrameScheduler, GameState, HostEvent, HostEventKind, InputError,
    InputManager, TickOutcome,
};
use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{error, info, trace, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowBuilder};

use super::bootstrap::GameConfig;
use super::canvas::PixelCanvas;
use super::gameplay;
use super::host::{
    host_key_event, FrameRequests, HostClock, PixelsSurface, WinitEventSource, WinitFrameHost,
};

const PAUSE_ACTION: &str = "PAUSE";
const RESTART_ACTION: &str = "ACTION";

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("invalid loop config: {0}")]
    Scheduler(#[source] ConfigError),
    #[error("failed to set up input: {0}")]
    Input(#[from] InputError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub(crate) fn run_app(config: GameConfig) -> Result<(), AppError> {
    let GameConfig {
        window_title,
        loop_config,
        input: input_config,
    } = config;

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(window_title.clone())
            .with_inner_size(LogicalSize::new(
                loop_config.canvas_width as f64,
                loop_config.canvas_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let canvas = Rc::new(RefCell::new(
        PixelCanvas::new(
            Arc::clone(&window),
            loop_config.canvas_width,
            loop_config.canvas_height,
        )
        .map_err(AppError::CreateRenderer)?,
    ));

    let clock = HostClock::start();
    let source = WinitEventSource::new(clock);
    let mut input = InputManager::new(input_config, Box::new(source.clone()))?;
    input.initialize()?;
    let input = Rc::new(RefCell::new(input));

    let frames = FrameRequests::default();
    let mut scheduler = FrameScheduler::new(
        loop_config,
        Box::new(WinitFrameHost::new(
            clock,
            Arc::clone(&window),
            frames.clone(),
        )),
        Box::new(PixelsSurface::new(Rc::clone(&canvas), window_title)),
        gameplay::build_scene_table(Rc::clone(&input)),
    )
    .map_err(AppError::Scheduler)?;

    event_loop.set_control_flow(ControlFlow::Poll);
    scheduler.start();
    scheduler.change_state(GameState::Menu, None);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = canvas
                        .borrow_mut()
                        .resize_surface(new_size.width, new_size.height)
                    {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = canvas.borrow_mut().resize_surface(size.width, size.height)
                    {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::Focused(focused) => {
                    let (kind, host_event) = if focused {
                        (HostEventKind::Focus, HostEvent::Focus)
                    } else {
                        (HostEventKind::Blur, HostEvent::Blur)
                    };
                    if source.is_listening(kind) {
                        input.borrow_mut().handle_host_event(host_event);
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    handle_key_event(
                        &event,
                        clock.now_ms(),
                        &source,
                        &mut input.borrow_mut(),
                        &mut scheduler,
                        &window,
                    );
                }
                WindowEvent::RedrawRequested => {
                    if frames.take_pending().is_none() {
                        return;
                    }
                    match scheduler.tick(clock.now_ms()) {
                        TickOutcome::Halted => {
                            error!("loop_halted; press a restart key to recover");
                        }
                        TickOutcome::Faulted(fault) => {
                            trace!(error = %fault, "frame_recovered_to_error_state");
                        }
                        TickOutcome::Ignored | TickOutcome::Completed { .. } => {}
                    }
                    if let Err(error) = canvas.borrow().present() {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now_ms = clock.now_ms();
                for _ in source.take_due_intervals(now_ms) {
                    input.borrow_mut().run_cleanup(now_ms);
                }
                if frames.is_pending() {
                    window.request_redraw();
                }
            }
            Event::LoopExiting => {
                scheduler.destroy();
                input.borrow_mut().destroy();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn handle_key_event(
    key_event: &KeyEvent,
    now_ms: f64,
    source: &WinitEventSource,
    input: &mut InputManager,
    scheduler: &mut FrameScheduler,
    window: &Window,
) {
    let Some(host_event) = host_key_event(
        key_event.physical_key,
        key_event.state,
        key_event.repeat,
        now_ms,
    ) else {
        return;
    };
    let kind = match host_event {
        HostEvent::KeyDown { .. } => HostEventKind::KeyDown,
        _ => HostEventKind::KeyUp,
    };
    if !source.is_listening(kind) {
        return;
    }
    let action = input.handle_host_event(host_event.clone());

    let HostEvent::KeyDown {
        key, repeat: false, ..
    } = host_event
    else {
        return;
    };
    if action == DefaultAction::Allow && key_event.physical_key == PhysicalKey::Code(KeyCode::F11)
    {
        toggle_fullscreen(window);
        return;
    }

    let bound_to = |action: &str| {
        input
            .action_keys(action)
            .is_some_and(|keys| keys.contains(&key))
    };
    if scheduler.is_paused() && bound_to(PAUSE_ACTION) {
        // Presses made while paused must not leak into the first steps after resume.
        input.buffered_input(true);
        scheduler.resume();
    } else if bound_to(RESTART_ACTION)
        && (scheduler.is_halted() || scheduler.game_state() == GameState::Error)
    {
        input.buffered_input(true);
        scheduler.restart();
        scheduler.start();
        scheduler.change_state(GameState::Menu, None);
    }
}

fn toggle_fullscreen(window: &Window) {
    let next = match window.fullscreen() {
        Some(_) => None,
        None => Some(Fullscreen::Borderless(None)),
    };
    info!(fullscreen = next.is_some(), "fullscreen_toggled");
    window.set_fullscreen(next);
}
