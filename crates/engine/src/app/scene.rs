use std::collections::HashMap;
use std::fmt::Display;

use thiserror::Error;

use super::rendering::RenderSurface;
use super::state::{GameState, StateData};

pub const PAUSED_MESSAGE: &str = "PAUSED";
pub const FAULT_MESSAGE: &str = "Something went wrong. Restart to continue.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SceneError {
    message: String,
}

impl SceneError {
    pub fn new(message: impl Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Request a routine hands back to the scheduler after a fixed step.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    None,
    Pause,
    ChangeState(GameState, Option<StateData>),
}

/// Read-only view of the state machine passed to routines.
#[derive(Debug, Clone, Copy)]
pub struct SceneContext<'a> {
    pub state: GameState,
    pub previous: GameState,
    pub data: Option<&'a StateData>,
}

/// Update/render pair bound to one [`GameState`].
pub trait StateScene {
    fn update(
        &mut self,
        _fixed_step_ms: f64,
        _context: &SceneContext<'_>,
    ) -> Result<SceneCommand, SceneError> {
        Ok(SceneCommand::None)
    }

    fn render(
        &mut self,
        surface: &mut dyn RenderSurface,
        delta_ms: f64,
        context: &SceneContext<'_>,
    ) -> Result<(), SceneError>;
}

/// Renders nothing beyond the clear the scheduler already issued.
#[derive(Debug, Default)]
pub struct IdleScene;

impl StateScene for IdleScene {
    fn render(
        &mut self,
        _surface: &mut dyn RenderSurface,
        _delta_ms: f64,
        _context: &SceneContext<'_>,
    ) -> Result<(), SceneError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PauseOverlayScene;

impl StateScene for PauseOverlayScene {
    fn render(
        &mut self,
        surface: &mut dyn RenderSurface,
        _delta_ms: f64,
        _context: &SceneContext<'_>,
    ) -> Result<(), SceneError> {
        surface.draw_message(PAUSED_MESSAGE);
        Ok(())
    }
}

/// Static fault screen. Also used as the render path of any state that has
/// no routine registered.
#[derive(Debug, Default)]
pub struct FaultScene;

impl StateScene for FaultScene {
    fn render(
        &mut self,
        surface: &mut dyn RenderSurface,
        _delta_ms: f64,
        context: &SceneContext<'_>,
    ) -> Result<(), SceneError> {
        match context.state {
            GameState::Error => surface.draw_message(FAULT_MESSAGE),
            unmapped => surface.draw_message(&format!("no render path for state {unmapped}")),
        }
        Ok(())
    }
}

/// State → routine dispatch. Paused and Error come pre-registered.
pub struct SceneTable {
    routines: HashMap<GameState, Box<dyn StateScene>>,
    fallback: FaultScene,
}

impl Default for SceneTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(GameState::Paused, Box::new(PauseOverlayScene));
        table.register(GameState::Error, Box::new(FaultScene));
        table
    }
}

impl SceneTable {
    pub fn empty() -> Self {
        Self {
            routines: HashMap::new(),
            fallback: FaultScene,
        }
    }

    pub fn register(
        &mut self,
        state: GameState,
        scene: Box<dyn StateScene>,
    ) -> Option<Box<dyn StateScene>> {
        self.routines.insert(state, scene)
    }

    pub fn with(mut self, state: GameState, scene: Box<dyn StateScene>) -> Self {
        self.register(state, scene);
        self
    }

    pub fn is_mapped(&self, state: GameState) -> bool {
        self.routines.contains_key(&state)
    }

    /// Unmapped states fall back to a no-op update.
    pub fn update(
        &mut self,
        fixed_step_ms: f64,
        context: &SceneContext<'_>,
    ) -> Result<SceneCommand, SceneError> {
        match self.routines.get_mut(&context.state) {
            Some(scene) => scene.update(fixed_step_ms, context),
            None => Ok(SceneCommand::None),
        }
    }

    /// Unmapped states fall back to the fault render.
    pub fn render(
        &mut self,
        surface: &mut dyn RenderSurface,
        delta_ms: f64,
        context: &SceneContext<'_>,
    ) -> Result<(), SceneError> {
        match self.routines.get_mut(&context.state) {
            Some(scene) => scene.render(surface, delta_ms, context),
            None => self.fallback.render(surface, delta_ms, context),
        }
    }

    pub fn clear(&mut self) {
        self.routines.clear();
    }
}
