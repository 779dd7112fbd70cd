use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use cadence_engine::{
    GameState, InputEventType, InputManager, RenderSurface, SceneCommand, SceneContext,
    SceneError, SceneTable, StateScene,
};
use tracing::{debug, info};

const MOVE_SPEED_UNITS_PER_SECOND: f64 = 6.0;
const PAUSE_ACTION: &str = "PAUSE";
const ACTION: &str = "ACTION";

pub(crate) fn build_scene_table(input: Rc<RefCell<InputManager>>) -> SceneTable {
    SceneTable::default()
        .with(GameState::Menu, Box::new(MenuScene::new(Rc::clone(&input))))
        .with(GameState::Playing, Box::new(PlayingScene::new(input)))
}

fn pressed_edge(input: &mut InputManager, action: &str) -> bool {
    input.buffered_input(false).iter().any(|event| {
        event.kind() == InputEventType::KeyDown
            && input
                .action_keys(action)
                .is_some_and(|keys| keys.contains(event.key()))
    })
}

fn borrow_input(input: &RefCell<InputManager>) -> Result<RefMut<'_, InputManager>, SceneError> {
    input
        .try_borrow_mut()
        .map_err(|error| SceneError::new(format!("input manager busy: {error}")))
}

pub(crate) struct MenuScene {
    input: Rc<RefCell<InputManager>>,
}

impl MenuScene {
    pub(crate) fn new(input: Rc<RefCell<InputManager>>) -> Self {
        Self { input }
    }
}

impl StateScene for MenuScene {
    fn update(
        &mut self,
        _fixed_step_ms: f64,
        _context: &SceneContext<'_>,
    ) -> Result<SceneCommand, SceneError> {
        let mut input = borrow_input(&self.input)?;
        let start = pressed_edge(&mut input, ACTION);
        input.buffered_input(true);
        if start {
            info!("menu_start_pressed");
            return Ok(SceneCommand::ChangeState(GameState::Playing, None));
        }
        Ok(SceneCommand::None)
    }

    fn render(
        &mut self,
        surface: &mut dyn RenderSurface,
        _delta_ms: f64,
        _context: &SceneContext<'_>,
    ) -> Result<(), SceneError> {
        surface.draw_message("MENU");
        Ok(())
    }
}

/// Moves a marker with the directional actions. Stands in for real content.
pub(crate) struct PlayingScene {
    input: Rc<RefCell<InputManager>>,
    position: (f64, f64),
}

impl PlayingScene {
    pub(crate) fn new(input: Rc<RefCell<InputManager>>) -> Self {
        Self {
            input,
            position: (0.0, 0.0),
        }
    }

    pub(crate) fn position(&self) -> (f64, f64) {
        self.position
    }
}

impl StateScene for PlayingScene {
    fn update(
        &mut self,
        fixed_step_ms: f64,
        _context: &SceneContext<'_>,
    ) -> Result<SceneCommand, SceneError> {
        let mut input = borrow_input(&self.input)?;
        if pressed_edge(&mut input, PAUSE_ACTION) {
            input.buffered_input(true);
            debug!("pause_requested");
            return Ok(SceneCommand::Pause);
        }
        input.buffered_input(true);

        let step = MOVE_SPEED_UNITS_PER_SECOND * fixed_step_ms / 1000.0;
        let axis = |negative: &str, positive: &str| {
            f64::from(u8::from(input.is_action_pressed(positive)))
                - f64::from(u8::from(input.is_action_pressed(negative)))
        };
        let dx = axis("MOVE_LEFT", "MOVE_RIGHT");
        let dy = axis("MOVE_UP", "MOVE_DOWN");
        self.position.0 += dx * step;
        self.position.1 += dy * step;
        Ok(SceneCommand::None)
    }

    fn render(
        &mut self,
        surface: &mut dyn RenderSurface,
        _delta_ms: f64,
        _context: &SceneContext<'_>,
    ) -> Result<(), SceneError> {
        let (x, y) = self.position;
        surface.draw_message(&format!("x {x:.1} y {y:.1}"));
        Ok(())
    }
}
