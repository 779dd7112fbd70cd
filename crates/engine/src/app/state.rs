use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::events::{BusEvent, EventBus, ListenerResult, Subscription};
use super::loop_runner::FrameFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Loading,
    Menu,
    Playing,
    Paused,
    GameOver,
    Error,
}

impl GameState {
    pub const ALL: [GameState; 6] = [
        GameState::Loading,
        GameState::Menu,
        GameState::Playing,
        GameState::Paused,
        GameState::GameOver,
        GameState::Error,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            GameState::Loading => "loading",
            GameState::Menu => "menu",
            GameState::Playing => "playing",
            GameState::Paused => "paused",
            GameState::GameOver => "gameover",
            GameState::Error => "error",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GameState {
    type Err = StateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        GameState::ALL
            .into_iter()
            .find(|state| state.name() == raw)
            .ok_or_else(|| StateError::InvalidState {
                name: raw.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid game state: {name:?}")]
    InvalidState { name: String },
}

/// Payload associated with the most recent entry into a state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateData {
    Fault(FrameFault),
    Value(serde_json::Value),
}

impl StateData {
    pub fn as_fault(&self) -> Option<&FrameFault> {
        match self {
            StateData::Fault(fault) => Some(fault),
            StateData::Value(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateEntered {
    pub state: GameState,
    pub previous: GameState,
    pub data: Option<StateData>,
}

impl BusEvent for StateEntered {
    type Kind = GameState;

    fn kind(&self) -> GameState {
        self.state
    }
}

#[derive(Debug)]
pub struct GameStateManager {
    current: GameState,
    previous: GameState,
    data: HashMap<GameState, StateData>,
    listeners: EventBus<StateEntered>,
}

impl Default for GameStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStateManager {
    pub fn new() -> Self {
        Self {
            current: GameState::Loading,
            previous: GameState::Loading,
            data: HashMap::new(),
            listeners: EventBus::new("game_state"),
        }
    }

    pub fn current(&self) -> GameState {
        self.current
    }

    pub fn previous(&self) -> GameState {
        self.previous
    }

    /// Payload stored for the current state, if any.
    pub fn state_data(&self) -> Option<&StateData> {
        self.data.get(&self.current)
    }

    pub fn change_state(&mut self, next: GameState, data: Option<StateData>) {
        self.previous = self.current;
        self.current = next;
        if let Some(payload) = data.clone() {
            self.data.insert(next, payload);
        }
        info!(from = %self.previous, to = %next, "state_changed");

        let event = StateEntered {
            state: next,
            previous: self.previous,
            data,
        };
        self.listeners.emit(&event);
    }

    /// Parses `name` first; an unknown name leaves the manager untouched.
    pub fn change_state_named(
        &mut self,
        name: &str,
        data: Option<StateData>,
    ) -> Result<(), StateError> {
        let next = name.parse::<GameState>()?;
        self.change_state(next, data);
        Ok(())
    }

    /// Registers `callback` to run on every transition into `state`.
    pub fn on_enter<F>(&mut self, state: GameState, callback: F) -> Subscription
    where
        F: FnMut(&StateEntered) -> ListenerResult + 'static,
    {
        self.listeners.subscribe(state, callback)
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }
}
