//! Per-connection protocol state.
//!
//! A session turns complete messages into game actions and handshake
//! replies. It owns no socket: the network layer feeds it messages, writes
//! whatever it returns and closes the connection once it reports
//! [`Phase::Disconnected`].

use crate::game::GameState;
use log::debug;
use shared::parse_direction_command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the display name
    AwaitingName,
    /// Handshake done; direction commands steer the snake with this id
    AwaitingDirection(i32),
    Disconnected,
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    name: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingName,
            name: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn player_id(&self) -> Option<i32> {
        match self.phase {
            Phase::AwaitingDirection(id) => Some(id),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Handles one complete message and returns the text to send back, if
    /// any. The caller must hold the game lock for the whole call.
    pub fn on_message(&mut self, message: &str, game: &mut GameState) -> Option<String> {
        match self.phase {
            Phase::AwaitingName => {
                self.name = Some(message.to_string());
                match game.add_player(message) {
                    Some(id) => {
                        self.phase = Phase::AwaitingDirection(id);
                        Some(game.startup(id).encode())
                    }
                    None => {
                        self.phase = Phase::Disconnected;
                        None
                    }
                }
            }
            Phase::AwaitingDirection(id) => {
                match parse_direction_command(message) {
                    Some(direction) => {
                        if !game.request_heading(id, direction) {
                            debug!("Player {} heading {:?} refused", id, direction);
                        }
                    }
                    None => debug!("Ignoring message from player {}: {:?}", id, message),
                }
                None
            }
            Phase::Disconnected => None,
        }
    }

    pub fn on_transport_error(&mut self) {
        self.phase = Phase::Disconnected;
    }
}
