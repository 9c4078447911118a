use crate::game_snapshot::{GameSnapshot, ScoreReport};
use serde::{Deserialize, Serialize};

/// Events sent by a client. The `event`/`data` envelope and the
/// snake_case names are an external contract shared with every client
/// implementation, so they must not drift.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Join { room: String },
    Guess { room: String, guess: String },
    NewGame { room: String },
    TimerExpired { room: String },
}

/// Events pushed by the server.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    GameState(GameSnapshot),
    GuessReply { valid: bool, guess: String },
    ValidGuessesRefresh { guesses: Vec<String> },
    GameOver(ScoreReport),
    ReloadPage,
}

impl ClientEvent {
    pub fn room(&self) -> &str {
        match self {
            Self::Join { room }
            | Self::Guess { room, .. }
            | Self::NewGame { room }
            | Self::TimerExpired { room } => room,
        }
    }
}
