use serde::{Deserialize, Serialize};

/// State of one room as pushed to clients. Clients replace their entire
/// view with each received snapshot; nothing is merged.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tiles: Vec<String>,
    pub expire_time: u64,
    pub player_guesses: Vec<String>,
}

/// End-of-game result for a single player. A word lands in
/// `scored_words` only if that player was the only one to find it.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub scored_words: Vec<String>,
    pub unscored_words: Vec<String>,
}
