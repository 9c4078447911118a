use crate::dictionary::WordList;
use indexmap::IndexSet;
use log::info;
use rand::Rng;
use std::{collections::HashMap, sync::Arc};
use wordgrid_common::{
    config::Game as GameConfig,
    game_snapshot::{GameSnapshot, ScoreReport},
};

pub mod board;
use board::Board;

const ROOM_CODE_LEN: usize = 4;

/// The authoritative state of one room's game.
#[derive(Debug)]
pub struct GameState {
    room: String,
    config: GameConfig,
    word_list: Arc<WordList>,
    board: Board,
    expire_time: u64,
    valid_guesses: HashMap<String, IndexSet<String>>,
    word_counter: HashMap<String, u32>,
    game_over_announced: bool,
}

impl GameState {
    pub fn new(
        room: String,
        config: GameConfig,
        word_list: Arc<WordList>,
        tiles: Option<Vec<char>>,
        now: u64,
    ) -> Self {
        let state = Self {
            room,
            config,
            word_list,
            board: Self::make_board(&config, tiles),
            expire_time: now + config.duration_millis(),
            valid_guesses: HashMap::new(),
            word_counter: HashMap::new(),
            game_over_announced: false,
        };
        info!("[{}] Created new board", state.room);
        state
    }

    fn make_board(config: &GameConfig, tiles: Option<Vec<char>>) -> Board {
        let side = usize::from(config.board_side);
        match tiles {
            Some(tiles) => Board::from_tiles(side, tiles),
            None => Board::generate(side),
        }
    }

    /// Replaces the board and clears all progress, starting a fresh game
    /// in the same room.
    pub fn new_board(&mut self, tiles: Option<Vec<char>>, now: u64) {
        self.board = Self::make_board(&self.config, tiles);
        self.valid_guesses.clear();
        self.word_counter.clear();
        self.expire_time = now + self.config.duration_millis();
        self.game_over_announced = false;

        info!("[{}] Created new board", self.room);
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn expire_time(&self) -> u64 {
        self.expire_time
    }

    /// The deadline is the authority on whether guessing is still open.
    pub fn running(&self, now: u64) -> bool {
        now < self.expire_time
    }

    pub fn game_over_announced(&self) -> bool {
        self.game_over_announced
    }

    pub fn set_game_over_announced(&mut self) {
        self.game_over_announced = true;
    }

    /// Checks a guess against the clock, the player's earlier guesses,
    /// the word list, and the board, recording it if everything passes.
    /// Returns whether the guess was accepted.
    pub fn guess_word(&mut self, player: &str, guessed_word: &str, now: u64) -> bool {
        // Tiles are lowercase, so the guess must be too
        let guessed_word = guessed_word.trim().to_lowercase();

        if !self.running(now) {
            info!(
                "[{}] {player} guess word '{guessed_word}' was guessed after game ended",
                self.room
            );
            return false;
        }

        if self
            .valid_guesses
            .get(player)
            .is_some_and(|guesses| guesses.contains(&guessed_word))
        {
            info!(
                "[{}] {player} guess word '{guessed_word}' has already been guessed successfully by player",
                self.room
            );
            return false;
        }

        if !self.word_list.is_word(&guessed_word) {
            info!(
                "[{}] {player} guess word '{guessed_word}' is not a recognized word",
                self.room
            );
            return false;
        }

        if !self.board.contains_word(&guessed_word) {
            info!(
                "[{}] {player} guess word '{guessed_word}' is not on the board",
                self.room
            );
            return false;
        }

        info!(
            "[{}] {player} guess word '{guessed_word}' is a valid word",
            self.room
        );

        // The counter makes it easy to find words guessed by more than
        // one player when the game is scored
        *self.word_counter.entry(guessed_word.clone()).or_insert(0) += 1;
        self.valid_guesses
            .entry(player.to_string())
            .or_default()
            .insert(guessed_word);

        true
    }

    pub fn player_guesses(&self, player: &str) -> Vec<String> {
        self.valid_guesses
            .get(player)
            .map(|guesses| guesses.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot for one player, or the reset (player-less) snapshot with
    /// an empty guess list.
    pub fn snapshot(&self, player: Option<&str>) -> GameSnapshot {
        GameSnapshot {
            tiles: self.board.tile_strings(),
            expire_time: self.expire_time,
            player_guesses: player.map(|p| self.player_guesses(p)).unwrap_or_default(),
        }
    }

    /// Splits the player's accepted guesses into words only they found
    /// (scored) and words any other player also found (unscored).
    pub fn score_report(&self, player: &str) -> ScoreReport {
        let mut report = ScoreReport::default();
        if let Some(guesses) = self.valid_guesses.get(player) {
            for guess in guesses {
                if self.word_counter.get(guess) == Some(&1) {
                    report.scored_words.push(guess.clone());
                } else {
                    report.unscored_words.push(guess.clone());
                }
            }
        }
        report
    }
}

/// Registry of all live rooms.
#[derive(Debug)]
pub struct GameManager {
    games: HashMap<String, GameState>,
    word_list: Arc<WordList>,
    config: GameConfig,
}

impl GameManager {
    pub fn new(word_list: WordList, config: GameConfig) -> Self {
        Self {
            games: HashMap::new(),
            word_list: Arc::new(word_list),
            config,
        }
    }

    /// Creates a game in a freshly named room and returns its name.
    pub fn create_game(&mut self, now: u64) -> String {
        let room = self.generate_room_code();
        self.create_game_for_room(&room, now);
        room
    }

    /// Creates the game for the given room name, or resets the room's
    /// existing game with a fresh board.
    pub fn create_game_for_room(&mut self, room: &str, now: u64) {
        match self.games.get_mut(room) {
            Some(game) => game.new_board(None, now),
            None => {
                let game = GameState::new(
                    room.to_string(),
                    self.config,
                    Arc::clone(&self.word_list),
                    None,
                    now,
                );
                self.games.insert(room.to_string(), game);
            }
        }
    }

    #[cfg(test)]
    pub fn create_game_with_tiles(&mut self, room: &str, tiles: Vec<char>, now: u64) {
        let game = GameState::new(
            room.to_string(),
            self.config,
            Arc::clone(&self.word_list),
            Some(tiles),
            now,
        );
        self.games.insert(room.to_string(), game);
    }

    pub fn game(&self, room: &str) -> Option<&GameState> {
        self.games.get(room)
    }

    pub fn game_mut(&mut self, room: &str) -> Option<&mut GameState> {
        self.games.get_mut(room)
    }

    /// The earliest deadline among games that have not yet had their
    /// game-over announced, if any.
    pub fn next_expiry(&self) -> Option<u64> {
        self.games
            .values()
            .filter(|game| !game.game_over_announced())
            .map(GameState::expire_time)
            .min()
    }

    /// Rooms whose clocks have run out but whose game-over has not yet
    /// been announced.
    pub fn expired_rooms(&self, now: u64) -> Vec<String> {
        self.games
            .values()
            .filter(|game| !game.game_over_announced() && !game.running(now))
            .map(|game| game.room().to_string())
            .collect()
    }

    fn generate_room_code(&self) -> String {
        let mut rng = rand::rng();
        loop {
            let room: String = (0..ROOM_CODE_LEN)
                .map(|_| rng.random_range(b'a'..=b'z') as char)
                .collect();
            if !self.games.contains_key(&room) {
                return room;
            }
        }
    }
}
