use wordgrid_common::{
    game_snapshot::ScoreReport, messages::ServerEvent, scoring::word_score, timing,
};

const UNSCORED_MARKER: &str = "unscored";

/// Mirror of the last server-pushed state for one room. Every decision
/// of substance stays server-side; this type only projects what it was
/// told, plus the score-table arithmetic for the game-over display.
#[derive(Debug)]
pub struct ViewState {
    room: String,
    tiles: Vec<String>,
    expire_time: Option<u64>,
    guesses: Vec<String>,
    report: Option<ScoreReport>,
    status: Option<String>,
    expiry_fired: bool,
}

impl ViewState {
    pub fn new(room: String) -> Self {
        Self {
            room,
            tiles: Vec::new(),
            expire_time: None,
            guesses: Vec::new(),
            report: None,
            status: None,
            expiry_fired: false,
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Applies a server push to the mirrored state. `reload_page` is
    /// the connection layer's problem, not the view's.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::GameState(snapshot) => {
                // A new deadline re-arms the expiry notification
                if self.expire_time != Some(snapshot.expire_time) {
                    self.expiry_fired = false;
                }
                self.tiles = snapshot.tiles;
                self.expire_time = Some(snapshot.expire_time);
                self.guesses = snapshot
                    .player_guesses
                    .iter()
                    .map(|g| g.to_uppercase())
                    .collect();
                self.report = None;
                self.status = None;
            }
            ServerEvent::GuessReply { valid, guess } => {
                let guess = guess.to_uppercase();
                if valid {
                    self.status = Some(format!("{guess} accepted"));
                    self.guesses.push(guess);
                } else {
                    self.status = Some(format!("{guess} rejected"));
                }
            }
            ServerEvent::ValidGuessesRefresh { guesses } => {
                self.guesses = guesses.iter().map(|g| g.to_uppercase()).collect();
            }
            ServerEvent::GameOver(report) => {
                self.report = Some(report);
            }
            ServerEvent::ReloadPage => {}
        }
    }

    /// Discards all mirrored state, as a page reload would.
    pub fn reset(&mut self) {
        self.tiles.clear();
        self.expire_time = None;
        self.guesses.clear();
        self.report = None;
        self.status = None;
        self.expiry_fired = false;
    }

    /// Called by the one-second tick. Returns true exactly once per
    /// deadline, when the projected countdown reaches zero.
    pub fn countdown_expired(&mut self, now: u64) -> bool {
        match self.expire_time {
            Some(expire) if now >= expire && !self.expiry_fired => {
                self.expiry_fired = true;
                true
            }
            _ => false,
        }
    }

    /// The countdown line, while a deadline is known and the game has
    /// not yet been scored.
    pub fn time_display(&self, now: u64) -> Option<String> {
        if self.report.is_some() {
            return None;
        }
        self.expire_time
            .map(|expire| format!("Time remaining: {}", timing::format_remaining(expire, now)))
    }

    pub fn render(&self, now: u64) -> String {
        let mut out = String::new();
        out.push_str(&format!("Room {}\n", self.room));

        let side = self.tiles.len().isqrt();
        for row in self.tiles.chunks(side.max(1)) {
            let line: Vec<String> = row.iter().map(|tile| tile.to_uppercase()).collect();
            out.push_str(&format!("  {}\n", line.join(" ")));
        }

        if let Some(time) = self.time_display(now) {
            out.push_str(&time);
            out.push('\n');
        }

        if let Some(ref status) = self.status {
            out.push_str(status);
            out.push('\n');
        }

        match self.report {
            Some(ref report) => {
                out.push_str("Game over!\n");
                let mut total = 0;
                for guess in &self.guesses {
                    let word = guess.to_lowercase();
                    if report.scored_words.contains(&word) {
                        let points = word_score(&word);
                        total += points;
                        out.push_str(&format!("  {guess:<12} {points}\n"));
                    } else {
                        out.push_str(&format!("  {guess:<12} {UNSCORED_MARKER}\n"));
                    }
                }
                out.push_str(&format!("Total score: {total}\n"));
            }
            None => {
                if !self.guesses.is_empty() {
                    out.push_str("Guesses:\n");
                    for guess in &self.guesses {
                        out.push_str(&format!("  {guess}\n"));
                    }
                }
            }
        }

        out
    }
}
