use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub board_side: u16,
    pub game_duration_secs: u16,
}

impl Default for Game {
    fn default() -> Self {
        Self {
            board_side: 5,
            game_duration_secs: 180,
        }
    }
}

impl Game {
    pub fn tile_count(&self) -> usize {
        usize::from(self.board_side) * usize::from(self.board_side)
    }

    pub fn duration_millis(&self) -> u64 {
        u64::from(self.game_duration_secs) * 1000
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ser_game() {
        let game: Game = Default::default();
        let serialized = toml::to_string(&game).unwrap();
        let deser = toml::from_str(&serialized);
        assert_eq!(deser, Ok(game));
    }

    #[test]
    fn test_game_derived_values() {
        let game = Game {
            board_side: 5,
            game_duration_secs: 180,
        };
        assert_eq!(game.tile_count(), 25);
        assert_eq!(game.duration_millis(), 180_000);
    }
}
