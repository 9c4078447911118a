use serde::{Deserialize, Serialize};
pub use wordgrid_common::config::Game;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub game: Game,
}
