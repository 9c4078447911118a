use rand::seq::IndexedRandom;

/// Pool the tile letters are drawn from. Vowels and common consonants
/// repeat to control their frequency on the board.
const LETTER_POOL: [char; 50] = [
    'a', 'a', 'a', 'a', 'b', 'c', 'd', 'd', 'e', 'e', 'e', 'e', 'e', 'f', 'g', 'h', 'h', 'h', 'i',
    'i', 'i', 'i', 'j', 'k', 'l', 'l', 'm', 'n', 'o', 'o', 'o', 'o', 'q', 'r', 'r', 's', 's', 's',
    's', 't', 't', 't', 'u', 'u', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// A square grid of letter tiles, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    side: usize,
    tiles: Vec<char>,
}

impl Board {
    pub fn generate(side: usize) -> Self {
        let mut rng = rand::rng();
        let tiles = (0..side * side)
            .map(|_| *LETTER_POOL.choose(&mut rng).unwrap())
            .collect();
        Self { side, tiles }
    }

    pub fn from_tiles(side: usize, tiles: Vec<char>) -> Self {
        assert_eq!(tiles.len(), side * side, "Tile count does not fill the grid");
        Self { side, tiles }
    }

    pub fn tile_strings(&self) -> Vec<String> {
        self.tiles.iter().map(|c| c.to_string()).collect()
    }

    /// Two tiles are neighbors if they are distinct and adjacent
    /// horizontally, vertically, or diagonally.
    fn tiles_are_neighbors(&self, tile_1: usize, tile_2: usize) -> bool {
        assert!(
            tile_1 < self.tiles.len() && tile_2 < self.tiles.len(),
            "Tile indexes invalid"
        );

        if tile_1 == tile_2 {
            return false;
        }

        let (row_1, col_1) = (tile_1 / self.side, tile_1 % self.side);
        let (row_2, col_2) = (tile_2 / self.side, tile_2 % self.side);

        row_1.abs_diff(row_2) <= 1 && col_1.abs_diff(col_2) <= 1
    }

    /// Whether `word` can be traced through neighboring tiles without
    /// using any tile twice.
    pub fn contains_word(&self, word: &str) -> bool {
        let mut possible_paths: Option<Vec<Vec<usize>>> = None;

        for character in word.chars() {
            if let Some(ref paths) = possible_paths {
                if paths.is_empty() {
                    break;
                }
            }

            // All positions of the current character on the board
            let locations: Vec<usize> = self
                .tiles
                .iter()
                .enumerate()
                .filter(|(_, &tile)| tile == character)
                .map(|(i, _)| i)
                .collect();

            possible_paths = Some(match possible_paths {
                // The first character has no previous positions to extend
                None => locations.iter().map(|&loc| vec![loc]).collect(),
                Some(paths) => {
                    let mut extended = Vec::new();
                    for &location in &locations {
                        for path in &paths {
                            if path.contains(&location) {
                                continue;
                            }
                            if self.tiles_are_neighbors(location, *path.last().unwrap()) {
                                let mut new_path = path.clone();
                                new_path.push(location);
                                extended.push(new_path);
                            }
                        }
                    }
                    extended
                }
            });
        }

        possible_paths.is_some_and(|paths| !paths.is_empty())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_board() -> Board {
        #[rustfmt::skip]
        let tiles = vec![
            's', 'a', 'b', 'e', 'r',
            'j', 't', 't', 's', 'x',
            'z', 'z', 'z', 'z', 'z',
            's', 'z', 'z', 'z', 'z',
            'z', 'z', 'z', 'z', 'z',
        ];
        Board::from_tiles(5, tiles)
    }

    fn assert_neighbors(board: &Board, starting_tile: usize, neighbors: &[usize]) {
        for i in 0..board.tiles.len() {
            if i == starting_tile {
                continue;
            }
            assert_eq!(
                board.tiles_are_neighbors(starting_tile, i),
                neighbors.contains(&i),
                "tiles {starting_tile} and {i}"
            );
        }
    }

    #[test]
    fn test_tiles_are_neighbors_corners() {
        let board = test_board();
        assert_neighbors(&board, 0, &[1, 5, 6]);
        assert_neighbors(&board, 4, &[3, 8, 9]);
        assert_neighbors(&board, 20, &[15, 16, 21]);
        assert_neighbors(&board, 24, &[18, 19, 23]);
    }

    #[test]
    fn test_tiles_are_neighbors_edges() {
        let board = test_board();
        assert_neighbors(&board, 1, &[0, 2, 5, 6, 7]);
        assert_neighbors(&board, 23, &[17, 18, 19, 22, 24]);
    }

    #[test]
    fn test_tiles_are_neighbors_interior() {
        let board = test_board();
        assert_neighbors(&board, 7, &[1, 2, 3, 6, 8, 11, 12, 13]);
    }

    #[test]
    fn test_contains_word_valid() {
        let board = test_board();
        for word in [
            "set", "sat", "state", "states", "rest", "saber", "stab", "best", "bat", "bats",
        ] {
            assert!(board.contains_word(word), "{word}");
        }
    }

    #[test]
    fn test_contains_word_invalid() {
        let board = test_board();
        assert!(!board.contains_word("armory"));
        assert!(!board.contains_word(""));
    }

    #[test]
    fn test_contains_word_cannot_reuse_tiles() {
        let board = test_board();
        assert!(!board.contains_word("test"));
        assert!(!board.contains_word("jaba"));
    }

    #[test]
    fn test_generate() {
        let board = Board::generate(5);
        assert_eq!(board.tiles.len(), 25);
        assert!(board.tiles.iter().all(|t| LETTER_POOL.contains(t)));
        assert_eq!(board.tile_strings().len(), 25);
    }
}
