use log::info;
use std::{collections::HashSet, fs::read_to_string, io, path::Path};
use thiserror::Error;

static DEFAULT_WORDS: &str = include_str!("../resources/words.txt");

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("Could not read the word list file")]
    Io(#[from] io::Error),
    #[error("The word list contained no words")]
    Empty,
}

/// The set of words the game recognizes. Everything is stored lowercase;
/// guesses must be lowercased before lookup.
#[derive(Debug, Clone)]
pub struct WordList {
    words: HashSet<String>,
}

impl WordList {
    /// The word list compiled into the binary.
    pub fn embedded() -> Self {
        Self::from_contents(DEFAULT_WORDS).expect("The embedded word list is not empty")
    }

    pub fn from_file(path: &Path) -> Result<Self, WordListError> {
        Self::from_contents(&read_to_string(path)?)
    }

    fn from_contents(contents: &str) -> Result<Self, WordListError> {
        let words: HashSet<String> = contents
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect();

        if words.is_empty() {
            return Err(WordListError::Empty);
        }

        info!("Loaded {} words", words.len());
        Ok(Self { words })
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    #[cfg(test)]
    pub fn from_words(words: &[&str]) -> Self {
        Self {
            words: words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}
