// matgrad-data/src/vocab.rs

use crate::error::DataError;
use std::collections::BTreeSet;

/// The start/end token. It always has index 0.
pub const BOUNDARY: char = '.';

/// Character vocabulary of a word list.
///
/// Index 0 is the [`BOUNDARY`] token; the remaining indices are the distinct
/// characters of the corpus in sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    chars: Vec<char>,
}

impl Vocabulary {
    /// Collects the distinct characters of `words`.
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        let set: BTreeSet<char> = words
            .iter()
            .flat_map(|w| w.as_ref().chars())
            .filter(|&c| c != BOUNDARY)
            .collect();
        let mut chars = Vec::with_capacity(set.len() + 1);
        chars.push(BOUNDARY);
        chars.extend(set);
        Vocabulary { chars }
    }

    /// Number of symbols, boundary token included.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always false: the boundary token is part of every vocabulary.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Index of a single character.
    pub fn index_of(&self, ch: char) -> Result<usize, DataError> {
        if ch == BOUNDARY {
            return Ok(0);
        }
        self.chars[1..]
            .binary_search(&ch)
            .map(|i| i + 1)
            .map_err(|_| DataError::UnknownCharacter { ch })
    }

    /// Encodes every character of `word`.
    pub fn encode(&self, word: &str) -> Result<Vec<usize>, DataError> {
        word.chars().map(|c| self.index_of(c)).collect()
    }

    /// Character at `index`.
    pub fn char_at(&self, index: usize) -> Result<char, DataError> {
        self.chars
            .get(index)
            .copied()
            .ok_or(DataError::IndexOutOfBounds {
                index,
                len: self.chars.len(),
            })
    }

    /// Decodes a sequence of indices into a string.
    pub fn decode(&self, indices: &[usize]) -> Result<String, DataError> {
        indices.iter().map(|&i| self.char_at(i)).collect()
    }
}
