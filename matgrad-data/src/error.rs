use matgrad_core::MatGradError;
use rand::distributions::WeightedError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, encoding or batching data.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read corpus {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The corpus contains no words")]
    EmptyCorpus,

    #[error("Character {ch:?} is not part of the vocabulary")]
    UnknownCharacter { ch: char },

    #[error("Index {index} is out of range for {len} entries")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sampling weights: {0}")]
    InvalidProbabilities(#[source] WeightedError),

    #[error(transparent)]
    Graph(#[from] MatGradError),
}
