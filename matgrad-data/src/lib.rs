//! Character-level data pipeline for next-character models: vocabulary, context
//! datasets, train/dev/test splits, mini-batch sampling and categorical sampling.

/// Trait representing a dataset.
///
/// A dataset provides access to individual data samples (e.g., input features
/// and corresponding target labels) via an index.
pub trait Dataset {
    /// The type of a single item returned by the dataset.
    type Item;

    /// Returns the data sample at the given index.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    fn get(&self, index: usize) -> Self::Item;

    /// Returns the total number of samples in the dataset.
    fn len(&self) -> usize;

    /// Returns true if the dataset contains no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod corpus;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod sampler;
pub mod vocab;

pub use corpus::{load_corpus, load_words, parse_words, SAMPLE_WORDS};
pub use dataset::{build_context_dataset, split_words, ContextDataset, DatasetConfig, WordSplits};
pub use encoding::{indices_matrix, one_hot};
pub use error::DataError;
pub use sampler::{sample_categorical, RandomBatchSampler};
pub use vocab::{Vocabulary, BOUNDARY};
