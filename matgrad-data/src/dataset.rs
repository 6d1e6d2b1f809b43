// matgrad-data/src/dataset.rs

use crate::encoding::{indices_matrix, one_hot};
use crate::error::DataError;
use crate::vocab::Vocabulary;
use crate::Dataset;
use log::debug;
use matgrad_core::{MatNumeric, Matrix};
use rand::seq::SliceRandom;
use rand::Rng;

/// Settings for building next-character datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Number of preceding characters fed to the model. `1` gives bigrams.
    pub block_size: usize,
    /// Share of the words used for training.
    pub train_fraction: f64,
    /// Share of the words used for the development split. The rest is the test split.
    pub dev_fraction: f64,
    /// Seed for shuffling the words before splitting.
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            block_size: 3,
            train_fraction: 0.8,
            dev_fraction: 0.1,
            seed: 42,
        }
    }
}

impl DatasetConfig {
    /// Checks the block size and that the split fractions describe a partition.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.block_size == 0 {
            return Err(DataError::InvalidConfig(
                "block_size must be at least 1".to_string(),
            ));
        }
        let valid = |f: f64| (0.0..=1.0).contains(&f);
        if !valid(self.train_fraction)
            || !valid(self.dev_fraction)
            || self.train_fraction + self.dev_fraction > 1.0
        {
            return Err(DataError::InvalidConfig(format!(
                "split fractions {} / {} do not fit in [0, 1]",
                self.train_fraction, self.dev_fraction
            )));
        }
        Ok(())
    }
}

/// Train / development / test partition of a word list.
#[derive(Debug, Clone, PartialEq)]
pub struct WordSplits {
    pub train: Vec<String>,
    pub dev: Vec<String>,
    pub test: Vec<String>,
}

/// Shuffles `words` and cuts them at `train_fraction` and
/// `train_fraction + dev_fraction` (rounded down).
pub fn split_words<R: Rng + ?Sized>(
    mut words: Vec<String>,
    config: &DatasetConfig,
    rng: &mut R,
) -> Result<WordSplits, DataError> {
    config.validate()?;
    words.shuffle(rng);
    let n = words.len() as f64;
    let n1 = (n * config.train_fraction).floor() as usize;
    let n2 = ((n * (config.train_fraction + config.dev_fraction)).floor() as usize)
        .min(words.len());
    let test = words.split_off(n2);
    let dev = words.split_off(n1);
    debug!(
        "Split {} words into {} / {} / {}",
        n,
        words.len(),
        dev.len(),
        test.len()
    );
    Ok(WordSplits {
        train: words,
        dev,
        test,
    })
}

/// Fixed-width character contexts and the character that follows each of them.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDataset {
    block_size: usize,
    /// Row-major `[len, block_size]` vocabulary indices.
    contexts: Vec<usize>,
    targets: Vec<usize>,
}

impl ContextDataset {
    /// Creates a dataset from flat contexts and their targets.
    pub fn new(
        block_size: usize,
        contexts: Vec<usize>,
        targets: Vec<usize>,
    ) -> Result<Self, DataError> {
        if block_size == 0 || contexts.len() != targets.len() * block_size {
            return Err(DataError::InvalidConfig(format!(
                "{} context indices do not form {} rows of width {}",
                contexts.len(),
                targets.len(),
                block_size
            )));
        }
        Ok(ContextDataset {
            block_size,
            contexts,
            targets,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Context of example `index`.
    pub fn context(&self, index: usize) -> &[usize] {
        &self.contexts[index * self.block_size..(index + 1) * self.block_size]
    }

    /// All targets, in order.
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Keeps only the examples listed in `rows` (repeats allowed), in that order.
    pub fn gather_rows(&self, rows: &[usize]) -> Result<ContextDataset, DataError> {
        let mut contexts = Vec::with_capacity(rows.len() * self.block_size);
        let mut targets = Vec::with_capacity(rows.len());
        for &row in rows {
            if row >= self.len() {
                return Err(DataError::IndexOutOfBounds {
                    index: row,
                    len: self.len(),
                });
            }
            contexts.extend_from_slice(self.context(row));
            targets.push(self.targets[row]);
        }
        ContextDataset::new(self.block_size, contexts, targets)
    }

    /// Contexts as a `[len, block_size]` index matrix, ready for an embedding lookup.
    pub fn inputs<T: MatNumeric>(&self) -> Result<Matrix<T>, DataError> {
        indices_matrix(&self.contexts, vec![self.len(), self.block_size])
    }

    /// Contexts as one-hot rows. Only meaningful for `block_size == 1`.
    pub fn inputs_one_hot<T: MatNumeric>(&self, classes: usize) -> Result<Matrix<T>, DataError> {
        if self.block_size != 1 {
            return Err(DataError::InvalidConfig(format!(
                "one-hot inputs need block_size 1, got {}",
                self.block_size
            )));
        }
        one_hot(&self.contexts, classes)
    }

    /// Targets as one-hot label rows `[len, classes]`.
    pub fn labels<T: MatNumeric>(&self, classes: usize) -> Result<Matrix<T>, DataError> {
        one_hot(&self.targets, classes)
    }
}

impl Dataset for ContextDataset {
    type Item = (Vec<usize>, usize);

    fn get(&self, index: usize) -> Self::Item {
        assert!(index < self.len(), "Index out of bounds: {} >= {}", index, self.len());
        (self.context(index).to_vec(), self.targets[index])
    }

    fn len(&self) -> usize {
        self.targets.len()
    }
}

/// Slides a window of `block_size` characters over every word, padded with the
/// boundary token on the left and terminated by it on the right.
///
/// For `"emma"` and a block size of 3 the examples are `... -> e`, `..e -> m`,
/// `.em -> m`, `emm -> a` and `mma -> .`.
pub fn build_context_dataset<S: AsRef<str>>(
    words: &[S],
    vocab: &Vocabulary,
    block_size: usize,
) -> Result<ContextDataset, DataError> {
    if block_size == 0 {
        return Err(DataError::InvalidConfig(
            "block_size must be at least 1".to_string(),
        ));
    }
    let mut contexts = Vec::new();
    let mut targets = Vec::new();
    for word in words {
        let mut context = vec![0usize; block_size];
        let encoded = vocab.encode(word.as_ref())?;
        for next in encoded.into_iter().chain(std::iter::once(0)) {
            contexts.extend_from_slice(&context);
            targets.push(next);
            context.remove(0);
            context.push(next);
        }
    }
    debug!(
        "Built {} examples with block size {} from {} words",
        targets.len(),
        block_size,
        words.len()
    );
    ContextDataset::new(block_size, contexts, targets)
}

#[cfg(test)]
#[path = "dataset_test.rs"]
mod tests;
