// matgrad-data/src/sampler.rs

use crate::error::DataError;
use matgrad_core::MatNumeric;
use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;

/// Draws mini-batches of example indices uniformly at random, with replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomBatchSampler {
    batch_size: usize,
}

impl RandomBatchSampler {
    /// Creates a sampler yielding `batch_size` indices per batch.
    pub fn new(batch_size: usize) -> Result<Self, DataError> {
        if batch_size == 0 {
            return Err(DataError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(RandomBatchSampler { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Indices of one batch drawn from `0..dataset_len`.
    ///
    /// # Errors
    /// `IndexOutOfBounds` when the dataset is empty.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        dataset_len: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, DataError> {
        if dataset_len == 0 {
            return Err(DataError::IndexOutOfBounds { index: 0, len: 0 });
        }
        Ok((0..self.batch_size)
            .map(|_| rng.gen_range(0..dataset_len))
            .collect())
    }
}

/// Draws an index from the categorical distribution given by `probs`.
///
/// The weights are normalized by their sum, so unnormalized counts work too.
///
/// # Errors
/// `InvalidProbabilities` when `probs` is empty, holds a negative or non-finite
/// weight, or sums to zero.
pub fn sample_categorical<T: MatNumeric, R: Rng + ?Sized>(
    probs: &[T],
    rng: &mut R,
) -> Result<usize, DataError> {
    let weights: Vec<f64> = probs
        .iter()
        .map(|p| p.to_f64().unwrap_or(f64::NAN))
        .collect();
    // WeightedIndex only rejects NaN and negative weights; an infinite one breaks it.
    if weights.iter().any(|w| w.is_infinite()) {
        return Err(DataError::InvalidProbabilities(WeightedError::InvalidWeight));
    }
    let dist = WeightedIndex::new(&weights).map_err(DataError::InvalidProbabilities)?;
    Ok(dist.sample(rng))
}

#[cfg(test)]
#[path = "sampler_test.rs"]
mod tests;
