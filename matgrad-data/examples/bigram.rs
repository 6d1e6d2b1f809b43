//! Bigram character model: one-hot previous character times a weight matrix,
//! trained with full-batch gradient descent, then used to sample new names.
//!
//! The loss carries a `0.01 * mean(W^2)` smoothing penalty. Its gradient is applied
//! to `W` directly before each SGD step, as a weight decay.
//!
//! Usage: `cargo run -p matgrad-data --example bigram [names.txt]`
//! (set `RUST_LOG=debug` for graph logs).

use log::info;
use matgrad_core::{Graph, Matrix};
use matgrad_data::{
    build_context_dataset, load_corpus, sample_categorical, DataError, Dataset, Vocabulary,
};
use matgrad_optim::{Optimizer, Sgd};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

struct TrainConfig {
    iterations: usize,
    learning_rate: f64,
    /// Factor of the `mean(W^2)` penalty.
    weight_penalty: f32,
    samples: usize,
    seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            iterations: 100,
            learning_rate: 10.0,
            weight_penalty: 0.01,
            samples: 5,
            seed: 2147483647,
        }
    }
}

fn main() -> Result<(), DataError> {
    env_logger::init();
    let config = TrainConfig::default();
    let corpus = std::env::args().nth(1).map(PathBuf::from);
    let words = load_corpus(corpus.as_deref())?;
    let vocab = Vocabulary::from_words(&words);
    let data = build_context_dataset(&words, &vocab, 1)?;
    info!("{} bigrams over {} symbols", data.len(), vocab.len());

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut graph = Graph::<f32>::new();
    let x = graph.constant(data.inputs_one_hot(vocab.len())?);
    let y = graph.constant(data.labels(vocab.len())?);
    let w = graph.wrap(Matrix::rand_uniform(
        vec![vocab.len(), vocab.len()],
        -1.0,
        1.0,
        &mut rng,
    )?);
    let logits = graph.mat_mul(x, w)?;
    let loss = graph.softmax_cross_entropy(logits, y)?;

    let mut optim = Sgd::new(config.learning_rate);
    for i in 0..config.iterations {
        graph.forward(loss)?;
        let value = graph.value(loss).map(|v| v.item()).transpose()?;
        if i % 10 == 0 || i + 1 == config.iterations {
            let penalty = graph.value(w).map_or(0.0, |w| {
                config.weight_penalty * w.data().iter().map(|v| v * v).sum::<f32>()
                    / w.numel() as f32
            });
            println!(
                "iteration {:4}: loss {:.4}",
                i,
                value.map_or(f32::NAN, |v| v + penalty)
            );
        }
        graph.backward(loss)?;

        // d(penalty)/dW = 2 * factor * W / numel, applied before the data gradient.
        let (weights, _) = graph.param_mut(w)?;
        let decay = config.learning_rate as f32 * 2.0 * config.weight_penalty
            / weights.len() as f32;
        for v in weights.iter_mut() {
            *v -= decay * *v;
        }
        optim.step(&mut graph, &[w])?;
    }

    // Row `i` of W holds the logits of the character following symbol `i`.
    let weights = graph
        .value(w)
        .ok_or(DataError::InvalidConfig("weights missing".to_string()))?
        .softmax_by_row()?;
    let classes = vocab.len();
    for _ in 0..config.samples {
        let mut out = Vec::new();
        let mut ix = 0;
        loop {
            let row = &weights.data()[ix * classes..(ix + 1) * classes];
            ix = sample_categorical(row, &mut rng)?;
            if ix == 0 {
                break;
            }
            out.push(ix);
        }
        println!("{}", vocab.decode(&out)?);
    }
    Ok(())
}
