//! Character-level MLP: embedding of the previous `block_size` characters, a hidden
//! layer with batch normalization and tanh, and a softmax over the next character.
//! Trained on random mini-batches. Batch normalization is then frozen with the
//! dev-set statistics to report the train and dev loss and to sample new names.
//!
//! Usage: `cargo run -p matgrad-data --example mlp [names.txt]`
//! (set `RUST_LOG=debug` for graph logs).

use log::info;
use matgrad_core::ops::normalization::{batch_moments, DEFAULT_EPSILON};
use matgrad_core::{Graph, MatGradError, Matrix, NodeId};
use matgrad_data::{
    build_context_dataset, indices_matrix, load_corpus, sample_categorical, split_words,
    ContextDataset, DataError, Dataset, DatasetConfig, RandomBatchSampler, Vocabulary,
};
use matgrad_optim::{Optimizer, Sgd};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

struct TrainConfig {
    iterations: usize,
    batch_size: usize,
    learning_rate: f64,
    /// Learning rate used for the second half of the iterations.
    final_learning_rate: f64,
    embedding_dim: usize,
    hidden: usize,
    /// Rows of a split used to report its loss.
    eval_rows: usize,
    samples: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            iterations: 1000,
            batch_size: 32,
            learning_rate: 0.1,
            final_learning_rate: 0.01,
            embedding_dim: 10,
            hidden: 200,
            eval_rows: 5000,
            samples: 5,
        }
    }
}

/// Parameter values of the network.
struct Params {
    table: Matrix<f32>,
    w1: Matrix<f32>,
    b1: Matrix<f32>,
    gain: Matrix<f32>,
    bias: Matrix<f32>,
    w2: Matrix<f32>,
    b2: Matrix<f32>,
}

impl Params {
    fn init(cfg: &TrainConfig, vocab: usize, block: usize, rng: &mut StdRng) -> Self {
        let fan_in = (cfg.embedding_dim * block) as f32;
        Params {
            table: Matrix::randn(vec![vocab, cfg.embedding_dim], rng),
            w1: Matrix::randn(vec![cfg.embedding_dim * block, cfg.hidden], rng)
                .scale((5.0 / 3.0) / fan_in.sqrt()),
            b1: Matrix::randn(vec![cfg.hidden], rng).scale(0.01),
            gain: Matrix::ones(vec![cfg.hidden]),
            bias: Matrix::zeros(vec![cfg.hidden]),
            w2: Matrix::randn(vec![cfg.hidden, vocab], rng).scale(0.01),
            b2: Matrix::randn(vec![vocab], rng).scale(0.01),
        }
    }

    fn count(&self) -> usize {
        [
            &self.table, &self.w1, &self.b1, &self.gain, &self.bias, &self.w2, &self.b2,
        ]
        .iter()
        .map(|m| m.numel())
        .sum()
    }
}

/// Node ids of the network inside one graph.
struct Net {
    params: [NodeId; 7],
    loss: NodeId,
}

impl Net {
    /// Builds `softmax_cross_entropy(tanh(bn(emb(x) @ w1 + b1)) @ w2 + b2, y)` with the
    /// parameters as trainable leaves.
    fn build(
        graph: &mut Graph<f32>,
        p: &Params,
        x: NodeId,
        y: NodeId,
    ) -> Result<Self, MatGradError> {
        let mut leaf = |m: &Matrix<f32>| graph.wrap(m.clone());
        let params = [
            leaf(&p.table),
            leaf(&p.w1),
            leaf(&p.b1),
            leaf(&p.gain),
            leaf(&p.bias),
            leaf(&p.w2),
            leaf(&p.b2),
        ];
        let [table, w1, b1, gain, bias, w2, b2] = params;
        let emb = graph.embedding(table, x)?;
        let pre_activation = graph.mat_mul_bias(emb, w1, b1)?;
        let norm = graph.batch_norm(pre_activation, gain, bias)?;
        let h = graph.tanh(norm)?;
        let logits = graph.mat_mul_bias(h, w2, b2)?;
        let loss = graph.softmax_cross_entropy(logits, y)?;
        Ok(Net { params, loss })
    }

    /// Copies the current leaf values back into `p`.
    fn read_params(&self, graph: &Graph<f32>, p: &mut Params) {
        let targets = [
            &mut p.table,
            &mut p.w1,
            &mut p.b1,
            &mut p.gain,
            &mut p.bias,
            &mut p.w2,
            &mut p.b2,
        ];
        for (id, target) in self.params.iter().zip(targets) {
            if let Some(value) = graph.value(*id) {
                *target = value.clone();
            }
        }
    }
}

/// Column mean and variance of the first-layer pre-activations over all of `data`.
fn pre_activation_moments(
    p: &Params,
    data: &ContextDataset,
) -> Result<(Matrix<f32>, Matrix<f32>), DataError> {
    let mut graph = Graph::new();
    let x = graph.constant(data.inputs()?);
    let table = graph.constant(p.table.clone());
    let emb = graph.embedding(table, x)?;
    let pre = graph.mat_mul_bias(emb, p.w1.clone(), p.b1.clone())?;
    graph.forward(pre)?;
    let pre = graph
        .value(pre)
        .ok_or(MatGradError::UninitializedGradient { node: pre.index() })?;
    Ok(batch_moments(pre)?)
}

/// Folds batch normalization with fixed statistics into the first layer:
/// `gain * (x @ w1 + b1 - mean) / sqrt(var + eps) + bias == x @ w1' + b1'`.
fn fold_batch_norm(
    p: &Params,
    mean: &Matrix<f32>,
    var: &Matrix<f32>,
) -> Result<(Matrix<f32>, Matrix<f32>), MatGradError> {
    let eps = DEFAULT_EPSILON as f32;
    let hidden = mean.numel();
    let scale: Vec<f32> = var
        .data()
        .iter()
        .zip(p.gain.data())
        .map(|(&v, &g)| g / (v + eps).sqrt())
        .collect();

    let mut w1 = p.w1.clone();
    for row in w1.data_mut().chunks_mut(hidden) {
        for (w, &s) in row.iter_mut().zip(&scale) {
            *w *= s;
        }
    }
    let b1: Vec<f32> = (0..hidden)
        .map(|j| (p.b1.data()[j] - mean.data()[j]) * scale[j] + p.bias.data()[j])
        .collect();
    Ok((w1, Matrix::new(b1, vec![hidden])?))
}

/// The trained network with batch normalization folded into its first layer.
struct Inference {
    table: Matrix<f32>,
    w1: Matrix<f32>,
    b1: Matrix<f32>,
    w2: Matrix<f32>,
    b2: Matrix<f32>,
}

impl Inference {
    fn new(p: &Params, mean: &Matrix<f32>, var: &Matrix<f32>) -> Result<Self, MatGradError> {
        let (w1, b1) = fold_batch_norm(p, mean, var)?;
        Ok(Inference {
            table: p.table.clone(),
            w1,
            b1,
            w2: p.w2.clone(),
            b2: p.b2.clone(),
        })
    }

    /// Builds `tanh(emb(x) @ w1' + b1') @ w2 + b2` and returns the logits node.
    fn logits(&self, graph: &mut Graph<f32>, x: NodeId) -> Result<NodeId, MatGradError> {
        let table = graph.constant(self.table.clone());
        let emb = graph.embedding(table, x)?;
        let h = graph.mat_mul_bias(emb, self.w1.clone(), self.b1.clone())?;
        let h = graph.tanh(h)?;
        graph.mat_mul_bias(h, self.w2.clone(), self.b2.clone())
    }

    /// Mean cross-entropy over the first `rows` examples of `data`.
    fn split_loss(
        &self,
        data: &ContextDataset,
        rows: usize,
        classes: usize,
    ) -> Result<f32, DataError> {
        let subset: Vec<usize> = (0..data.len().min(rows)).collect();
        let subset = data.gather_rows(&subset)?;
        let mut graph = Graph::new();
        let x = graph.constant(subset.inputs()?);
        let y = graph.constant(subset.labels(classes)?);
        let logits = self.logits(&mut graph, x)?;
        let loss = graph.softmax_cross_entropy(logits, y)?;
        graph.forward(loss)?;
        let value = graph
            .value(loss)
            .ok_or(MatGradError::UninitializedGradient { node: loss.index() })?;
        Ok(value.item()?)
    }

    fn sample_names(
        &self,
        vocab: &Vocabulary,
        block: usize,
        count: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<String>, DataError> {
        let mut graph = Graph::new();
        let x = graph.constant(indices_matrix(&vec![0; block], vec![1, block])?);
        let logits = self.logits(&mut graph, x)?;

        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            let mut context = vec![0usize; block];
            let mut out = Vec::new();
            loop {
                graph.set_value(x, indices_matrix(&context, vec![1, block])?)?;
                graph.forward(logits)?;
                let probs = graph
                    .value(logits)
                    .ok_or(MatGradError::UninitializedGradient {
                        node: logits.index(),
                    })?
                    .softmax_by_row()?;
                let ix = sample_categorical(probs.data(), rng)?;
                if ix == 0 {
                    break;
                }
                out.push(ix);
                context.remove(0);
                context.push(ix);
            }
            names.push(vocab.decode(&out)?);
        }
        Ok(names)
    }
}

fn main() -> Result<(), DataError> {
    env_logger::init();
    let cfg = TrainConfig::default();
    let data_cfg = DatasetConfig::default();
    let corpus = std::env::args().nth(1).map(PathBuf::from);

    let words = load_corpus(corpus.as_deref())?;
    let vocab = Vocabulary::from_words(&words);
    let mut rng = StdRng::seed_from_u64(data_cfg.seed);
    let splits = split_words(words, &data_cfg, &mut rng)?;
    let block = data_cfg.block_size;
    let train = build_context_dataset(&splits.train, &vocab, block)?;
    let dev = build_context_dataset(&splits.dev, &vocab, block)?;
    let test = build_context_dataset(&splits.test, &vocab, block)?;
    info!(
        "Examples: {} train / {} dev / {} test",
        train.len(),
        dev.len(),
        test.len()
    );

    let mut params = Params::init(&cfg, vocab.len(), block, &mut rng);
    println!("Number of parameters: {}", params.count());

    let sampler = RandomBatchSampler::new(cfg.batch_size)?;
    let first = train.gather_rows(&sampler.sample(train.len(), &mut rng)?)?;
    let mut graph = Graph::new();
    let x = graph.constant(first.inputs()?);
    let y = graph.constant(first.labels(vocab.len())?);
    let net = Net::build(&mut graph, &params, x, y)?;

    let mut optim = Sgd::new(cfg.learning_rate);
    for i in 0..cfg.iterations {
        if i == cfg.iterations / 2 {
            optim.set_learning_rate(cfg.final_learning_rate);
        }
        let batch = train.gather_rows(&sampler.sample(train.len(), &mut rng)?)?;
        graph.set_value(x, batch.inputs()?)?;
        graph.set_value(y, batch.labels(vocab.len())?)?;
        graph.forward(net.loss)?;
        graph.backward(net.loss)?;
        if i % 100 == 0 {
            if let Some(loss) = graph.value(net.loss) {
                info!("iteration {:5}: batch loss {:.4}", i, loss.item()?);
            }
        }
        optim.step(&mut graph, &net.params)?;
    }
    net.read_params(&graph, &mut params);

    // Both splits and the sampler normalize with the dev-set statistics.
    let (mean, var) = pre_activation_moments(&params, &dev)?;
    let model = Inference::new(&params, &mean, &var)?;
    let train_loss = model.split_loss(&train, cfg.eval_rows, vocab.len())?;
    let dev_loss = model.split_loss(&dev, cfg.eval_rows, vocab.len())?;
    println!(
        "Loss after {} iterations: train {:.4}, dev {:.4}",
        cfg.iterations, train_loss, dev_loss
    );

    for name in model.sample_names(&vocab, block, cfg.samples, &mut rng)? {
        println!("{}", name);
    }
    Ok(())
}
