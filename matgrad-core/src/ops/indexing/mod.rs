//! Indexing operations.

pub mod embedding;

pub use embedding::{embedding_backward, embedding_forward, embedding_shape};
