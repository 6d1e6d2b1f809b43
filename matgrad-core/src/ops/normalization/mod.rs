//! Normalization layers.

pub mod batch_norm;

pub use batch_norm::{
    batch_moments, batch_norm_backward, batch_norm_forward, batch_norm_shape, BatchNormSaved,
    DEFAULT_EPSILON,
};
