//! Loss functions.

pub mod softmax_cross_entropy;

pub use softmax_cross_entropy::{
    softmax_cross_entropy_backward, softmax_cross_entropy_forward, softmax_cross_entropy_shape,
};
