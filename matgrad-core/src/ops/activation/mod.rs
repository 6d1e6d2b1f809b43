//! Activation functions.

pub mod tanh;

pub use tanh::{tanh_backward, tanh_forward};
