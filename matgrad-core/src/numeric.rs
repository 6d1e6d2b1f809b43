use num_traits::{Float, FromPrimitive, NumAssignOps};
use std::fmt::Debug;

/// A trait representing the element types usable in matgrad matrices.
///
/// Restricted to floating point types (`f32`, `f64`). Conversions from counts and
/// `f64` hyper-parameters go through [`FromPrimitive`]; widening to `f64` goes
/// through [`num_traits::ToPrimitive`], which [`Float`] already implies.
pub trait MatNumeric:
    Float + FromPrimitive + NumAssignOps + Debug + Default + Send + Sync + 'static
{
}

impl MatNumeric for f32 {}
impl MatNumeric for f64 {}
