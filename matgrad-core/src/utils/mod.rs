//! Crate-internal helpers.

#[cfg(test)]
pub(crate) mod testing;
