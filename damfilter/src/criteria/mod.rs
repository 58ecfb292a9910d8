//! The filter request model: criteria as they arrive in a request body.

mod criterion;
mod filter_value;

pub use criterion::*;
pub use filter_value::*;
