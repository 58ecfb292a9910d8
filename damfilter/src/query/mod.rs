//! The query generator: folds a filter request into a backend-independent
//! plan, and the request/result types around it.

mod options;
mod plan;
mod request;

pub use options::*;
pub use plan::*;
pub use request::*;
