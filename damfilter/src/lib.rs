//! # damfilter - Filter Engine for Digital Asset Management Stores
//!
//! damfilter turns the filter criteria of a DAM search request into native
//! queries for the store holding the assets, runs them and returns a page of
//! documents (or the distinct values of a field) together with a total
//! count.
//!
//! ## Key Features
//!
//! - **Typed criteria**: text, date, number, selection, boolean, type and
//!   relation filters with exact, contains, range, any and none matching
//! - **Object lists**: flat keys such as `title` transparently address
//!   records of `metadata` and `relations` lists
//! - **Schema scoping**: one criterion can target a field per schema version
//! - **Joins**: criteria may pull in related documents and filter on them
//! - **Multiple Backends**: MongoDB aggregation pipelines, ArangoDB AQL and
//!   an in-memory store, selected by configuration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use damfilter::backend::memory::{InMemoryStore, MemoryBackend};
//! use damfilter::criteria::{FilterCriterion, InputType};
//! use damfilter::manager::FilterManager;
//! use serde_json::json;
//!
//! # fn main() -> damfilter::errors::DamResult<()> {
//! let store = Arc::new(InMemoryStore::new());
//! store.insert("entities", json!({"metadata": [{"key": "title", "value": "Starry Night"}]}))?;
//!
//! let manager = FilterManager::builder()
//!     .load_backend(MemoryBackend::new(store))
//!     .build()?;
//!
//! let criterion = FilterCriterion::new(InputType::Text, "title").value(json!("night"));
//! let result = manager.filter(vec![criterion], 0, None, "entities", None, true)?;
//! assert_eq!(result.count, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`backend`] - Backend abstraction and the mongo, arango and memory backends
//! - [`common`] - Field paths, object lists, value ordering and constants
//! - [`config`] - Engine configuration
//! - [`criteria`] - The filter request model
//! - [`errors`] - Error types and result definitions
//! - [`filter_type`] - Per input type matcher dispatch
//! - [`manager`] - The filter entry point
//! - [`matcher`] - Matcher rules and the backend fragment builders
//! - [`query`] - Query planning, requests and results

pub mod backend;
pub mod common;
pub mod config;
pub mod criteria;
pub mod errors;
pub mod filter_type;
pub mod manager;
pub mod matcher;
pub mod query;

pub use config::FilterConfig;
pub use errors::{DamError, DamResult, ErrorKind};
pub use manager::FilterManager;

#[cfg(test)]
mod tests {
    // Setup only one time throughout the project.
    // It will take effect during test, project wide
    #[ctor::ctor]
    fn init() {
        colog::init();
    }
}
