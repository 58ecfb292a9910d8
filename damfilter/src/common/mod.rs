//! Shared building blocks: field paths, object-list resolution, value
//! ordering, datetime handling and storage key escaping.

mod constants;
mod datetime;
mod field_path;
mod object_lists;
mod sort_order;
mod storage_keys;
mod value;

pub use constants::*;
pub use datetime::*;
pub use field_path::*;
pub use object_lists::*;
pub use sort_order::*;
pub use storage_keys::*;
pub use value::*;
