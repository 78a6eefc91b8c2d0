//! Common types and utilities shared across the naturalness utility crates.

pub mod bbox;
pub mod error;
pub mod index;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{NaturalnessError, NaturalnessResult};
pub use index::{Index, IndexSpec, OutputFormat};
pub use time::{TimeRange, TimeRangeParams};
