//! HTTP request handlers.

pub mod health;
pub mod index;

pub use health::{health_handler, metrics_handler};
pub use index::{raster_handler, vector_handler};
