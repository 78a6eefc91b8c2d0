//! Storage abstractions for the naturalness utility.
//!
//! Provides a content-addressed response cache keyed by request fingerprint.
//! Backends:
//! - Local filesystem (production de-duplication cache)
//! - In-memory store (tests)

pub mod fingerprint;
pub mod response_cache;

pub use fingerprint::Fingerprint;
pub use response_cache::{ObjectStoreCache, ResponseCache};
