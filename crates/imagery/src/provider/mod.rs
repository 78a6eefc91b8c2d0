//! Imagery provider capability.

mod sentinel_hub;

pub use sentinel_hub::{reconcile, SentinelHubProvider};

use async_trait::async_trait;

use naturalness_common::{BoundingBox, Index, NaturalnessResult, TimeRange};

use crate::types::RasterResult;

/// Parameters of one imagery fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryQuery {
    pub index: Index,
    pub bbox: BoundingBox,
    pub time_range: TimeRange,
    /// Ground resolution in meters per pixel.
    pub resolution: f64,
}

/// Source of index rasters.
///
/// Implementations validate the request size before doing any paid work and
/// fail with either a validation or an interaction error.
#[async_trait]
pub trait ImageryProvider: Send + Sync {
    async fn fetch(&self, query: &ImageryQuery) -> NaturalnessResult<RasterResult>;
}
