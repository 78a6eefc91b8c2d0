//! Request bodies of the index endpoints.

use serde::Deserialize;

use imagery::ImageryQuery;
use naturalness_common::{BoundingBox, Index, NaturalnessResult, TimeRangeParams};
use zonal_stats::FeatureCollection;

use crate::config::ServiceConfig;

/// Body of `POST /{index}/raster`.
#[derive(Debug, Clone, Deserialize)]
pub struct RasterWorkUnit {
    /// Area of interest in WGS84 (west, south, east, north).
    #[serde(alias = "area_coords")]
    pub bbox: BoundingBox,

    #[serde(default)]
    pub time_range: TimeRangeParams,

    /// Meters per pixel; the configured default when omitted.
    #[serde(default)]
    pub resolution: Option<f64>,
}

/// Body of `POST /{index}/vector`.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorWorkUnit {
    #[serde(default)]
    pub time_range: TimeRangeParams,

    /// Statistic names; the default set when empty.
    #[serde(default)]
    pub aggregation_stats: Vec<String>,

    /// Polygons to aggregate over. Their extent is the fetched area.
    pub vectors: FeatureCollection,

    #[serde(default)]
    pub resolution: Option<f64>,
}

/// Build an imagery query, applying configured defaults.
pub fn imagery_query(
    index: Index,
    bbox: BoundingBox,
    time_range: &TimeRangeParams,
    resolution: Option<f64>,
    config: &ServiceConfig,
) -> NaturalnessResult<ImageryQuery> {
    Ok(ImageryQuery {
        index,
        bbox,
        time_range: time_range.resolve(config.default_lookback_days)?,
        resolution: resolution.unwrap_or(config.imagery.default_resolution),
    })
}

impl RasterWorkUnit {
    pub fn to_query(&self, index: Index, config: &ServiceConfig) -> NaturalnessResult<ImageryQuery> {
        imagery_query(index, self.bbox, &self.time_range, self.resolution, config)
    }
}
