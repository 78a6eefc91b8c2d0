//! Zonal statistics of a georeferenced raster over GeoJSON polygons.
//!
//! A pixel belongs to a zone when its center falls inside the polygon (holes
//! excluded). Zones too small to contain any pixel center fall back to the
//! pixel under their representative point, so small parcels still get values.
//!
//! # Example
//!
//! ```rust
//! use naturalness_common::BoundingBox;
//! use serde_json::json;
//! use zonal_stats::{aggregate, parse_stats, Affine, Feature, FeatureCollection, RasterGrid};
//!
//! let data = vec![1.0_f32; 4];
//! let affine = Affine::from_bounds(&BoundingBox::new(0.0, 0.0, 2.0, 2.0).unwrap(), 2, 2);
//! let grid = RasterGrid::new(&data, affine, Some(-999.0)).unwrap();
//! let features = FeatureCollection::new(vec![Feature::new(json!({
//!     "type": "Polygon",
//!     "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
//! }))]);
//!
//! let out = aggregate(&grid, features, &parse_stats(&["mean"]).unwrap()).unwrap();
//! assert_eq!(out.features[0].properties["mean"], 1.0);
//! ```

pub mod affine;
pub mod aggregate;
pub mod feature;
pub mod geometry;
pub mod stats;

pub use affine::{Affine, Window};
pub use aggregate::{aggregate, RasterGrid};
pub use feature::{Feature, FeatureCollection};
pub use geometry::{Polygon, Zone};
pub use stats::{parse_stats, Statistic, ZoneSample, DEFAULT_STATS};
