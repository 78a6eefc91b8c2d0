//! Processing-unit estimation and imagery retrieval.
//!
//! A fetch runs through a fixed sequence so that money is never spent on a
//! request that could have been rejected up front:
//!
//! ```text
//! ImageryQuery
//!      │
//!      ├─► bbox + resolution → pixel dimensions (reject > max_pixels)
//!      │
//!      ├─► CostEstimator::estimate
//!      │         │
//!      │         ├─► fingerprint cached: (0, 0), consumption unknown
//!      │         │
//!      │         └─► otherwise: factor model over the eval duration range
//!      │
//!      ├─► cache read or ProcessTransport::process
//!      │
//!      ├─► reconcile actual vs. estimated PUs (warning only)
//!      │
//!      └─► decode GeoTIFF, normalize → RasterResult
//! ```

pub mod config;
pub mod cost;
pub mod decode;
pub mod provider;
pub mod transport;
pub mod types;

pub use config::{load_evalscripts, EvalDurationRange, Evalscripts, ImageryConfig};
pub use cost::{calculate_cost, CostEstimator, CostFactors, DataSource, RequestShape};
pub use provider::{ImageryProvider, ImageryQuery, SentinelHubProvider};
pub use transport::{
    count_catalog_pages, CatalogPage, HttpTransport, ProcessRequest, ProcessTransport,
    ProviderResponse,
};
pub use types::{Consumption, ProcessingUnitEstimate, RasterResult};
