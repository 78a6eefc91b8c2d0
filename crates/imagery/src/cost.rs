//! Processing-unit cost model.
//!
//! The provider bills every request by a multiplicative factor model:
//!
//! | factor        | value                                              |
//! |---------------|----------------------------------------------------|
//! | area          | `max(width * height / 512², 0.01)`                 |
//! | bands         | `bands / 3`                                        |
//! | output format | 8/16 bit → 1.0, 32 bit → 2.0, octet stream → 1.4   |
//! | samples       | number of acquisitions in the time range           |
//! | data fusion   | `local + 2 * remote` distinct collection endpoints |
//! | evaluation    | `1 + ceil((ms - 200) / 100) * 0.5` above 200 ms    |
//!
//! The evaluation-script run time is unknown before the request runs, so the
//! estimator evaluates the model at both ends of a configured duration range.

use std::collections::BTreeSet;
use std::sync::Arc;

use naturalness_common::{Index, NaturalnessResult, OutputFormat, TimeRange};
use storage::{Fingerprint, ResponseCache};
use tracing::{debug, info};

use crate::config::EvalDurationRange;
use crate::types::ProcessingUnitEstimate;

/// Side length of the reference tile the area factor is measured against.
const REFERENCE_TILE_PX: f64 = 512.0;

/// Lower bound of the area factor.
const MIN_AOI_FACTOR: f64 = 0.01;

/// Lower bound of any estimate.
pub const MIN_PROCESSING_UNITS: f64 = 0.005;

/// Evaluation time included in the base price, in milliseconds.
const FREE_EVAL_MS: u32 = 200;

/// Inputs of the factor model for a single evaluation duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostFactors {
    pub width: u32,
    pub height: u32,
    pub band_count: u32,
    pub output_format: OutputFormat,
    pub n_samples: u32,
    pub local_collections: u32,
    pub remote_collections: u32,
    pub eval_duration_ms: u32,
}

/// Evaluate the factor model.
pub fn calculate_cost(factors: &CostFactors) -> f64 {
    let aoi_factor = ((factors.width as f64 * factors.height as f64)
        / (REFERENCE_TILE_PX * REFERENCE_TILE_PX))
        .max(MIN_AOI_FACTOR);
    let band_factor = factors.band_count as f64 / 3.0;
    let output_format_factor = factors.output_format.cost_factor();
    let data_samples_factor = factors.n_samples as f64;
    let data_fusion_factor =
        factors.local_collections as f64 + 2.0 * factors.remote_collections as f64;

    let cost = aoi_factor
        * band_factor
        * output_format_factor
        * data_samples_factor
        * data_fusion_factor
        * eval_factor(factors.eval_duration_ms);

    cost.max(MIN_PROCESSING_UNITS)
}

/// Surcharge for evaluation scripts running longer than the free allowance.
pub fn eval_factor(duration_ms: u32) -> f64 {
    if duration_ms <= FREE_EVAL_MS {
        return 1.0;
    }
    let started_blocks = (duration_ms - FREE_EVAL_MS).div_ceil(100);
    1.0 + started_blocks as f64 * 0.5
}

/// Upper bound on acquisitions in `days`, given a maximum revisit rate per day.
pub fn samples_from_revisit_rate(days: i64, max_revisit_rate: f64) -> u32 {
    (days.max(0) as f64 * max_revisit_rate).ceil() as u32
}

/// A data collection and the service endpoint that hosts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub collection: String,
    pub service_url: String,
}

impl DataSource {
    pub fn new(collection: impl Into<String>, service_url: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            service_url: service_url.into(),
        }
    }
}

/// Everything about a request the estimate depends on.
#[derive(Debug, Clone)]
pub struct RequestShape {
    pub index: Index,
    pub width: u32,
    pub height: u32,
    pub time_range: TimeRange,
    pub sources: Vec<DataSource>,
    /// Acquisitions counted by the catalog, when that lookup ran.
    pub acquisitions: Option<u32>,
}

impl RequestShape {
    /// Count distinct service endpoints as `(local, remote)` relative to `main_url`.
    pub fn fusion_counts(&self, main_url: &str) -> (u32, u32) {
        let urls: BTreeSet<&str> = self
            .sources
            .iter()
            .map(|source| source.service_url.trim_end_matches('/'))
            .collect();
        let main_url = main_url.trim_end_matches('/');

        let local = urls.iter().filter(|url| **url == main_url).count() as u32;
        let remote = urls.len() as u32 - local;
        (local, remote)
    }
}

/// Predicts processing units and detects requests the cache will answer.
pub struct CostEstimator {
    cache: Arc<dyn ResponseCache>,
    main_url: String,
    eval_duration: EvalDurationRange,
    max_revisit_rate: f64,
}

impl CostEstimator {
    pub fn new(
        cache: Arc<dyn ResponseCache>,
        main_url: impl Into<String>,
        eval_duration: EvalDurationRange,
        max_revisit_rate: f64,
    ) -> Self {
        Self {
            cache,
            main_url: main_url.into(),
            eval_duration,
            max_revisit_rate,
        }
    }

    /// Estimate the processing units of a request.
    ///
    /// A fingerprint already in the cache costs nothing and short-circuits the
    /// factor model.
    pub async fn estimate(
        &self,
        fingerprint: &Fingerprint,
        shape: &RequestShape,
    ) -> NaturalnessResult<ProcessingUnitEstimate> {
        if self.cache.contains(fingerprint).await? {
            debug!(%fingerprint, "Expecting a cached result with no PU consumption");
            return Ok(ProcessingUnitEstimate::cached());
        }

        let low = calculate_cost(&self.factors(shape, self.eval_duration.low_ms));
        let high = calculate_cost(&self.factors(shape, self.eval_duration.high_ms));

        info!(
            index = %shape.index,
            width = shape.width,
            height = shape.height,
            low,
            high,
            "Estimated PU consumption"
        );
        Ok(ProcessingUnitEstimate::computed(low, high))
    }

    fn factors(&self, shape: &RequestShape, eval_duration_ms: u32) -> CostFactors {
        let spec = shape.index.spec();
        let (local_collections, remote_collections) = shape.fusion_counts(&self.main_url);
        let n_samples = shape.acquisitions.unwrap_or_else(|| {
            samples_from_revisit_rate(shape.time_range.days(), self.max_revisit_rate)
        });

        CostFactors {
            width: shape.width,
            height: shape.height,
            band_count: spec.band_count,
            output_format: spec.output_format,
            n_samples,
            local_collections,
            remote_collections,
            eval_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::NaiveDate;
    use naturalness_common::BoundingBox;
    use storage::ObjectStoreCache;

    const MAIN: &str = "https://services.sentinel-hub.com";

    fn factors(width: u32, height: u32, bands: u32, samples: u32, eval_ms: u32) -> CostFactors {
        CostFactors {
            width,
            height,
            band_count: bands,
            output_format: OutputFormat::Bit8,
            n_samples: samples,
            local_collections: 1,
            remote_collections: 0,
            eval_duration_ms: eval_ms,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn june_shape() -> RequestShape {
        RequestShape {
            index: Index::Ndvi,
            width: 332,
            height: 364,
            time_range: TimeRange::new(
                NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 7).unwrap(),
            )
            .unwrap(),
            sources: vec![DataSource::new("sentinel-2-l2a", MAIN)],
            acquisitions: None,
        }
    }

    fn estimator(cache: Arc<dyn ResponseCache>) -> CostEstimator {
        CostEstimator::new(cache, MAIN, EvalDurationRange::default(), 0.2)
    }

    #[test]
    fn test_reference_tile_costs_one_unit() {
        assert_eq!(calculate_cost(&factors(512, 512, 3, 1, 200)), 1.0);
    }

    #[test]
    fn test_output_format_and_samples_multiply() {
        let mut f = factors(1024, 1024, 4, 2, 200);
        f.output_format = OutputFormat::Bit32;
        assert_close(calculate_cost(&f), 21.333333333);
    }

    #[test]
    fn test_small_area_uses_aoi_floor() {
        assert_close(calculate_cost(&factors(20, 20, 2, 1, 200)), 0.0066666667);
        assert_close(calculate_cost(&factors(20, 20, 2, 1, 201)), 0.01);
    }

    #[test]
    fn test_long_evaluation() {
        assert_close(calculate_cost(&factors(332, 364, 2, 6, 1200)), 11.06396484375);
    }

    #[test]
    fn test_never_below_floor() {
        assert_eq!(calculate_cost(&factors(1, 1, 1, 0, 0)), MIN_PROCESSING_UNITS);
        assert_eq!(calculate_cost(&factors(1, 1, 1, 1, 0)), MIN_PROCESSING_UNITS);
        let mut no_sources = factors(512, 512, 3, 1, 200);
        no_sources.local_collections = 0;
        assert_eq!(calculate_cost(&no_sources), MIN_PROCESSING_UNITS);
    }

    #[test]
    fn test_remote_collections_cost_double() {
        let mut f = factors(512, 512, 3, 1, 200);
        f.local_collections = 0;
        f.remote_collections = 1;
        assert_eq!(calculate_cost(&f), 2.0);
    }

    #[test]
    fn test_eval_factor_steps() {
        assert_eq!(eval_factor(0), 1.0);
        assert_eq!(eval_factor(200), 1.0);
        assert_eq!(eval_factor(201), 1.5);
        assert_eq!(eval_factor(300), 1.5);
        assert_eq!(eval_factor(301), 2.0);
        assert_eq!(eval_factor(1100), 5.5);
        assert_eq!(eval_factor(1300), 6.5);
    }

    #[test]
    fn test_samples_from_revisit_rate() {
        assert_eq!(samples_from_revisit_rate(29, 0.2), 6);
        assert_eq!(samples_from_revisit_rate(5, 0.2), 1);
        assert_eq!(samples_from_revisit_rate(365, 0.2), 73);
    }

    #[test]
    fn test_fusion_counts() {
        let mut shape = june_shape();
        assert_eq!(shape.fusion_counts(MAIN), (1, 0));

        shape.sources.push(DataSource::new("sentinel-2-l1c", format!("{}/", MAIN)));
        shape
            .sources
            .push(DataSource::new("landsat-ot-l2", "https://services-uswest2.sentinel-hub.com"));
        assert_eq!(shape.fusion_counts(MAIN), (1, 1));
    }

    #[tokio::test]
    async fn test_estimate_range() {
        let estimate = estimator(Arc::new(ObjectStoreCache::in_memory()))
            .estimate(&Fingerprint::from_hex("fresh"), &june_shape())
            .await
            .unwrap();

        assert!(!estimate.cache_hit);
        assert_close(estimate.estimated_low, 10.1419677734375);
        assert_close(estimate.estimated_high, 11.9859619140625);
    }

    #[tokio::test]
    async fn test_catalog_count_overrides_revisit_rate() {
        let mut shape = june_shape();
        shape.acquisitions = Some(3);

        let estimate = estimator(Arc::new(ObjectStoreCache::in_memory()))
            .estimate(&Fingerprint::from_hex("fresh"), &shape)
            .await
            .unwrap();
        assert_close(estimate.estimated_low, 10.1419677734375 / 2.0);
    }

    #[tokio::test]
    async fn test_cached_fingerprint_short_circuits() {
        let cache = Arc::new(ObjectStoreCache::in_memory());
        let shape = june_shape();
        let bbox = BoundingBox::new(8.0, 47.0, 8.05, 47.03).unwrap();
        let fingerprint = Fingerprint::of(shape.index, &bbox, &shape.time_range, 10.0);
        cache
            .put(&fingerprint, Bytes::from_static(b"cached"))
            .await
            .unwrap();

        let estimate = estimator(cache).estimate(&fingerprint, &shape).await.unwrap();
        assert_eq!(estimate, ProcessingUnitEstimate::cached());
    }
}
