//! Sentinel Hub backed imagery provider.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, error, info, instrument, warn};

use naturalness_common::{NaturalnessError, NaturalnessResult};
use storage::{Fingerprint, ResponseCache};

use crate::config::{load_evalscripts, Evalscripts, ImageryConfig};
use crate::cost::{CostEstimator, DataSource, RequestShape};
use crate::decode::{decode_tiff, normalize};
use crate::provider::{ImageryProvider, ImageryQuery};
use crate::transport::{HttpTransport, ProcessRequest, ProcessTransport, ProviderResponse};
use crate::types::{Consumption, ProcessingUnitEstimate, RasterResult};

/// Imagery provider for Sentinel-2 L2A index rasters.
pub struct SentinelHubProvider {
    config: ImageryConfig,
    evalscripts: Evalscripts,
    cache: Arc<dyn ResponseCache>,
    transport: Arc<dyn ProcessTransport>,
    estimator: CostEstimator,
}

impl SentinelHubProvider {
    pub fn new(
        config: ImageryConfig,
        evalscripts: Evalscripts,
        cache: Arc<dyn ResponseCache>,
        transport: Arc<dyn ProcessTransport>,
    ) -> NaturalnessResult<Self> {
        config.validate()?;
        if let Some(missing) = naturalness_common::Index::ALL
            .iter()
            .find(|index| !evalscripts.contains_key(index))
        {
            return Err(NaturalnessError::configuration(format!(
                "No evaluation script configured for {}",
                missing
            )));
        }

        let estimator = CostEstimator::new(
            cache.clone(),
            config.base_url.clone(),
            config.eval_duration,
            config.max_revisit_rate,
        );

        Ok(Self {
            config,
            evalscripts,
            cache,
            transport,
            estimator,
        })
    }

    /// Production wiring: evaluation scripts from disk and an HTTPS transport.
    pub fn from_config(
        config: ImageryConfig,
        cache: Arc<dyn ResponseCache>,
    ) -> NaturalnessResult<Self> {
        let evalscripts = load_evalscripts(&config.evalscript_dir)?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::new(config, evalscripts, cache, transport)
    }

    pub fn config(&self) -> &ImageryConfig {
        &self.config
    }

    fn check_size(&self, width: u32, height: u32) -> NaturalnessResult<()> {
        let max = self.config.max_pixels;
        if width > max || height > max {
            return Err(NaturalnessError::validation(format!(
                "Area exceeds processing limit: {max} px x {max} px (requested {width} px x {height} px)"
            )));
        }
        Ok(())
    }

    fn build_request(&self, query: &ImageryQuery, width: u32, height: u32) -> ProcessRequest {
        ProcessRequest {
            index: query.index,
            bbox: query.bbox,
            time_range: query.time_range,
            width,
            height,
            evalscript: self.evalscripts[&query.index].clone(),
            source: DataSource::new(self.config.collection.clone(), self.config.base_url.clone()),
        }
    }

    /// Acquisition count from the catalog, `None` when disabled or unavailable.
    async fn acquisitions(
        &self,
        fingerprint: &Fingerprint,
        request: &ProcessRequest,
    ) -> NaturalnessResult<Option<u32>> {
        if !self.config.catalog_lookup || self.cache.contains(fingerprint).await? {
            return Ok(None);
        }

        match self.transport.count_acquisitions(request).await {
            Ok(count) => {
                debug!(count, "Counted acquisitions in catalog");
                Ok(Some(count))
            }
            Err(e) => {
                warn!(error = %e, "Catalog lookup failed, falling back to revisit rate");
                Ok(None)
            }
        }
    }

    /// Cached response for a cache-hit estimate, otherwise a paid fetch.
    ///
    /// Fetched bodies are not cached here; see [`SentinelHubProvider::store`].
    async fn retrieve(
        &self,
        fingerprint: &Fingerprint,
        request: &ProcessRequest,
        estimate: &ProcessingUnitEstimate,
    ) -> NaturalnessResult<(ProviderResponse, bool)> {
        if estimate.cache_hit {
            if let Some(body) = self.cache.get(fingerprint).await? {
                counter!("imagery_cache_hits_total").increment(1);
                return Ok((
                    ProviderResponse {
                        body,
                        processing_units: None,
                    },
                    true,
                ));
            }
            warn!(%fingerprint, "Cache entry vanished after estimation, fetching");
        }

        let response = match self.transport.process(request).await {
            Ok(response) => response,
            Err(e) => {
                counter!("imagery_fetch_failures_total").increment(1);
                error!(error = %e, "Download of remote sensing scenes failed");
                return Err(match e {
                    NaturalnessError::Interaction(_) => e,
                    other => NaturalnessError::interaction(other.to_string()),
                });
            }
        };

        Ok((response, false))
    }

    /// Cache a fetched body once it has decoded. Failures only warn.
    async fn store(&self, fingerprint: &Fingerprint, body: Bytes) {
        if let Err(e) = self.cache.put(fingerprint, body).await {
            warn!(error = %e, %fingerprint, "Failed to cache provider response");
        }
    }
}

/// Attach the provider-reported consumption to an estimate.
///
/// Returns the updated estimate and whether the actual consumption fell
/// outside the predicted range. Cache hits and missing reports never count as
/// a mismatch.
pub fn reconcile(
    estimate: ProcessingUnitEstimate,
    reported: Option<f64>,
) -> (ProcessingUnitEstimate, bool) {
    let consumed = match reported {
        Some(actual) if !estimate.cache_hit => Consumption::Measured(actual),
        _ => Consumption::Unknown,
    };

    let mismatch = match consumed {
        Consumption::Measured(actual) => actual > 0.0 && !estimate.covers(actual),
        Consumption::Unknown => false,
    };

    (estimate.with_consumed(consumed), mismatch)
}

#[async_trait]
impl ImageryProvider for SentinelHubProvider {
    #[instrument(skip(self, query), fields(index = %query.index, bbox = %query.bbox, time_range = %query.time_range))]
    async fn fetch(&self, query: &ImageryQuery) -> NaturalnessResult<RasterResult> {
        counter!("imagery_requests_total", "index" => query.index.as_str()).increment(1);

        let (width, height) = query.bbox.pixel_dimensions(query.resolution)?;
        self.check_size(width, height)?;

        let fingerprint =
            Fingerprint::of(query.index, &query.bbox, &query.time_range, query.resolution);
        let request = self.build_request(query, width, height);

        let shape = RequestShape {
            index: query.index,
            width,
            height,
            time_range: query.time_range,
            sources: request.sources(),
            acquisitions: self.acquisitions(&fingerprint, &request).await?,
        };
        let estimate = self.estimator.estimate(&fingerprint, &shape).await?;
        if !estimate.cache_hit {
            histogram!("processing_units_estimated_high").record(estimate.estimated_high);
        }

        let (response, from_cache) = self.retrieve(&fingerprint, &request, &estimate).await?;

        let reported = if from_cache {
            None
        } else {
            response.processing_units
        };
        let (cost, mismatch) = reconcile(estimate, reported);
        if let Consumption::Measured(actual) = cost.consumed {
            histogram!("processing_units_consumed").record(actual);
            debug!(actual, "The request required {} PUs", actual);
        }
        if mismatch {
            counter!("processing_units_estimation_mismatch_total").increment(1);
            warn!(
                actual = %cost.consumed,
                low = cost.estimated_low,
                high = cost.estimated_high,
                "The PU estimation was inaccurate"
            );
        }

        let spec = query.index.spec();
        let body = response.body.clone();
        let grid = tokio::task::spawn_blocking(move || {
            let mut grid = decode_tiff(&body)?;
            normalize(&mut grid, spec);
            Ok::<_, NaturalnessError>(grid)
        })
        .await
        .map_err(|e| NaturalnessError::Internal(format!("Decode task failed: {}", e)))??;

        // Only responses that decode become cache hits.
        if !from_cache {
            self.store(&fingerprint, response.body).await;
        }

        if grid.width != width as usize || grid.height != height as usize {
            warn!(
                expected_width = width,
                expected_height = height,
                width = grid.width,
                height = grid.height,
                "Provider returned unexpected raster dimensions"
            );
        }

        info!(
            width = grid.width,
            height = grid.height,
            cache_hit = from_cache,
            "Imagery fetched"
        );

        Ok(RasterResult {
            data: grid.data,
            width: grid.width,
            height: grid.height,
            bbox: query.bbox,
            index: query.index,
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use naturalness_common::{BoundingBox, Index, TimeRange};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::ObjectStoreCache;
    use tiff::encoder::{colortype, TiffEncoder};

    /// Transport double returning a constant grid of the requested size.
    struct FakeTransport {
        value: i16,
        processing_units: Option<f64>,
        fail: bool,
        corrupt: bool,
        process_calls: AtomicUsize,
        catalog_calls: AtomicUsize,
    }

    impl FakeTransport {
        fn new(value: i16, processing_units: Option<f64>) -> Self {
            Self {
                value,
                processing_units,
                fail: false,
                corrupt: false,
                process_calls: AtomicUsize::new(0),
                catalog_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(0, None)
            }
        }

        /// Answers 200 with a body that is not a TIFF.
        fn corrupt() -> Self {
            Self {
                corrupt: true,
                ..Self::new(0, Some(0.02))
            }
        }
    }

    #[async_trait]
    impl ProcessTransport for FakeTransport {
        async fn process(&self, request: &ProcessRequest) -> NaturalnessResult<ProviderResponse> {
            self.process_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NaturalnessError::interaction("connection refused"));
            }
            if self.corrupt {
                return Ok(ProviderResponse {
                    body: Bytes::from_static(b"<html>502 Bad Gateway</html>"),
                    processing_units: self.processing_units,
                });
            }

            let data = vec![self.value; (request.width * request.height) as usize];
            let mut buffer = Cursor::new(Vec::new());
            TiffEncoder::new(&mut buffer)
                .unwrap()
                .write_image::<colortype::GrayI16>(request.width, request.height, &data)
                .unwrap();

            Ok(ProviderResponse {
                body: Bytes::from(buffer.into_inner()),
                processing_units: self.processing_units,
            })
        }

        async fn count_acquisitions(&self, _request: &ProcessRequest) -> NaturalnessResult<u32> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }
    }

    fn evalscripts() -> Evalscripts {
        Index::ALL
            .into_iter()
            .map(|index| (index, Arc::from("//VERSION=3")))
            .collect()
    }

    fn provider(transport: Arc<FakeTransport>, config: ImageryConfig) -> SentinelHubProvider {
        SentinelHubProvider::new(
            config,
            evalscripts(),
            Arc::new(ObjectStoreCache::in_memory()),
            transport,
        )
        .unwrap()
    }

    fn query(bbox: BoundingBox) -> ImageryQuery {
        ImageryQuery {
            index: Index::Ndvi,
            bbox,
            time_range: TimeRange::new(
                NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 7).unwrap(),
            )
            .unwrap(),
            resolution: 10.0,
        }
    }

    fn small_bbox() -> BoundingBox {
        BoundingBox::new(8.0, 47.0, 8.004, 47.003).unwrap()
    }

    #[tokio::test]
    async fn test_oversized_area_rejected_before_network() {
        let transport = Arc::new(FakeTransport::new(0, None));
        let provider = provider(transport.clone(), ImageryConfig::default());

        let err = provider
            .fetch(&query(BoundingBox::new(8.0, 47.0, 9.0, 48.0).unwrap()))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("2500 px x 2500 px"));
        assert_eq!(transport.process_calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.catalog_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_normalizes_and_records_consumption() {
        let transport = Arc::new(FakeTransport::new(32767, Some(0.02)));
        let provider = provider(transport.clone(), ImageryConfig::default());

        let raster = provider.fetch(&query(small_bbox())).await.unwrap();

        let (width, height) = small_bbox().pixel_dimensions(10.0).unwrap();
        assert_eq!(raster.shape(), (height as usize, width as usize));
        assert!(raster.data.iter().all(|v| *v == 1.0));
        assert!(!raster.cost.cache_hit);
        assert!(raster.cost.estimated_low > 0.0);
        assert_eq!(raster.cost.consumed, Consumption::Measured(0.02));
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let transport = Arc::new(FakeTransport::new(0, Some(0.02)));
        let provider = provider(transport.clone(), ImageryConfig::default());

        provider.fetch(&query(small_bbox())).await.unwrap();
        let second = provider.fetch(&query(small_bbox())).await.unwrap();

        assert_eq!(transport.process_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.cost, ProcessingUnitEstimate::cached());
    }

    #[tokio::test]
    async fn test_transport_failure_is_interaction_failure() {
        let transport = Arc::new(FakeTransport::failing());
        let cache = Arc::new(ObjectStoreCache::in_memory());
        let provider = SentinelHubProvider::new(
            ImageryConfig::default(),
            evalscripts(),
            cache.clone(),
            transport,
        )
        .unwrap();

        let q = query(small_bbox());
        let err = provider.fetch(&q).await.unwrap_err();
        assert!(matches!(err, NaturalnessError::Interaction(_)));

        let fingerprint = Fingerprint::of(q.index, &q.bbox, &q.time_range, q.resolution);
        assert!(!cache.contains(&fingerprint).await.unwrap());
    }

    #[tokio::test]
    async fn test_undecodable_response_is_not_cached() {
        let transport = Arc::new(FakeTransport::corrupt());
        let cache = Arc::new(ObjectStoreCache::in_memory());
        let provider = SentinelHubProvider::new(
            ImageryConfig::default(),
            evalscripts(),
            cache.clone(),
            transport.clone(),
        )
        .unwrap();

        let q = query(small_bbox());
        let first = provider.fetch(&q).await.unwrap_err();
        assert!(matches!(first, NaturalnessError::Decode(_)));

        let fingerprint = Fingerprint::of(q.index, &q.bbox, &q.time_range, q.resolution);
        assert!(!cache.contains(&fingerprint).await.unwrap());

        // The retry is estimated and fetched again, not served as a free hit.
        let second = provider.fetch(&q).await.unwrap_err();
        assert!(matches!(second, NaturalnessError::Decode(_)));
        assert_eq!(transport.process_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_header_leaves_consumption_unknown() {
        let transport = Arc::new(FakeTransport::new(0, None));
        let provider = provider(transport, ImageryConfig::default());

        let raster = provider.fetch(&query(small_bbox())).await.unwrap();
        assert_eq!(raster.cost.consumed, Consumption::Unknown);
        assert!(!raster.cost.cache_hit);
    }

    #[tokio::test]
    async fn test_catalog_lookup_only_when_enabled() {
        let transport = Arc::new(FakeTransport::new(0, None));
        let config = ImageryConfig {
            catalog_lookup: true,
            ..ImageryConfig::default()
        };
        let provider = provider(transport.clone(), config);

        provider.fetch(&query(small_bbox())).await.unwrap();
        provider.fetch(&query(small_bbox())).await.unwrap();

        // The cached second request skips the catalog.
        assert_eq!(transport.catalog_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_evalscript_rejected() {
        let mut scripts = evalscripts();
        scripts.remove(&Index::Water);

        let result = SentinelHubProvider::new(
            ImageryConfig::default(),
            scripts,
            Arc::new(ObjectStoreCache::in_memory()),
            Arc::new(FakeTransport::new(0, None)),
        );
        assert!(matches!(result, Err(NaturalnessError::Configuration(_))));
    }

    #[test]
    fn test_reconcile() {
        let estimate = ProcessingUnitEstimate::computed(10.0, 12.0);

        let (cost, mismatch) = reconcile(estimate, Some(11.0));
        assert_eq!(cost.consumed, Consumption::Measured(11.0));
        assert!(!mismatch);

        let (_, mismatch) = reconcile(estimate, Some(20.0));
        assert!(mismatch);

        let (cost, mismatch) = reconcile(estimate, None);
        assert_eq!(cost.consumed, Consumption::Unknown);
        assert!(!mismatch);

        let (cost, mismatch) = reconcile(ProcessingUnitEstimate::cached(), Some(5.0));
        assert_eq!(cost.consumed, Consumption::Unknown);
        assert!(!mismatch);
    }
}
