//! Common fixtures and test doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use imagery::{
    Evalscripts, ImageryProvider, ImageryQuery, ProcessRequest, ProcessTransport,
    ProcessingUnitEstimate, ProviderResponse, RasterResult,
};
use naturalness_common::{BoundingBox, Index, NaturalnessError, NaturalnessResult, TimeRange};

use crate::generators::encode_tiff_i16;

/// Common bounding box definitions for testing, as `[west, south, east, north]`.
pub mod bbox {
    /// Small area around Heidelberg, roughly 730 x 334 px at 10 m.
    pub const HEIDELBERG: [f64; 4] = [8.65, 49.38, 8.75, 49.41];

    /// A few hundred meters square, well below any size limit.
    pub const TINY: [f64; 4] = [8.0, 47.0, 8.004, 47.003];

    /// One degree square, far beyond 2500 px at 10 m.
    pub const ONE_DEGREE: [f64; 4] = [8.0, 47.0, 9.0, 48.0];

    /// Unit test extent used by the aggregation fixtures.
    pub const UNIT_2X2: [f64; 4] = [0.0, 0.0, 2.0, 2.0];
}

/// Build a [`BoundingBox`] from a fixture array.
pub fn bbox_of(coords: [f64; 4]) -> BoundingBox {
    BoundingBox::new(coords[0], coords[1], coords[2], coords[3]).expect("Invalid fixture bbox")
}

/// 2024-06-08 .. 2024-07-07, 29 days.
pub fn june_2024() -> TimeRange {
    TimeRange::new(
        NaiveDate::from_ymd_opt(2024, 6, 8).expect("valid date"),
        NaiveDate::from_ymd_opt(2024, 7, 7).expect("valid date"),
    )
    .expect("valid range")
}

/// Placeholder evaluation scripts for every index.
pub fn test_evalscripts() -> Evalscripts {
    Index::ALL
        .into_iter()
        .map(|index| (index, Arc::from(format!("//VERSION=3\n// {}", index))))
        .collect()
}

/// Imagery provider returning a fixed grid stretched over the requested bbox.
///
/// Counts calls and remembers the last query.
pub struct StaticImageryProvider {
    data: Vec<f32>,
    width: usize,
    height: usize,
    cost: ProcessingUnitEstimate,
    failure: Option<fn() -> NaturalnessError>,
    calls: AtomicUsize,
    last_query: Mutex<Option<ImageryQuery>>,
}

impl StaticImageryProvider {
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Self {
        assert_eq!(data.len(), width * height, "grid size mismatch");
        Self {
            data,
            width,
            height,
            cost: ProcessingUnitEstimate::computed(1.0, 2.0),
            failure: None,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn with_cost(mut self, cost: ProcessingUnitEstimate) -> Self {
        self.cost = cost;
        self
    }

    /// Fail every fetch with the error produced by `failure`.
    pub fn failing(failure: fn() -> NaturalnessError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(vec![0.0], 1, 1)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<ImageryQuery> {
        self.last_query.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl ImageryProvider for StaticImageryProvider {
    async fn fetch(&self, query: &ImageryQuery) -> NaturalnessResult<RasterResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().expect("poisoned") = Some(query.clone());

        if let Some(failure) = self.failure {
            return Err(failure());
        }

        Ok(RasterResult {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
            bbox: query.bbox,
            index: query.index,
            cost: self.cost,
        })
    }
}

/// Process transport answering with a constant-valued 16-bit grid.
pub struct ScriptedTransport {
    value: i16,
    processing_units: Option<f64>,
    acquisitions: Option<u32>,
    fail: bool,
    process_calls: AtomicUsize,
    catalog_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(value: i16) -> Self {
        Self {
            value,
            processing_units: None,
            acquisitions: None,
            fail: false,
            process_calls: AtomicUsize::new(0),
            catalog_calls: AtomicUsize::new(0),
        }
    }

    /// Report `units` in the consumption header.
    pub fn with_processing_units(mut self, units: f64) -> Self {
        self.processing_units = Some(units);
        self
    }

    /// Answer catalog searches with `count` acquisitions.
    pub fn with_acquisitions(mut self, count: u32) -> Self {
        self.acquisitions = Some(count);
        self
    }

    /// Fail every process call as an unreachable upstream.
    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessTransport for ScriptedTransport {
    async fn process(&self, request: &ProcessRequest) -> NaturalnessResult<ProviderResponse> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NaturalnessError::interaction(
                "Process request failed: connection refused",
            ));
        }

        let data = vec![self.value; (request.width * request.height) as usize];
        Ok(ProviderResponse {
            body: encode_tiff_i16(request.width, request.height, &data),
            processing_units: self.processing_units,
        })
    }

    async fn count_acquisitions(&self, _request: &ProcessRequest) -> NaturalnessResult<u32> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.acquisitions
            .ok_or_else(|| NaturalnessError::interaction("Catalog API returned 503"))
    }
}
