//! HTTP transport to the Sentinel Hub Process and Catalog APIs.
//!
//! The provider only talks to the network through [`ProcessTransport`], which
//! keeps the validation and estimation steps testable without a server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use naturalness_common::{BoundingBox, Index, NaturalnessError, NaturalnessResult, TimeRange};

use crate::config::ImageryConfig;
use crate::cost::DataSource;

/// Response header carrying the processing units billed for a request.
pub const PROCESSING_UNITS_HEADER: &str = "x-processingunits-spent";

const WGS84_CRS: &str = "http://www.opengis.net/def/crs/EPSG/0/4326";

/// Distinct dates requested per Catalog API page.
pub const CATALOG_PAGE_LIMIT: u32 = 100;

/// Pages followed before the acquisition count is given up on.
const MAX_CATALOG_PAGES: usize = 20;

/// A fully specified Process API request.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub index: Index,
    pub bbox: BoundingBox,
    pub time_range: TimeRange,
    pub width: u32,
    pub height: u32,
    pub evalscript: Arc<str>,
    pub source: DataSource,
}

impl ProcessRequest {
    /// JSON body of the Process API call.
    pub fn payload(&self) -> Value {
        let (from, to) = self.time_range.rfc3339_bounds();
        json!({
            "input": {
                "bounds": {
                    "bbox": self.bbox.to_array(),
                    "properties": { "crs": WGS84_CRS }
                },
                "data": [{
                    "type": self.source.collection,
                    "dataFilter": {
                        "timeRange": { "from": from, "to": to }
                    }
                }]
            },
            "output": {
                "width": self.width,
                "height": self.height,
                "responses": [{
                    "identifier": self.index.spec().evalscript_id,
                    "format": { "type": "image/tiff" }
                }]
            },
            "evalscript": &*self.evalscript
        })
    }

    /// JSON body of the Catalog API search for distinct acquisition dates,
    /// starting at the `next` token of a previous page.
    pub fn catalog_query(&self, next: Option<u64>) -> Value {
        let (from, to) = self.time_range.rfc3339_bounds();
        let mut query = json!({
            "collections": [self.source.collection],
            "bbox": self.bbox.to_array(),
            "datetime": format!("{}/{}", from, to),
            "distinct": "date",
            "limit": CATALOG_PAGE_LIMIT
        });
        if let Some(next) = next {
            query["next"] = json!(next);
        }
        query
    }

    /// Collections this request reads from.
    pub fn sources(&self) -> Vec<DataSource> {
        vec![self.source.clone()]
    }
}

/// Raw provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub body: Bytes,
    /// Processing units reported by the provider, if it sent them.
    pub processing_units: Option<f64>,
}

/// Network boundary of the imagery provider.
#[async_trait]
pub trait ProcessTransport: Send + Sync {
    /// Run a Process API request. Any failure is an interaction failure.
    async fn process(&self, request: &ProcessRequest) -> NaturalnessResult<ProviderResponse>;

    /// Count acquisitions available for the request's area and time range.
    async fn count_acquisitions(&self, request: &ProcessRequest) -> NaturalnessResult<u32>;
}

/// One page of a Catalog API search.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub features: Vec<Value>,
    #[serde(default)]
    pub context: CatalogContext,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogContext {
    /// Token of the following page, absent on the last one.
    #[serde(default)]
    pub next: Option<u64>,
}

/// Count features across every page, following `context.next`.
///
/// More than [`MAX_CATALOG_PAGES`] pages is an interaction failure, so the
/// caller falls back instead of using a truncated count.
pub async fn count_catalog_pages<F, Fut>(mut fetch_page: F) -> NaturalnessResult<u32>
where
    F: FnMut(Option<u64>) -> Fut,
    Fut: std::future::Future<Output = NaturalnessResult<CatalogPage>>,
{
    let mut total = 0u32;
    let mut next = None;

    for _ in 0..MAX_CATALOG_PAGES {
        let page = fetch_page(next).await?;
        total += page.features.len() as u32;

        match page.context.next {
            Some(token) if !page.features.is_empty() => next = Some(token),
            _ => return Ok(total),
        }
    }

    Err(NaturalnessError::interaction(format!(
        "Catalog search did not finish within {} pages",
        MAX_CATALOG_PAGES
    )))
}

/// [`ProcessTransport`] over HTTPS using `reqwest`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ImageryConfig) -> NaturalnessResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                NaturalnessError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ProcessTransport for HttpTransport {
    #[instrument(skip(self, request), fields(index = %request.index, width = request.width, height = request.height))]
    async fn process(&self, request: &ProcessRequest) -> NaturalnessResult<ProviderResponse> {
        let response = self
            .post("/api/v1/process")
            .header(header::ACCEPT, "image/tiff")
            .json(&request.payload())
            .send()
            .await
            .map_err(|e| NaturalnessError::interaction(format!("Process request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let detail = response.text().await.unwrap_or_default();
            return Err(NaturalnessError::interaction(format!(
                "Process API returned {}: {}",
                status,
                truncate(&detail, 200)
            )));
        }

        let processing_units = response
            .headers()
            .get(PROCESSING_UNITS_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok());

        let body = response.bytes().await.map_err(|e| {
            NaturalnessError::interaction(format!("Failed to read process response: {}", e))
        })?;

        debug!(size = body.len(), ?processing_units, "Received process response");
        Ok(ProviderResponse {
            body,
            processing_units,
        })
    }

    #[instrument(skip(self, request), fields(index = %request.index))]
    async fn count_acquisitions(&self, request: &ProcessRequest) -> NaturalnessResult<u32> {
        let count = count_catalog_pages(move |next| self.catalog_page(request, next)).await?;
        debug!(count, "Counted distinct acquisition dates");
        Ok(count)
    }
}

impl HttpTransport {
    async fn catalog_page(
        &self,
        request: &ProcessRequest,
        next: Option<u64>,
    ) -> NaturalnessResult<CatalogPage> {
        let response = self
            .post("/api/v1/catalog/1.0.0/search")
            .json(&request.catalog_query(next))
            .send()
            .await
            .map_err(|e| NaturalnessError::interaction(format!("Catalog request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NaturalnessError::interaction(format!(
                "Catalog API returned {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            NaturalnessError::interaction(format!("Invalid catalog response: {}", e))
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
