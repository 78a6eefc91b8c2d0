//! Index raster and vector handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, instrument};

use imagery::ProcessingUnitEstimate;
use naturalness_common::{Index, NaturalnessError};
use zonal_stats::{aggregate, parse_stats, Affine, RasterGrid};

use crate::error::ApiError;
use crate::geotiff::{temp_file_body, write_temp_geotiff};
use crate::request::{imagery_query, RasterWorkUnit, VectorWorkUnit};
use crate::state::AppState;

pub const ESTIMATED_LOW_HEADER: &str = "x-pu-estimated-low";
pub const ESTIMATED_HIGH_HEADER: &str = "x-pu-estimated-high";
pub const CONSUMED_HEADER: &str = "x-pu-consumed";

/// POST /:index/raster - Index as a GeoTIFF
#[instrument(skip(state, payload))]
pub async fn raster_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(index): Path<String>,
    payload: Result<Json<RasterWorkUnit>, JsonRejection>,
) -> Result<Response, ApiError> {
    let index: Index = index.parse()?;
    let Json(body) = payload?;
    info!(%index, bbox = %body.bbox, "Creating index raster");

    let query = body.to_query(index, &state.config)?;
    let raster = state.provider.fetch(&query).await?;
    let cost = raster.cost;

    let file = tokio::task::spawn_blocking(move || write_temp_geotiff(&raster))
        .await
        .map_err(join_error)??;

    let mut response = temp_file_body(file)?.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/geotiff"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(format!("attachment; filename=\"{}.tiff\"", index))?,
    );
    insert_cost_headers(headers, &cost)?;

    info!(%index, "Finished index raster");
    Ok(response)
}

/// POST /:index/vector - Zonal statistics of the index as GeoJSON
#[instrument(skip(state, payload))]
pub async fn vector_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(index): Path<String>,
    payload: Result<Json<VectorWorkUnit>, JsonRejection>,
) -> Result<Response, ApiError> {
    let index: Index = index.parse()?;
    let Json(body) = payload?;

    // Reject bad statistics and geometries before paying for imagery.
    let stats = parse_stats(&body.aggregation_stats)?;
    let bbox = body.vectors.bounds()?;
    info!(%index, %bbox, features = body.vectors.features.len(), "Creating index vector");

    let query = imagery_query(index, bbox, &body.time_range, body.resolution, &state.config)?;
    let raster = state.provider.fetch(&query).await?;
    let cost = raster.cost;

    let vectors = body.vectors;
    let collection = tokio::task::spawn_blocking(move || {
        let affine = Affine::from_bounds(&raster.bbox, raster.width, raster.height);
        let grid = RasterGrid::new(&raster.data, affine, Some(raster.nodata()))?;
        aggregate(&grid, vectors, &stats)
    })
    .await
    .map_err(join_error)??;

    let mut response = Json(collection).into_response();
    insert_cost_headers(response.headers_mut(), &cost)?;
    Ok(response)
}

fn insert_cost_headers(
    headers: &mut HeaderMap,
    cost: &ProcessingUnitEstimate,
) -> Result<(), ApiError> {
    headers.insert(ESTIMATED_LOW_HEADER, header_value(cost.estimated_low.to_string())?);
    headers.insert(ESTIMATED_HIGH_HEADER, header_value(cost.estimated_high.to_string())?);
    headers.insert(CONSUMED_HEADER, header_value(cost.consumed.to_string())?);
    Ok(())
}

fn header_value(value: String) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&value).map_err(|e| {
        ApiError(NaturalnessError::Internal(format!(
            "Invalid header value '{}': {}",
            value, e
        )))
    })
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    ApiError(NaturalnessError::Internal(format!("Worker task failed: {}", err)))
}
