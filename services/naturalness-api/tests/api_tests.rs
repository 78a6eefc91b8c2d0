//! Router-level tests against a static imagery provider.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tiff::decoder::{Decoder, DecodingResult};
use tower::ServiceExt;

use imagery::ProcessingUnitEstimate;
use naturalness_api::{app, AppState, ServiceConfig};
use naturalness_common::{Index, NaturalnessError};
use test_utils::{
    bbox, feature_collection, grid_with_block, square_feature, StaticImageryProvider,
};

fn router(provider: Arc<StaticImageryProvider>) -> Router {
    app(Arc::new(AppState::new(provider, ServiceConfig::default())))
}

fn quadrant_provider() -> Arc<StaticImageryProvider> {
    let data = grid_with_block(20, 20, 1.0, (10, 20), (0, 10), 0.5);
    Arc::new(StaticImageryProvider::new(data, 20, 20))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_raster_returns_geotiff_with_cost_headers() {
    let provider = Arc::new(StaticImageryProvider::new(vec![0.1, 0.2, 0.3, -999.0], 2, 2));
    let response = router(provider.clone())
        .oneshot(post(
            "/NDVI/raster",
            json!({
                "bbox": bbox::TINY,
                "time_range": {"start_date": "2024-06-08", "end_date": "2024-07-07"}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/geotiff");
    assert_eq!(headers["x-pu-estimated-low"], "1");
    assert_eq!(headers["x-pu-estimated-high"], "2");
    assert_eq!(headers["x-pu-consumed"], "unknown");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let mut decoder = Decoder::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (2, 2));
    match decoder.read_image().unwrap() {
        DecodingResult::F32(data) => assert_eq!(data, vec![0.1, 0.2, 0.3, -999.0]),
        _ => panic!("expected Float32 pixels"),
    }

    let query = provider.last_query().unwrap();
    assert_eq!(query.index, Index::Ndvi);
    assert_eq!(query.resolution, 10.0);
    assert_eq!(query.time_range.days(), 29);
}

#[tokio::test]
async fn test_cached_raster_reports_zero_cost() {
    let provider = Arc::new(
        StaticImageryProvider::new(vec![1.0], 1, 1).with_cost(ProcessingUnitEstimate::cached()),
    );
    let response = router(provider)
        .oneshot(post("/water/raster", json!({"area_coords": bbox::TINY})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-pu-estimated-low"], "0");
    assert_eq!(response.headers()["x-pu-estimated-high"], "0");
    assert_eq!(response.headers()["x-pu-consumed"], "unknown");
}

#[tokio::test]
async fn test_vector_zonal_statistics() {
    let provider = quadrant_provider();
    let response = router(provider.clone())
        .oneshot(post(
            "/NATURALNESS/vector",
            json!({
                "aggregation_stats": ["max", "count"],
                "vectors": feature_collection(vec![
                    square_feature(0.0, 0.0, 1.0, 1.0),
                    square_feature(0.0, 0.0, 2.0, 2.0),
                ]),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-pu-estimated-low"], "1");

    let body = json_body(response).await;
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["features"][0]["properties"]["max"], 0.5);
    assert_eq!(body["features"][0]["properties"]["count"], 100);
    assert_eq!(body["features"][1]["properties"]["max"], 1.0);
    assert_eq!(body["features"][1]["properties"]["count"], 400);
    assert_eq!(
        body["features"][0]["geometry"],
        square_feature(0.0, 0.0, 1.0, 1.0)["geometry"]
    );

    // The fetched area is the extent of all geometries.
    let query = provider.last_query().unwrap();
    assert_eq!(query.bbox.to_array(), [0.0, 0.0, 2.0, 2.0]);
    assert_eq!(query.index, Index::Naturalness);
}

#[tokio::test]
async fn test_vector_default_statistics() {
    let response = router(quadrant_provider())
        .oneshot(post(
            "/NDVI/vector",
            json!({"vectors": feature_collection(vec![square_feature(0.0, 0.0, 2.0, 2.0)])}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let props = body["features"][0]["properties"].as_object().unwrap();
    for name in ["count", "min", "max", "mean"] {
        assert!(props.contains_key(name), "missing {}", name);
    }
    assert_eq!(props["mean"], 0.875);
}

#[tokio::test]
async fn test_sub_pixel_polygon_gets_one_value() {
    // A polygon smaller than one pixel, stretched over a 1x1 grid.
    let provider = Arc::new(StaticImageryProvider::new(vec![0.7], 1, 1));
    let response = router(provider)
        .oneshot(post(
            "/NDVI/vector",
            json!({
                "aggregation_stats": ["count", "mean"],
                "vectors": feature_collection(vec![square_feature(8.0, 47.0, 8.00001, 47.00001)]),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["features"][0]["properties"]["count"], 1);
    assert_approx_eq_f32(&body["features"][0]["properties"]["mean"], 0.7);
}

fn assert_approx_eq_f32(value: &Value, expected: f32) {
    let actual = value.as_f64().unwrap();
    assert!((actual - expected as f64).abs() < 1e-6, "{} != {}", actual, expected);
}

#[tokio::test]
async fn test_unknown_statistic_rejected_before_fetch() {
    let provider = quadrant_provider();
    let response = router(provider.clone())
        .oneshot(post(
            "/NDVI/vector",
            json!({
                "aggregation_stats": ["mean", "geometric_mean"],
                "vectors": feature_collection(vec![square_feature(0.0, 0.0, 1.0, 1.0)]),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("geometric_mean"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_invalid_geometry_rejected_before_fetch() {
    let provider = quadrant_provider();
    let response = router(provider.clone())
        .oneshot(post(
            "/NDVI/vector",
            json!({
                "vectors": feature_collection(vec![json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [0.5, 0.5]},
                    "properties": {}
                })]),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_unknown_index_rejected() {
    let provider = quadrant_provider();
    let response = router(provider.clone())
        .oneshot(post("/EVI/raster", json!({"bbox": bbox::TINY})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_validation_failure() {
    let response = router(quadrant_provider())
        .oneshot(post("/NDVI/raster", json!({"bbox": [8.1, 47.0, 8.0, 47.1]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_body(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_provider_validation_failure_is_422() {
    let provider = Arc::new(StaticImageryProvider::failing(|| {
        NaturalnessError::validation(
            "Area exceeds processing limit: 2500 px x 2500 px (requested 7000 px x 11000 px)",
        )
    }));
    let response = router(provider)
        .oneshot(post("/NDVI/raster", json!({"bbox": bbox::ONE_DEGREE})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("2500 px x 2500 px"));
}

#[tokio::test]
async fn test_upstream_failure_is_503() {
    let provider = Arc::new(StaticImageryProvider::failing(|| {
        NaturalnessError::interaction("Process request failed: connection refused")
    }));
    let response = router(provider)
        .oneshot(post(
            "/WATER/vector",
            json!({"vectors": feature_collection(vec![square_feature(8.0, 47.0, 8.01, 47.01)])}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = router(quadrant_provider());

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(json_body(health).await["status"], "ok");

    let metrics = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(metrics.status(), StatusCode::OK);
}
