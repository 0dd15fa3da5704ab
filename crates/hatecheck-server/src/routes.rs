//! HTTP routes and handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hatecheck_core::{BatchPrediction, Prediction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::state::AppState;

pub const REQUESTS_TOTAL: &str = "hatecheck_requests_total";
pub const PREDICTIONS_TOTAL: &str = "hatecheck_predictions_total";
pub const ERRORS_TOTAL: &str = "hatecheck_errors_total";
pub const INFERENCE_LATENCY_US: &str = "hatecheck_inference_latency_us";

pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/predict", post(predict))
        .route("/batch_predict", post(batch_predict))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.service;
    Json(json!({
        "message": service.name,
        "status": "active",
        "author": service.author,
        "github": service.github,
        "huggingface": service.huggingface,
    }))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "model_loaded": true }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Body of `POST /predict`
#[derive(Debug, Serialize, Deserialize)]
pub struct TextInput {
    pub text: String,
}

/// Body of `POST /batch_predict`
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchInput {
    pub texts: Vec<String>,
}

async fn predict(
    State(state): State<AppState>,
    Json(item): Json<TextInput>,
) -> Result<Json<Prediction>, AppError> {
    metrics::counter!(REQUESTS_TOTAL, "endpoint" => "predict").increment(1);
    let start = Instant::now();

    let prediction = state.gateway.predict(&item.text).await?;

    metrics::histogram!(INFERENCE_LATENCY_US, "endpoint" => "predict")
        .record(start.elapsed().as_micros() as f64);
    metrics::counter!(PREDICTIONS_TOTAL, "label" => prediction.label.clone()).increment(1);
    debug!(
        label = %prediction.label,
        confidence = prediction.confidence,
        "prediction complete"
    );

    Ok(Json(prediction))
}

async fn batch_predict(
    State(state): State<AppState>,
    Json(items): Json<BatchInput>,
) -> Result<Json<BatchPrediction>, AppError> {
    metrics::counter!(REQUESTS_TOTAL, "endpoint" => "batch_predict").increment(1);
    let start = Instant::now();

    let batch = state.gateway.batch_predict(&items.texts).await?;

    metrics::histogram!(INFERENCE_LATENCY_US, "endpoint" => "batch_predict")
        .record(start.elapsed().as_micros() as f64);
    for result in &batch.results {
        metrics::counter!(PREDICTIONS_TOTAL, "label" => result.label.clone()).increment(1);
    }
    debug!(count = batch.count, "batch prediction complete");

    Ok(Json(batch))
}

async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

/// Error handling
#[derive(Debug)]
pub struct AppError(hatecheck_core::Error);

impl From<hatecheck_core::Error> for AppError {
    fn from(err: hatecheck_core::Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.0;
        metrics::counter!(ERRORS_TOTAL, "kind" => err.kind()).increment(1);

        let status = if err.is_client_error() {
            warn!("Rejected request: {}", err);
            StatusCode::BAD_REQUEST
        } else {
            error!("Classification failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(json!({ "detail": err.to_string() }))).into_response()
    }
}
