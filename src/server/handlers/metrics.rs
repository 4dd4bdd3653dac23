use crate::metrics;
use axum::{http::header, response::IntoResponse};

/// Prometheus scrape endpoint
pub async fn serve_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
