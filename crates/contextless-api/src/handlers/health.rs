use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    service: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            service: "ContextLess API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
