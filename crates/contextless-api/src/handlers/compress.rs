use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::models::{CompressRequest, CompressResponse};
use crate::state::AppState;
use crate::utils::error::ApiError;

/// `POST /api/compress`
///
/// The whole request, chunk fan-out included, runs under the configured
/// request timeout. Hitting it drops every in-flight remote call.
pub async fn compress_handler(
    State(state): State<AppState>,
    payload: Result<Json<CompressRequest>, JsonRejection>,
) -> Result<Json<CompressResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("compress", request_id = %request_id);

    async move {
        let Json(request) = payload.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::TextTooLarge {
                    max: state.settings.compression.max_input_chars,
                }
            } else {
                ApiError::InvalidInput(rejection.body_text())
            }
        })?;

        info!("Compression request received");

        let timeout = state.request_timeout();
        match tokio::time::timeout(timeout, state.compression_service.compress(request)).await {
            Ok(result) => result.map(Json),
            Err(_) => Err(ApiError::Timeout(format!(
                "request exceeded {}s",
                timeout.as_secs()
            ))),
        }
    }
    .instrument(span)
    .await
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
