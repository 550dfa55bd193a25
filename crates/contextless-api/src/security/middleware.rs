use crate::security::ApiKeyValidator;
use crate::utils::error::ApiError;
use axum::{extract::Request, middleware::Next, response::Response};
use std::sync::Arc;

/// Rejects requests to protected routes that lack a valid API key.
pub async fn api_key_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let validator = request
        .extensions()
        .get::<Arc<ApiKeyValidator>>()
        .ok_or_else(|| ApiError::InternalError("API key validator not configured".to_string()))?
        .clone();

    validator.validate(request.headers())?;

    Ok(next.run(request).await)
}
