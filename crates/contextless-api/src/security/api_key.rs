use crate::utils::error::ApiError;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Checks the shared API key on protected routes.
///
/// The key is read from `X-API-Key` first, then from an
/// `Authorization: Bearer <key>` header.
#[derive(Debug, Clone)]
pub struct ApiKeyValidator {
    required: bool,
    expected_api_key: String,
}

impl ApiKeyValidator {
    pub fn new(required: bool, api_key: String) -> Self {
        Self {
            required,
            expected_api_key: api_key,
        }
    }

    /// An empty configured key disables the check even when required.
    pub fn is_enabled(&self) -> bool {
        self.required && !self.expected_api_key.is_empty()
    }

    pub fn validate(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let provided = presented_key(headers).ok_or_else(|| {
            warn!("Request without API key");
            ApiError::MissingApiKey
        })?;

        if provided != self.expected_api_key {
            warn!("Invalid API key presented");
            return Err(ApiError::InvalidApiKey);
        }

        debug!("API key validated");
        Ok(())
    }
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key);
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
}
