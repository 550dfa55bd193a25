use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::transformer::RemoteError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Text is required and must be a string")]
    InvalidInput(String),

    #[error("Text cannot be empty")]
    EmptyInput,

    #[error("Text exceeds maximum length of {max} characters")]
    TextTooLarge { max: usize },

    #[error("Invalid compression level. Must be: aggressive, balanced, or minimal")]
    InvalidCompressionLevel(String),

    #[error("Request timeout. The text might be too large. Please try with smaller text.")]
    Timeout(String),

    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited(String),

    #[error("API configuration error. Please contact support.")]
    ApiConfig(String),

    #[error("Processing failed. Text may be too large or contain unsupported content.")]
    Processing {
        message: String,
        details: Option<String>,
    },

    #[error("Unauthorized: API key required. Include X-API-Key header or Authorization: Bearer token")]
    MissingApiKey,

    #[error("Unauthorized: Invalid API key")]
    InvalidApiKey,

    #[error("Endpoint not found")]
    NotFound,

    #[error("Internal server error")]
    InternalError(String),
}

impl ApiError {
    /// Stable machine-readable code returned alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::EmptyInput => "EMPTY_INPUT",
            ApiError::TextTooLarge { .. } => "TEXT_TOO_LARGE",
            ApiError::InvalidCompressionLevel(_) => "INVALID_COMPRESSION_LEVEL",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::RateLimited(_) => "RATE_LIMIT",
            ApiError::ApiConfig(_) => "API_CONFIG_ERROR",
            ApiError::Processing { .. } => "PROCESSING_ERROR",
            ApiError::MissingApiKey => "MISSING_API_KEY",
            ApiError::InvalidApiKey => "INVALID_API_KEY",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_)
            | ApiError::EmptyInput
            | ApiError::TextTooLarge { .. }
            | ApiError::InvalidCompressionLevel(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::MissingApiKey | ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ApiConfig(_) | ApiError::Processing { .. } | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Map a remote failure to its boundary error. Raw remote details are
    /// only attached when `expose_details` is set (development mode).
    pub fn from_remote(err: RemoteError, expose_details: bool) -> Self {
        match err {
            RemoteError::Timeout(msg) => ApiError::Timeout(msg),
            RemoteError::RateLimited(msg) => ApiError::RateLimited(msg),
            RemoteError::Config(msg) => ApiError::ApiConfig(msg),
            other @ (RemoteError::Malformed(_) | RemoteError::Generic(_)) => {
                let message = other.to_string();
                ApiError::Processing {
                    details: expose_details.then(|| message.clone()),
                    message,
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        match &self {
            ApiError::InvalidInput(msg) | ApiError::InvalidCompressionLevel(msg) => {
                tracing::warn!("Validation failed ({}): {}", code, msg)
            }
            ApiError::EmptyInput | ApiError::TextTooLarge { .. } => {
                tracing::warn!("Validation failed ({})", code)
            }
            ApiError::MissingApiKey | ApiError::InvalidApiKey | ApiError::NotFound => {
                tracing::warn!("{}", self)
            }
            ApiError::Timeout(msg) | ApiError::RateLimited(msg) => {
                tracing::warn!("Remote failure ({}): {}", code, msg)
            }
            ApiError::ApiConfig(msg) | ApiError::InternalError(msg) => {
                tracing::error!("{}: {}", code, msg)
            }
            ApiError::Processing { message, .. } => {
                tracing::error!("Processing error: {}", message)
            }
        }

        let suggestion = match &self {
            ApiError::Timeout(_) => {
                Some("Try reducing the text size or splitting it into smaller parts.")
            }
            _ => None,
        };

        let details = match &self {
            ApiError::Processing { details, .. } => details.clone(),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code,
            suggestion,
            details,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (ApiError::EmptyInput, "EMPTY_INPUT", 400),
            (ApiError::InvalidCompressionLevel("turbo".into()), "INVALID_COMPRESSION_LEVEL", 400),
            (ApiError::TextTooLarge { max: 10 }, "TEXT_TOO_LARGE", 400),
            (ApiError::Timeout("t".into()), "TIMEOUT", 408),
            (ApiError::RateLimited("r".into()), "RATE_LIMIT", 429),
            (ApiError::ApiConfig("c".into()), "API_CONFIG_ERROR", 500),
            (ApiError::MissingApiKey, "MISSING_API_KEY", 401),
            (ApiError::NotFound, "NOT_FOUND", 404),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status().as_u16(), status);
        }
    }

    #[test]
    fn test_remote_mapping_hides_details_in_production() {
        let err = ApiError::from_remote(RemoteError::Generic("upstream 500: secret".into()), false);
        match err {
            ApiError::Processing { details, message } => {
                assert!(details.is_none());
                assert!(message.contains("secret"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = ApiError::from_remote(RemoteError::Malformed("no text".into()), true);
        assert!(matches!(err, ApiError::Processing { details: Some(_), .. }));
        assert!(matches!(
            ApiError::from_remote(RemoteError::RateLimited("429".into()), true),
            ApiError::RateLimited(_)
        ));
    }
}
