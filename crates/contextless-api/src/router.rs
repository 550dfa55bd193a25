use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::warn;

use crate::handlers;
use crate::security;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.server.body_limit_bytes;
    let cors = cors_layer(&state.settings.server.allowed_origins);

    // Public routes (no API key)
    let public_routes = Router::new().route("/health", get(handlers::health::health_check));

    let protected_routes = Router::new()
        .route("/api/compress", post(handlers::compress::compress_handler))
        .layer(middleware::from_fn(security::api_key_middleware))
        .layer(Extension(state.api_key_validator.clone()));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(handlers::compress::not_found)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// `*` anywhere in the list allows any origin without credentials; an explicit
/// list also allows credentials.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]);

    if allowed_origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}
