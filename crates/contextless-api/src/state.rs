use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::security::ApiKeyValidator;
use crate::services::CompressionService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub compression_service: Arc<CompressionService>,
    pub api_key_validator: Arc<ApiKeyValidator>,
}

impl AppState {
    pub fn new(settings: Settings, compression_service: CompressionService) -> Self {
        let api_key_validator = ApiKeyValidator::new(
            settings.security.require_api_key,
            settings.security.api_key.clone(),
        );

        Self {
            settings: Arc::new(settings),
            compression_service: Arc::new(compression_service),
            api_key_validator: Arc::new(api_key_validator),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.server.request_timeout_seconds.max(1))
    }
}
