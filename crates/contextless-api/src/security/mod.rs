pub mod api_key;
pub mod middleware;

pub use api_key::ApiKeyValidator;
pub use middleware::api_key_middleware;
