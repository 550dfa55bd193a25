use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use contextless_api::config::Settings;
use contextless_api::logging::init_logging;
use contextless_api::services::{CompressionService, GeminiService, TextTransformer};
use contextless_api::utils::limiters::Limiters;
use contextless_api::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    let _log_guard = init_logging(&settings.logging)?;

    info!("🚀 Starting ContextLess API...");
    info!(
        "✅ Configuration loaded (environment={}, model={})",
        settings.server.environment, settings.gemini.model
    );

    let limiters = Arc::new(Limiters::new(&settings.gemini));

    // The key must work before the port opens
    info!("Validating Gemini API key...");
    let gemini = match GeminiService::connect(
        settings.gemini.clone(),
        settings.prompts.clone(),
        limiters,
    )
    .await
    {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("❌ {:#}", e);
            error!("Set GEMINI_API_KEY in .env (https://aistudio.google.com/app/apikey)");
            std::process::exit(1);
        }
    };
    info!("✅ Gemini API key is valid");

    if settings.security.require_api_key && settings.security.api_key.is_empty() {
        warn!("security.require_api_key is set but no API_KEY is configured; /api is open");
    }

    let transformer: Arc<dyn TextTransformer> = gemini;
    let compression_service = CompressionService::new(
        settings.compression.clone(),
        transformer,
        settings.server.is_development(),
    );

    let addr = SocketAddr::from((
        settings
            .server
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("Invalid server.host: {}", settings.server.host))?,
        settings.server.port,
    ));

    let app = build_router(AppState::new(settings, compression_service));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🎯 Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl_c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
