//! Tracing subscriber setup: stdout plus an optional daily rolling file.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. The returned guard must be kept
/// alive for the file writer to flush.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let json = config.format.eq_ignore_ascii_case("json");
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .pretty()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_level(true)
                .boxed(),
        );
    }

    let mut guard = None;
    if let Some(directory) = config.directory.as_deref() {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("contextless")
            .filename_suffix("log")
            .build(directory)
            .with_context(|| format!("Failed to open log directory {}", directory))?;
        let (writer, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        if json {
            layers.push(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .boxed(),
            );
        } else {
            layers.push(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .boxed(),
            );
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
