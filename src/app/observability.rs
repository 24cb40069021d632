use crate::app::config::{FileRotation, LogSink, LoggingConfig};
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

type DynLayer = Box<
    dyn Layer<tracing_subscriber::layer::Layered<EnvFilter, tracing_subscriber::Registry>>
        + Send
        + Sync
        + 'static,
>;

/// Installs the tracing subscriber from config. The returned guards
/// keep file writers flushing; drop them only at process exit.
pub fn init(config: &LoggingConfig) -> Result<Vec<WorkerGuard>> {
    config.validate()?;

    let mut layers: Vec<DynLayer> = Vec::new();
    let mut guards = Vec::new();

    for sink in &config.sinks {
        match sink {
            LogSink::Stdout { json } => {
                let layer = if *json {
                    fmt::layer().json().boxed()
                } else {
                    fmt::layer().boxed()
                };
                layers.push(layer);
            }
            LogSink::File {
                path,
                json,
                rotation,
            } => {
                let directory = path.parent().unwrap_or(std::path::Path::new("."));
                let prefix = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("kite.log");

                let appender = match rotation {
                    FileRotation::Daily => tracing_appender::rolling::daily(directory, prefix),
                    FileRotation::Hourly => tracing_appender::rolling::hourly(directory, prefix),
                    FileRotation::Never => tracing_appender::rolling::never(directory, prefix),
                };
                let (writer, guard) = tracing_appender::non_blocking(appender);
                guards.push(guard);

                let layer = if *json {
                    fmt::layer().json().with_writer(writer).with_ansi(false).boxed()
                } else {
                    fmt::layer().with_writer(writer).with_ansi(false).boxed()
                };
                layers.push(layer);
            }
        }
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("building log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guards)
}
