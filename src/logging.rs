use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "kaizen-skins.log";

/// Install the global subscriber.
///
/// Logs go to stderr and, when `log_dir` is set, to a daily rolling file.
/// Keep the returned guard alive for the file writer to flush.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A second init (tests, embedding apps) keeps the first subscriber
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if result.is_ok() {
        tracing::debug!("Logging initialized");
    }

    guard
}
