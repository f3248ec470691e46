use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::settings::LoggingSettings;
use crate::core::config::AppPaths;

const FALLBACK_LEVEL: &str = "info";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Filter from the configured directive string; an unparsable directive
/// falls back to `info` instead of silencing everything.
pub fn configured_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|err| {
        eprintln!("Ignoring logging.level {:?}: {}", level, err);
        EnvFilter::new(FALLBACK_LEVEL)
    })
}

/// Installs stdout and a daily rolling file under `paths.log_dir`.
pub fn init(paths: &AppPaths, settings: &LoggingSettings) {
    let log_dir = &paths.log_dir;
    if let Err(err) = std::fs::create_dir_all(log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir.display(), err);
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, &settings.file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| configured_filter(&settings.level));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        );
    if registry.try_init().is_err() {
        eprintln!("A tracing subscriber is already installed; keeping it");
    }
}
