//! Tracing subscriber setup.
//!
//! Human-readable output goes to the console. When a log directory is
//! configured, the same events are also written as JSON to a file that
//! rolls over daily.

use confidant_config::LoggingSection;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::error::Result;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured filter. The returned guard flushes
/// the JSON file writer when dropped, so keep it alive for the lifetime of
/// the process. Fails if a global subscriber is already installed.
pub fn init(config: &LoggingSection) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter(&config.filter)?);

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(env_filter(&config.filter)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}

fn env_filter(configured: &str) -> Result<EnvFilter> {
    let directive = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(from_env) if !from_env.trim().is_empty() => from_env,
        _ => configured.to_string(),
    };
    Ok(EnvFilter::try_new(directive)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_directives() {
        assert!(env_filter("info").is_ok());
        assert!(env_filter("confidant=debug,confidant_scheduler=trace,warn").is_ok());
    }
}
