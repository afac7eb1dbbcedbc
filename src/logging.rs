use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::metrics;

/// Initialize structured logging system
///
/// Console output goes to stderr so stdout stays clean for rendered records.
/// When `log_file` is given, a daily-rolling file layer is added in the
/// requested `format` ("json" or "text"). Keep the returned guard alive for
/// the life of the process or buffered file output is lost.
pub fn init_logging(log_level: Option<&str>, log_file: Option<&Path>, format: &str) -> Result<Option<WorkerGuard>> {
    // Set up environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = log_level.unwrap_or("info");
            EnvFilter::try_new(level)
        })
        .map_err(|e| anyhow::anyhow!("Failed to create log filter: {}", e))?;

    // Create registry
    let registry = Registry::default().with(env_filter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    let guard = if let Some(log_path) = log_file {
        let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
        let prefix = log_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("imsg.log");
        let (non_blocking_appender, guard) = non_blocking(rolling::daily(directory, prefix));

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true);

        if format == "json" {
            registry.with(console_layer).with(file_layer.json()).try_init()?;
        } else {
            registry.with(console_layer).with(file_layer).try_init()?;
        }
        Some(guard)
    } else {
        registry.with(console_layer).try_init()?;
        None
    };

    info!("Logging system initialized");
    Ok(guard)
}

/// Performance timing utilities
pub struct OperationTimer {
    operation: &'static str,
    start: std::time::Instant,
}

impl OperationTimer {
    /// Start timing an archive operation.
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: std::time::Instant::now(),
        }
    }

    /// Stop timing, log the duration and record the query metrics.
    pub fn finish(self, rows: usize) -> u128 {
        let elapsed = self.start.elapsed();
        let duration = elapsed.as_millis();
        tracing::debug!(
            operation = self.operation,
            duration_ms = duration,
            rows,
            "Operation completed"
        );
        metrics::record_query(self.operation, elapsed, rows);
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_reports_elapsed() {
        let timer = OperationTimer::new("recent");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.finish(3) >= 5);
    }
}
