//! Metrics collection
//!
//! Thin wrappers over the `metrics` facade. Nothing is exported unless the
//! embedding application installs a recorder; without one these calls are
//! no-ops.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Queries executed, labelled by operation
pub const QUERIES_TOTAL: &str = "imsg_archive_queries_total";
/// Query latency in seconds, labelled by operation
pub const QUERY_DURATION: &str = "imsg_archive_query_duration_seconds";
/// Records returned, labelled by operation
pub const ROWS_RETURNED_TOTAL: &str = "imsg_archive_rows_returned_total";
/// Live-tail polls executed
pub const POLLS_TOTAL: &str = "imsg_archive_polls_total";
/// Messages delivered by the live tail
pub const POLLED_MESSAGES_TOTAL: &str = "imsg_archive_polled_messages_total";
/// Current live-tail watermark
pub const WATERMARK: &str = "imsg_archive_watermark";
/// Errors surfaced to callers, labelled by kind
pub const ERRORS_TOTAL: &str = "imsg_archive_errors_total";

/// Record one completed query.
pub fn record_query(operation: &'static str, duration: Duration, rows: usize) {
    counter!(QUERIES_TOTAL, "operation" => operation).increment(1);
    histogram!(QUERY_DURATION, "operation" => operation).record(duration.as_secs_f64());
    counter!(ROWS_RETURNED_TOTAL, "operation" => operation).increment(rows as u64);
}

/// Record one live-tail poll and the watermark it left behind.
#[allow(clippy::cast_precision_loss)]
pub fn record_poll(delivered: usize, watermark: i64) {
    counter!(POLLS_TOTAL).increment(1);
    counter!(POLLED_MESSAGES_TOTAL).increment(delivered as u64);
    gauge!(WATERMARK).set(watermark as f64);
}

/// Record an error surfaced to the caller.
pub fn record_error(kind: &'static str) {
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_query("recent", Duration::from_millis(3), 10);
        record_poll(2, 42);
        record_error("database");
    }
}
