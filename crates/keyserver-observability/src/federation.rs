use std::time::Duration;

use metrics::{counter, histogram};

pub fn record_federation_sync(query_id: &str, status: &str, duration: Duration, insertions: u64) {
    counter!(
        "keyserver_federation_sync_total",
        "query_id" => query_id.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "keyserver_federation_sync_duration_seconds",
        "query_id" => query_id.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
    counter!(
        "keyserver_federation_sync_insertions_total",
        "query_id" => query_id.to_string()
    )
    .increment(insertions);
}
