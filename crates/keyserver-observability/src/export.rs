use std::time::Duration;

use metrics::{counter, histogram};

pub fn record_export_windows_planned(windows: usize, batches_created: u64) {
    histogram!("keyserver_export_windows_planned").record(windows as f64);
    counter!("keyserver_export_batches_created_total").increment(batches_created);
}

pub fn record_export_file(region: &str, status: &str, duration: Duration, keys: usize, bytes: usize) {
    counter!(
        "keyserver_export_files_total",
        "region" => region.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "keyserver_export_file_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    if status == "published" {
        histogram!(
            "keyserver_export_file_keys",
            "region" => region.to_string()
        )
        .record(keys as f64);
        histogram!(
            "keyserver_export_file_bytes",
            "region" => region.to_string()
        )
        .record(bytes as f64);
    }
}
