use std::time::Duration;

use metrics::{counter, histogram};

pub fn record_http_request(route: &str, status: u16, duration: Duration) {
    counter!(
        "keyserver_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "keyserver_http_request_duration_seconds",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}
