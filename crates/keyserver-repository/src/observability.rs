use std::{future::Future, time::Duration, time::Instant};

use metrics::{counter, histogram};

use crate::error::Result;

pub(crate) fn record_repository_query(
    repository: &str,
    method: &str,
    status: &str,
    duration: Duration,
    rows: Option<usize>,
) {
    counter!(
        "keyserver_repository_query_total",
        "repository" => repository.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "keyserver_repository_query_duration_seconds",
        "repository" => repository.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    if let Some(rows) = rows {
        histogram!(
            "keyserver_repository_query_rows",
            "repository" => repository.to_string(),
            "method" => method.to_string(),
            "status" => status.to_string()
        )
        .record(rows as f64);
    }
}

/// Runs a repository call and records its outcome and latency.
pub(crate) async fn observed<T, F>(repository: &str, method: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = call.await;
    let status = match &result {
        Ok(_) => "ok",
        Err(error) => error.kind(),
    };
    record_repository_query(repository, method, status, started.elapsed(), None);
    result
}
