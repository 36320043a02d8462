use metrics::counter;

/// Counts acquire attempts by outcome (`acquired`, `locked`, `error`).
pub fn record_lock_attempt(lock_id: &str, outcome: &str) {
    counter!(
        "keyserver_lock_attempts_total",
        "lock_id" => lock_id.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
