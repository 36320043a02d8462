use std::time::Duration;

use chrono::{DateTime, Utc};
use keyserver_domain::ExportWindow;

use super::ExportError;

fn period_seconds(period: Duration) -> Result<i64, ExportError> {
    match i64::try_from(period.as_secs()) {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(ExportError::Window(format!(
            "period {:?} is not a positive number of seconds",
            period
        ))),
    }
}

fn at(seconds: i64) -> Result<DateTime<Utc>, ExportError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ExportError::Window(format!("timestamp {} out of range", seconds)))
}

/// Start of the period-aligned window containing `timestamp`.
pub(super) fn truncate(timestamp: DateTime<Utc>, period: Duration) -> Result<DateTime<Utc>, ExportError> {
    let period = period_seconds(period)?;
    let seconds = timestamp.timestamp();
    at(seconds - seconds.rem_euclid(period))
}

/// End of the newest window that may be batched at `now`: windows ending
/// less than `grace` ago can still receive inserts stamped inside them.
pub(super) fn closed_until(
    now: DateTime<Utc>,
    period: Duration,
    grace: Duration,
) -> Result<DateTime<Utc>, ExportError> {
    let grace = i64::try_from(grace.as_secs())
        .map_err(|_| ExportError::Window(format!("ingest delay {:?} out of range", grace)))?;
    truncate(at(now.timestamp().saturating_sub(grace))?, period)
}

/// The window that contains `earliest`, counted in whole periods from
/// `cursor`. Requires `earliest >= cursor`.
pub(super) fn window_containing(
    cursor: DateTime<Utc>,
    earliest: DateTime<Utc>,
    period: Duration,
) -> Result<ExportWindow, ExportError> {
    let period = period_seconds(period)?;
    let offset = (earliest.timestamp() - cursor.timestamp()).max(0);
    let start = cursor.timestamp() + offset - offset % period;
    Ok(ExportWindow::new(at(start)?, at(start + period)?))
}
