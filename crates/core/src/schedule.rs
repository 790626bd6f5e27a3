//! Ingestion cursor arithmetic.

use chrono::Duration;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Compute an asset's next collection time after a successful pull.
///
/// The cursor advances by one interval from its previous due time so that
/// collection stays on the asset's own cadence. If the asset was overdue by
/// more than a full interval the cursor restarts from `now` instead of
/// scheduling a burst of catch-up pulls.
pub fn next_due_at(
    previous_due: Timestamp,
    interval_secs: i32,
    now: Timestamp,
) -> Result<Timestamp, CoreError> {
    if interval_secs <= 0 {
        return Err(CoreError::Validation(format!(
            "collection_interval_secs must be positive, got {interval_secs}"
        )));
    }
    let interval = Duration::seconds(i64::from(interval_secs));
    let next = previous_due + interval;
    if next > now {
        Ok(next)
    } else {
        Ok(now + interval)
    }
}
