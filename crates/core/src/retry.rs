//! Bounded-retry policy for queued notifications.

/// What the dispatch stage should do with one unsent notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Retry budget remains; attempt delivery.
    Attempt,
    /// Budget exhausted; leave the row unsent and untouched.
    Skip,
}

/// Decide whether a notification that has already failed `retry_count`
/// times may be attempted again.
///
/// Exhaustion is terminal: once `retry_count >= max_retry_count` the
/// notification is skipped on every later cycle.
pub fn decide(retry_count: i32, max_retry_count: u32) -> DispatchDecision {
    let attempts = u32::try_from(retry_count).unwrap_or(0);
    if attempts >= max_retry_count {
        DispatchDecision::Skip
    } else {
        DispatchDecision::Attempt
    }
}
