//! Notification dispatch stage.
//!
//! Delivers queued notifications through their channel. A failed attempt
//! consumes one unit of retry budget; once the budget is spent the
//! notification stays unsent and is skipped on every later cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tripwire_core::lookup::CATEGORY_CHANNEL_TYPE;
use tripwire_core::retry::{self, DispatchDecision};
use tripwire_core::tenant::TenantScope;
use tripwire_db::models::notification::Notification;
use tripwire_events::{ChannelKind, ChannelSender, OutboundMessage};

use crate::error::PipelineError;
use crate::lookup::{LookupError, LookupResolver};
use crate::payload::NotificationPayload;
use crate::store::{AlertStore, UnitOfWork};

/// Longest failure reason stored in `notifications.last_error`.
const MAX_ERROR_LEN: usize = 1000;

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: u64,
    /// Attempts that failed and consumed retry budget.
    pub failed: u64,
    /// Notifications whose retry budget is exhausted.
    pub skipped: u64,
    /// Notifications whose outcome could not be recorded.
    pub errors: u64,
    pub cancelled: bool,
    pub duration: Duration,
}

impl DispatchSummary {
    pub fn did_work(&self) -> bool {
        self.sent > 0 || self.failed > 0 || self.errors > 0
    }
}

/// Result of one delivery attempt.
enum Attempt {
    Delivered,
    Failed(PipelineError),
    Cancelled,
}

pub struct DispatchRunner {
    store: Arc<dyn AlertStore>,
    lookups: Arc<dyn LookupResolver>,
    sender: Arc<dyn ChannelSender>,
    scope: TenantScope,
}

impl DispatchRunner {
    pub fn new(
        store: Arc<dyn AlertStore>,
        lookups: Arc<dyn LookupResolver>,
        sender: Arc<dyn ChannelSender>,
        scope: TenantScope,
    ) -> Self {
        Self {
            store,
            lookups,
            sender,
            scope,
        }
    }

    /// Run one dispatch cycle over at most `max_notifications` unsent rows.
    pub async fn run(
        &self,
        max_notifications: u32,
        max_retry_count: u32,
        cancel: &CancellationToken,
    ) -> Result<DispatchSummary, PipelineError> {
        let started = Instant::now();
        let mut summary = DispatchSummary::default();

        let mut uow = self.store.begin(self.scope).await?;
        let pending = uow
            .unsent_notifications(
                i32::try_from(max_retry_count).unwrap_or(i32::MAX),
                i64::from(max_notifications),
            )
            .await?;

        for notification in &pending {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            if retry::decide(notification.retry_count, max_retry_count) == DispatchDecision::Skip {
                tracing::debug!(
                    notification_id = notification.id,
                    retry_count = notification.retry_count,
                    "Retry budget exhausted, skipping notification",
                );
                summary.skipped += 1;
                continue;
            }

            let attempt = self.attempt(notification, cancel).await;
            if matches!(attempt, Attempt::Cancelled) {
                tracing::info!(
                    notification_id = notification.id,
                    "Delivery interrupted by shutdown",
                );
                summary.cancelled = true;
                break;
            }

            uow.savepoint().await?;
            match record(uow.as_mut(), notification, attempt).await {
                Ok(true) => {
                    uow.release_savepoint().await?;
                    summary.sent += 1;
                }
                Ok(false) => {
                    uow.release_savepoint().await?;
                    summary.failed += 1;
                }
                Err(e) => {
                    uow.rollback_to_savepoint().await?;
                    summary.errors += 1;
                    tracing::warn!(
                        notification_id = notification.id,
                        error = %e,
                        "Failed to record delivery outcome",
                    );
                }
            }
        }

        uow.commit().await?;
        summary.duration = started.elapsed();
        Ok(summary)
    }

    async fn attempt(&self, notification: &Notification, cancel: &CancellationToken) -> Attempt {
        let (kind, message) = match self.prepare(notification).await {
            Ok(prepared) => prepared,
            Err(e) => return Attempt::Failed(e),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Attempt::Cancelled,
            result = self.sender.send(kind, &message) => match result {
                Ok(()) => Attempt::Delivered,
                Err(e) => Attempt::Failed(e.into()),
            },
        }
    }

    async fn prepare(
        &self,
        notification: &Notification,
    ) -> Result<(ChannelKind, OutboundMessage), PipelineError> {
        let kind: ChannelKind = self
            .lookups
            .resolve_code(CATEGORY_CHANNEL_TYPE, notification.channel_type_id)
            .await?
            .parse()?;
        let payload = NotificationPayload::from_json(&notification.payload)?;
        let message = payload.into_message(notification.id, notification.payload.clone());
        Ok((kind, message))
    }
}

/// Persist an attempt's outcome. Returns `true` when the notification was
/// delivered.
async fn record(
    uow: &mut dyn UnitOfWork,
    notification: &Notification,
    attempt: Attempt,
) -> Result<bool, PipelineError> {
    match attempt {
        Attempt::Delivered => {
            uow.mark_sent(notification.id).await?;
            tracing::info!(notification_id = notification.id, "Notification sent");
            Ok(true)
        }
        // Lookup table unreachable: not the notification's fault, keep its budget.
        Attempt::Failed(PipelineError::Lookup(LookupError::Database(e))) => {
            Err(PipelineError::Lookup(LookupError::Database(e)))
        }
        Attempt::Failed(e) => {
            let reason = truncate(&e.to_string(), MAX_ERROR_LEN);
            uow.record_failure(notification.id, &reason).await?;
            tracing::warn!(
                notification_id = notification.id,
                retry_count = notification.retry_count + 1,
                error = %reason,
                "Notification delivery failed",
            );
            Ok(false)
        }
        Attempt::Cancelled => Ok(false),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
