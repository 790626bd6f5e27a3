//! The JSON document stored on every queued notification.
//!
//! Evaluation snapshots everything a channel needs at trigger time, so
//! dispatch never re-reads the rule or asset and later edits do not change
//! notifications already queued.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tripwire_core::types::{DbId, Timestamp};
use tripwire_events::OutboundMessage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub signal_id: DbId,
    pub tenant_id: DbId,
    pub rule_id: DbId,
    pub rule_name: String,
    pub asset_id: DbId,
    pub asset_name: String,
    pub metric_name: String,
    pub operator: String,
    pub severity: String,
    pub title: String,
    pub description: String,
    pub trigger_value: Decimal,
    pub threshold: Decimal,
    pub triggered_at: Timestamp,
    /// Email address or URL, depending on the channel.
    pub target: String,
}

impl NotificationPayload {
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Build the channel-neutral message for one delivery attempt.
    pub fn into_message(self, notification_id: DbId, raw: serde_json::Value) -> OutboundMessage {
        OutboundMessage {
            notification_id,
            target: self.target,
            subject: format!("[{}] {}", self.severity, self.title),
            body: self.description,
            payload: raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn payload() -> NotificationPayload {
        NotificationPayload {
            signal_id: 11,
            tenant_id: 1,
            rule_id: 5,
            rule_name: "High CPU".to_string(),
            asset_id: 3,
            asset_name: "web-01".to_string(),
            metric_name: "cpu_usage".to_string(),
            operator: "GT".to_string(),
            severity: "CRITICAL".to_string(),
            title: "High CPU: cpu_usage > 90".to_string(),
            description: "cpu_usage on asset web-01 reported 95".to_string(),
            trigger_value: dec!(95),
            threshold: dec!(90),
            triggered_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            target: "ops@example.com".to_string(),
        }
    }

    #[test]
    fn message_carries_target_and_severity_subject() {
        let raw = payload().to_json().unwrap();
        let message = payload().into_message(42, raw.clone());

        assert_eq!(message.notification_id, 42);
        assert_eq!(message.target, "ops@example.com");
        assert_eq!(message.subject, "[CRITICAL] High CPU: cpu_usage > 90");
        assert_eq!(message.payload, raw);
    }

    #[test]
    fn stored_payload_reads_back() {
        let raw = payload().to_json().unwrap();
        assert_eq!(raw["signal_id"], 11);
        assert_eq!(NotificationPayload::from_json(&raw).unwrap(), payload());
    }

    #[test]
    fn payload_missing_target_is_rejected() {
        let mut raw = payload().to_json().unwrap();
        raw.as_object_mut().unwrap().remove("target");
        assert!(NotificationPayload::from_json(&raw).is_err());
    }
}
