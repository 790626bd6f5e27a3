//! In-memory collaborators for driving the pipeline runners without a
//! database, metric gateway or mail server.
//!
//! [`MemoryStore`] mimics the transactional behaviour of the Postgres store:
//! each unit of work edits a private copy of the state, savepoints snapshot
//! that copy, and only `commit` publishes it.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tripwire_core::breach::BreachState;
use tripwire_core::lookup::{
    CATEGORY_CHANNEL_TYPE, CATEGORY_OPERATOR, CATEGORY_SEVERITY, CATEGORY_SIGNAL_STATUS,
};
use tripwire_core::tenant::TenantScope;
use tripwire_core::types::{DbId, LookupId, Timestamp};
use tripwire_db::models::asset::DueAsset;
use tripwire_db::models::breach_state::BreachStateRow;
use tripwire_db::models::metric::{CreateDataPoint, LatestMetricValue, MetricDefinition};
use tripwire_db::models::notification::{CreateNotification, Notification};
use tripwire_db::models::rule::ActiveRule;
use tripwire_db::models::signal::CreateSignal;
use tripwire_events::{ChannelKind, ChannelSender, DeliveryError, OutboundMessage};
use tripwire_pipeline::payload::NotificationPayload;
use tripwire_pipeline::{
    AlertStore, LookupTable, MetricSource, RawDataPoint, SourceAsset, SourceError, UnitOfWork,
};

// ---------------------------------------------------------------------------
// Lookup seeds
// ---------------------------------------------------------------------------

pub const OP_GT: LookupId = 1;
pub const OP_GTE: LookupId = 2;
pub const OP_LT: LookupId = 3;
pub const OP_LTE: LookupId = 4;
pub const OP_EQ: LookupId = 5;
pub const OP_NEQ: LookupId = 6;

pub const SEVERITY_CRITICAL: LookupId = 13;
pub const STATUS_OPEN: LookupId = 21;

pub const CHANNEL_EMAIL: LookupId = 31;
pub const CHANNEL_WEBHOOK: LookupId = 32;
pub const CHANNEL_CHAT: LookupId = 33;

/// Lookup ids deliberately differ from the seed migration so that nothing
/// depends on hard-coded ids.
pub fn lookups() -> Arc<LookupTable> {
    let mut table = LookupTable::default();
    for (id, code) in [
        (OP_GT, "GT"),
        (OP_GTE, "GTE"),
        (OP_LT, "LT"),
        (OP_LTE, "LTE"),
        (OP_EQ, "EQ"),
        (OP_NEQ, "NEQ"),
    ] {
        table.insert(CATEGORY_OPERATOR, code, id);
    }
    table.insert(CATEGORY_SEVERITY, "INFO", 11);
    table.insert(CATEGORY_SEVERITY, "WARNING", 12);
    table.insert(CATEGORY_SEVERITY, "CRITICAL", SEVERITY_CRITICAL);
    table.insert(CATEGORY_SIGNAL_STATUS, "OPEN", STATUS_OPEN);
    table.insert(CATEGORY_SIGNAL_STATUS, "RESOLVED", 22);
    table.insert(CATEGORY_CHANNEL_TYPE, "EMAIL", CHANNEL_EMAIL);
    table.insert(CATEGORY_CHANNEL_TYPE, "WEBHOOK", CHANNEL_WEBHOOK);
    table.insert(CATEGORY_CHANNEL_TYPE, "CHAT", CHANNEL_CHAT);
    Arc::new(table)
}

// ---------------------------------------------------------------------------
// Memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub asset: DueAsset,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct StoredRule {
    pub rule: ActiveRule,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct StoredDataPoint {
    pub metric_id: DbId,
    pub value: Decimal,
    pub recorded_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct StoredSignal {
    pub id: DbId,
    pub signal: CreateSignal,
}

/// Statements that should fail, keyed by the row they touch.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub latest_value_for_rule_metric: HashSet<String>,
    pub insert_points_for_metric: HashSet<DbId>,
    pub mark_sent: HashSet<DbId>,
    pub begin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub assets: Vec<StoredAsset>,
    pub metrics: Vec<MetricDefinition>,
    pub data_points: Vec<StoredDataPoint>,
    pub rules: Vec<StoredRule>,
    pub breach_states: HashMap<(DbId, DbId), BreachStateRow>,
    pub signals: Vec<StoredSignal>,
    pub notifications: Vec<Notification>,
    /// Mutating statements in issue order, e.g. `insert_signal:1`.
    pub ops: Vec<String>,
    pub commits: u32,
    next_id: DbId,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<Faults>>,
}

fn injected(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected failure: {what}"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    pub fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap()
    }

    pub fn with_state(&self, edit: impl FnOnce(&mut MemoryState)) {
        edit(&mut self.state.lock().unwrap());
    }

    // -- seeding ------------------------------------------------------------

    pub fn add_asset(&self, tenant_id: DbId, source: &str, due_in_secs: i64) -> DbId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.assets.push(StoredAsset {
            asset: DueAsset {
                id,
                tenant_id,
                name: format!("asset-{id}"),
                data_source_code: source.to_string(),
                external_ref: format!("ext-{id}"),
                collection_interval_secs: 60,
                next_due_at: Utc::now() + Duration::seconds(due_in_secs),
            },
            is_active: true,
        });
        id
    }

    pub fn set_asset_active(&self, asset_id: DbId, is_active: bool) {
        let mut state = self.state.lock().unwrap();
        for stored in state.assets.iter_mut().filter(|a| a.asset.id == asset_id) {
            stored.is_active = is_active;
        }
        for stored in state.rules.iter_mut().filter(|r| r.rule.asset_id == asset_id) {
            stored.rule.asset_is_active = is_active;
        }
    }

    pub fn asset(&self, asset_id: DbId) -> DueAsset {
        self.snapshot()
            .assets
            .into_iter()
            .find(|a| a.asset.id == asset_id)
            .map(|a| a.asset)
            .expect("asset seeded")
    }

    pub fn add_metric(&self, asset_id: DbId, name: &str) -> DbId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.metrics.push(MetricDefinition {
            id,
            asset_id,
            name: name.to_string(),
            metric_type: "gauge".to_string(),
            is_active: true,
        });
        id
    }

    pub fn add_data_point(&self, metric_id: DbId, value: Decimal) {
        let mut state = self.state.lock().unwrap();
        let recorded_at = Utc::now() + Duration::milliseconds(state.data_points.len() as i64);
        state.data_points.push(StoredDataPoint {
            metric_id,
            value,
            recorded_at,
        });
    }

    pub fn add_rule(&self, seed: RuleSeed) -> DbId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let asset = state
            .assets
            .iter()
            .find(|a| a.asset.id == seed.asset_id)
            .cloned()
            .expect("asset seeded before rule");
        state.rules.push(StoredRule {
            rule: ActiveRule {
                id,
                tenant_id: asset.asset.tenant_id,
                asset_id: seed.asset_id,
                asset_name: asset.asset.name,
                asset_is_active: asset.is_active,
                name: seed.name,
                metric_name: seed.metric_name,
                operator_id: seed.operator_id,
                threshold: seed.threshold,
                severity_id: SEVERITY_CRITICAL,
                frequency_id: 1,
                required_consecutive_breaches: seed.required,
                channel_type_id: seed.channel_type_id,
                notify_target: seed.target,
            },
            is_active: true,
        });
        id
    }

    pub fn set_breach_count(&self, tenant_id: DbId, rule_id: DbId, consecutive: i32) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let now = Utc::now();
        state.breach_states.insert(
            (tenant_id, rule_id),
            BreachStateRow {
                id,
                tenant_id,
                rule_id,
                consecutive_breaches: consecutive,
                last_value: None,
                last_evaluated_at: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn breach_count(&self, tenant_id: DbId, rule_id: DbId) -> Option<i32> {
        self.snapshot()
            .breach_states
            .get(&(tenant_id, rule_id))
            .map(|row| row.consecutive_breaches)
    }

    pub fn rule_is_active(&self, rule_id: DbId) -> bool {
        self.snapshot()
            .rules
            .iter()
            .any(|r| r.rule.id == rule_id && r.is_active)
    }

    /// Queue a notification directly, as evaluation would have.
    pub fn add_notification(&self, tenant_id: DbId, channel_type_id: LookupId, retry_count: i32) -> DbId {
        let mut state = self.state.lock().unwrap();
        let signal_id = state.next_id();
        let id = state.next_id();
        let payload = NotificationPayload {
            signal_id,
            tenant_id,
            rule_id: 1,
            rule_name: "High CPU".to_string(),
            asset_id: 1,
            asset_name: "web-01".to_string(),
            metric_name: "cpu_usage".to_string(),
            operator: "GT".to_string(),
            severity: "CRITICAL".to_string(),
            title: "High CPU: cpu_usage > 90".to_string(),
            description: "cpu_usage on asset web-01 reported 95".to_string(),
            trigger_value: Decimal::from(95),
            threshold: Decimal::from(90),
            triggered_at: Utc::now(),
            target: format!("https://hooks.example.com/{id}"),
        };
        state.notifications.push(Notification {
            id,
            tenant_id,
            signal_id,
            channel_type_id,
            payload: payload.to_json().unwrap(),
            is_sent: false,
            retry_count,
            last_error: None,
            last_attempt_at: None,
            sent_at: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn notification(&self, id: DbId) -> Notification {
        self.snapshot()
            .notifications
            .into_iter()
            .find(|n| n.id == id)
            .expect("notification exists")
    }
}

/// Inputs for [`MemoryStore::add_rule`].
pub struct RuleSeed {
    pub asset_id: DbId,
    pub name: String,
    pub metric_name: String,
    pub operator_id: LookupId,
    pub threshold: Decimal,
    pub required: i32,
    pub channel_type_id: LookupId,
    pub target: String,
}

impl RuleSeed {
    pub fn gt(asset_id: DbId, metric_name: &str, threshold: Decimal, required: i32) -> Self {
        Self {
            asset_id,
            name: "High value".to_string(),
            metric_name: metric_name.to_string(),
            operator_id: OP_GT,
            threshold,
            required,
            channel_type_id: CHANNEL_WEBHOOK,
            target: "https://hooks.example.com/alerts".to_string(),
        }
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn begin(&self, scope: TenantScope) -> Result<Box<dyn UnitOfWork>, sqlx::Error> {
        if self.faults().begin {
            return Err(injected("begin"));
        }
        let working = self.snapshot();
        Ok(Box::new(MemoryUnitOfWork {
            shared: self.state.clone(),
            faults: self.faults.lock().unwrap().clone(),
            working,
            savepoint: None,
            scope,
        }))
    }
}

pub struct MemoryUnitOfWork {
    shared: Arc<Mutex<MemoryState>>,
    faults: Faults,
    working: MemoryState,
    savepoint: Option<MemoryState>,
    scope: TenantScope,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn scope(&self) -> TenantScope {
        self.scope
    }

    async fn savepoint(&mut self) -> Result<(), sqlx::Error> {
        self.savepoint = Some(self.working.clone());
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), sqlx::Error> {
        self.savepoint.take().map(|_| ()).ok_or_else(|| injected("no savepoint"))
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), sqlx::Error> {
        let saved = self.savepoint.take().ok_or_else(|| injected("no savepoint"))?;
        self.working = saved;
        Ok(())
    }

    async fn due_assets(
        &mut self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<DueAsset>, sqlx::Error> {
        let mut due: Vec<DueAsset> = self
            .working
            .assets
            .iter()
            .filter(|a| a.is_active && a.asset.next_due_at <= now)
            .filter(|a| self.scope.includes(a.asset.tenant_id))
            .map(|a| a.asset.clone())
            .collect();
        due.sort_by_key(|a| (a.next_due_at, a.id));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn active_metrics(
        &mut self,
        asset_ids: &[DbId],
    ) -> Result<Vec<MetricDefinition>, sqlx::Error> {
        Ok(self
            .working
            .metrics
            .iter()
            .filter(|m| m.is_active && asset_ids.contains(&m.asset_id))
            .cloned()
            .collect())
    }

    async fn insert_data_points(&mut self, points: &[CreateDataPoint]) -> Result<u64, sqlx::Error> {
        if let Some(point) = points
            .iter()
            .find(|p| self.faults.insert_points_for_metric.contains(&p.metric_id))
        {
            return Err(injected(&format!("insert points for metric {}", point.metric_id)));
        }
        for point in points {
            self.working.data_points.push(StoredDataPoint {
                metric_id: point.metric_id,
                value: point.value,
                recorded_at: point.recorded_at,
            });
            self.working
                .ops
                .push(format!("insert_data_point:{}", point.metric_id));
        }
        Ok(points.len() as u64)
    }

    async fn advance_cursor(
        &mut self,
        asset_id: DbId,
        next_due_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        let stored = self
            .working
            .assets
            .iter_mut()
            .find(|a| a.asset.id == asset_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        stored.asset.next_due_at = next_due_at;
        self.working.ops.push(format!("advance_cursor:{asset_id}"));
        Ok(())
    }

    async fn active_rules(&mut self) -> Result<Vec<ActiveRule>, sqlx::Error> {
        let mut rules: Vec<ActiveRule> = self
            .working
            .rules
            .iter()
            .filter(|r| r.is_active && self.scope.includes(r.rule.tenant_id))
            .map(|r| r.rule.clone())
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn disable_rule(&mut self, rule_id: DbId) -> Result<(), sqlx::Error> {
        for stored in self.working.rules.iter_mut().filter(|r| r.rule.id == rule_id) {
            stored.is_active = false;
        }
        self.working.ops.push(format!("disable_rule:{rule_id}"));
        Ok(())
    }

    async fn latest_metric_value(
        &mut self,
        tenant_id: DbId,
        asset_id: DbId,
        metric_name: &str,
    ) -> Result<Option<LatestMetricValue>, sqlx::Error> {
        if self.faults.latest_value_for_rule_metric.contains(metric_name) {
            return Err(injected(&format!("latest value of {metric_name}")));
        }
        let owned = self
            .working
            .assets
            .iter()
            .any(|a| a.asset.id == asset_id && a.asset.tenant_id == tenant_id);
        if !owned {
            return Ok(None);
        }
        let Some(metric) = self
            .working
            .metrics
            .iter()
            .find(|m| m.asset_id == asset_id && m.name == metric_name)
        else {
            return Ok(None);
        };
        Ok(self
            .working
            .data_points
            .iter()
            .filter(|p| p.metric_id == metric.id)
            .max_by_key(|p| p.recorded_at)
            .map(|p| LatestMetricValue {
                metric_id: p.metric_id,
                value: p.value,
                recorded_at: p.recorded_at,
            }))
    }

    async fn breach_state(
        &mut self,
        tenant_id: DbId,
        rule_id: DbId,
    ) -> Result<BreachStateRow, sqlx::Error> {
        if let Some(row) = self.working.breach_states.get(&(tenant_id, rule_id)) {
            return Ok(row.clone());
        }
        let now = Utc::now();
        let row = BreachStateRow {
            id: self.working.next_id(),
            tenant_id,
            rule_id,
            consecutive_breaches: 0,
            last_value: None,
            last_evaluated_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working
            .breach_states
            .insert((tenant_id, rule_id), row.clone());
        Ok(row)
    }

    async fn save_breach_state(
        &mut self,
        tenant_id: DbId,
        rule_id: DbId,
        state: &BreachState,
    ) -> Result<(), sqlx::Error> {
        let row = self
            .working
            .breach_states
            .get_mut(&(tenant_id, rule_id))
            .ok_or(sqlx::Error::RowNotFound)?;
        row.consecutive_breaches = state.consecutive_breaches() as i32;
        row.last_value = state.last_value();
        row.last_evaluated_at = Some(Utc::now());
        self.working.ops.push(format!("save_breach_state:{rule_id}"));
        Ok(())
    }

    async fn insert_signal(&mut self, signal: &CreateSignal) -> Result<DbId, sqlx::Error> {
        let id = self.working.next_id();
        self.working.signals.push(StoredSignal {
            id,
            signal: signal.clone(),
        });
        self.working.ops.push(format!("insert_signal:{id}"));
        Ok(id)
    }

    async fn insert_notification(
        &mut self,
        notification: &CreateNotification,
    ) -> Result<DbId, sqlx::Error> {
        if !self
            .working
            .signals
            .iter()
            .any(|s| s.id == notification.signal_id)
        {
            return Err(injected("notification references a missing signal"));
        }
        let id = self.working.next_id();
        self.working.notifications.push(Notification {
            id,
            tenant_id: notification.tenant_id,
            signal_id: notification.signal_id,
            channel_type_id: notification.channel_type_id,
            payload: notification.payload.clone(),
            is_sent: false,
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
            sent_at: None,
            created_at: Utc::now(),
        });
        self.working
            .ops
            .push(format!("insert_notification:{}", notification.signal_id));
        Ok(id)
    }

    async fn unsent_notifications(
        &mut self,
        max_retry_count: i32,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let mut pending: Vec<Notification> = self
            .working
            .notifications
            .iter()
            .filter(|n| !n.is_sent && self.scope.includes(n.tenant_id))
            .cloned()
            .collect();
        pending.sort_by_key(|n| (n.retry_count >= max_retry_count, n.id));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_sent(&mut self, notification_id: DbId) -> Result<(), sqlx::Error> {
        if self.faults.mark_sent.contains(&notification_id) {
            return Err(injected(&format!("mark_sent {notification_id}")));
        }
        let row = self
            .working
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        let now = Utc::now();
        row.is_sent = true;
        row.sent_at = Some(now);
        row.last_attempt_at = Some(now);
        self.working.ops.push(format!("mark_sent:{notification_id}"));
        Ok(())
    }

    async fn record_failure(
        &mut self,
        notification_id: DbId,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        let row = self
            .working
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        row.retry_count += 1;
        row.last_error = Some(reason.to_string());
        row.last_attempt_at = Some(Utc::now());
        self.working
            .ops
            .push(format!("record_failure:{notification_id}"));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        let mut working = self.working;
        working.commits += 1;
        *self.shared.lock().unwrap() = working;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Metric source
// ---------------------------------------------------------------------------

/// Answers each pull with the data points scripted for its source code.
#[derive(Default)]
pub struct FakeSource {
    points: Mutex<HashMap<String, Vec<RawDataPoint>>>,
    failing: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<(String, Vec<SourceAsset>)>>,
}

impl FakeSource {
    pub fn respond(&self, source: &str, asset_id: DbId, metric_name: &str, value: Decimal) {
        self.points
            .lock()
            .unwrap()
            .entry(source.to_string())
            .or_default()
            .push(RawDataPoint {
                asset_id,
                metric_name: metric_name.to_string(),
                value,
                recorded_at: Utc::now(),
            });
    }

    pub fn fail(&self, source: &str) {
        self.failing.lock().unwrap().insert(source.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    async fn pull(
        &self,
        source_code: &str,
        assets: &[SourceAsset],
    ) -> Result<Vec<RawDataPoint>, SourceError> {
        self.calls
            .lock()
            .unwrap()
            .push((source_code.to_string(), assets.to_vec()));
        if self.failing.lock().unwrap().contains(source_code) {
            return Err(SourceError::HttpStatus(503));
        }
        Ok(self
            .points
            .lock()
            .unwrap()
            .get(source_code)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Channel sender
// ---------------------------------------------------------------------------

/// Records every delivery; targets listed in `failing` are refused.
#[derive(Default)]
pub struct FakeSender {
    failing: Mutex<HashSet<String>>,
    hang: Mutex<bool>,
    pub delivered: Mutex<Vec<(ChannelKind, OutboundMessage)>>,
    pub attempts: Mutex<Vec<i64>>,
}

impl FakeSender {
    pub fn fail_target(&self, target: &str) {
        self.failing.lock().unwrap().insert(target.to_string());
    }

    /// Make every send block until the caller gives up.
    pub fn hang(&self) {
        *self.hang.lock().unwrap() = true;
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelSender for FakeSender {
    async fn send(&self, kind: ChannelKind, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.attempts.lock().unwrap().push(message.notification_id);
        let hang = *self.hang.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().unwrap().contains(&message.target) {
            return Err(DeliveryError::Unavailable(kind));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((kind, message.clone()));
        Ok(())
    }
}
