//! Rule evaluation stage.
//!
//! Applies every active rule to the latest value of its metric, advances the
//! rule's breach state and, when a breach run reaches the required length,
//! opens a signal and queues its notification.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tripwire_core::breach::{BreachState, BreachTransition};
use tripwire_core::lookup::{
    CATEGORY_OPERATOR, CATEGORY_SEVERITY, CATEGORY_SIGNAL_STATUS, SIGNAL_STATUS_OPEN,
};
use tripwire_core::operator::ComparisonOperator;
use tripwire_core::rule::{NotificationTarget, RuleDefinition, RuleParts};
use tripwire_core::tenant::TenantScope;
use tripwire_core::types::{DbId, LookupId, Timestamp};
use tripwire_db::models::notification::CreateNotification;
use tripwire_db::models::rule::ActiveRule;
use tripwire_db::models::signal::CreateSignal;

use crate::error::PipelineError;
use crate::lookup::LookupResolver;
use crate::payload::NotificationPayload;
use crate::store::{AlertStore, UnitOfWork};

/// Outcome of one evaluation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Rules whose condition was evaluated against a data point.
    pub rules_evaluated: u64,
    /// Rules with no data point yet; their breach state is untouched.
    pub rules_skipped: u64,
    /// Rules disabled because their asset was deactivated.
    pub rules_disabled: u64,
    pub signals_created: u64,
    pub errors: u64,
    pub cancelled: bool,
    pub duration: Duration,
}

impl EvaluationSummary {
    pub fn did_work(&self) -> bool {
        self.rules_evaluated > 0 || self.rules_disabled > 0 || self.errors > 0
    }
}

/// What happened to a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleOutcome {
    Disabled,
    NoData,
    Evaluated { signal_id: Option<DbId> },
}

pub struct EvaluationRunner {
    store: Arc<dyn AlertStore>,
    lookups: Arc<dyn LookupResolver>,
    scope: TenantScope,
}

impl EvaluationRunner {
    pub fn new(
        store: Arc<dyn AlertStore>,
        lookups: Arc<dyn LookupResolver>,
        scope: TenantScope,
    ) -> Self {
        Self {
            store,
            lookups,
            scope,
        }
    }

    /// Run one evaluation cycle over every active rule in scope.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<EvaluationSummary, PipelineError> {
        let started = Instant::now();
        let now = Utc::now();
        let mut summary = EvaluationSummary::default();

        let mut uow = self.store.begin(self.scope).await?;
        let rules = uow.active_rules().await?;

        if !rules.is_empty() {
            let open_status_id = self
                .lookups
                .resolve_id(CATEGORY_SIGNAL_STATUS, SIGNAL_STATUS_OPEN)
                .await?;

            for rule in &rules {
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    break;
                }

                uow.savepoint().await?;
                match self
                    .evaluate_rule(uow.as_mut(), rule, open_status_id, now)
                    .await
                {
                    Ok(outcome) => {
                        uow.release_savepoint().await?;
                        match outcome {
                            RuleOutcome::Disabled => summary.rules_disabled += 1,
                            RuleOutcome::NoData => summary.rules_skipped += 1,
                            RuleOutcome::Evaluated { signal_id } => {
                                summary.rules_evaluated += 1;
                                if signal_id.is_some() {
                                    summary.signals_created += 1;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        uow.rollback_to_savepoint().await?;
                        summary.errors += 1;
                        tracing::warn!(rule_id = rule.id, error = %e, "Rule evaluation failed");
                    }
                }
            }
        }

        uow.commit().await?;
        summary.duration = started.elapsed();
        Ok(summary)
    }

    async fn evaluate_rule(
        &self,
        uow: &mut dyn UnitOfWork,
        row: &ActiveRule,
        open_status_id: LookupId,
        now: Timestamp,
    ) -> Result<RuleOutcome, PipelineError> {
        if !row.asset_is_active {
            uow.disable_rule(row.id).await?;
            tracing::info!(
                rule_id = row.id,
                asset_id = row.asset_id,
                "Disabled rule for inactive asset",
            );
            return Ok(RuleOutcome::Disabled);
        }

        let Some(latest) = uow
            .latest_metric_value(row.tenant_id, row.asset_id, &row.metric_name)
            .await?
        else {
            tracing::debug!(
                rule_id = row.id,
                metric_name = %row.metric_name,
                "No data points yet, skipping rule",
            );
            return Ok(RuleOutcome::NoData);
        };

        let rule = self.rule_definition(row).await?;
        let value = latest.value;

        let persisted = uow.breach_state(row.tenant_id, row.id).await?;
        let mut state =
            BreachState::from_persisted(persisted.consecutive_breaches, persisted.last_value)?;
        let transition = state.observe(rule.is_breached_by(value), value, rule.required());

        let signal_id = match transition {
            BreachTransition::Triggered => {
                Some(self.raise_signal(uow, &rule, row, value, open_status_id, now).await?)
            }
            BreachTransition::Breaching { consecutive } => {
                tracing::debug!(
                    rule_id = row.id,
                    consecutive,
                    required = rule.required().get(),
                    "Rule breaching",
                );
                None
            }
            BreachTransition::Cleared => None,
        };

        uow.save_breach_state(row.tenant_id, row.id, &state).await?;
        Ok(RuleOutcome::Evaluated { signal_id })
    }

    async fn rule_definition(&self, row: &ActiveRule) -> Result<RuleDefinition, PipelineError> {
        let operator: ComparisonOperator = self
            .lookups
            .resolve_code(CATEGORY_OPERATOR, row.operator_id)
            .await?
            .parse()?;

        Ok(RuleDefinition::new(RuleParts {
            id: row.id,
            tenant_id: row.tenant_id,
            asset_id: row.asset_id,
            name: row.name.clone(),
            metric_name: row.metric_name.clone(),
            operator,
            threshold: row.threshold,
            severity_id: row.severity_id,
            required_consecutive_breaches: row.required_consecutive_breaches,
            target: NotificationTarget {
                channel_type_id: row.channel_type_id,
                address: row.notify_target.clone(),
            },
        })?)
    }

    /// Insert the signal, then its notification. The signal id comes back
    /// from the insert, so the notification always references a real row.
    async fn raise_signal(
        &self,
        uow: &mut dyn UnitOfWork,
        rule: &RuleDefinition,
        row: &ActiveRule,
        value: rust_decimal::Decimal,
        open_status_id: LookupId,
        now: Timestamp,
    ) -> Result<DbId, PipelineError> {
        let severity = self
            .lookups
            .resolve_code(CATEGORY_SEVERITY, rule.severity_id())
            .await?;

        let signal = CreateSignal {
            tenant_id: rule.tenant_id(),
            rule_id: rule.id(),
            asset_id: rule.asset_id(),
            status_id: open_status_id,
            title: rule.signal_title(),
            description: rule.signal_description(value, &row.asset_name),
            trigger_value: value,
            threshold: rule.threshold(),
            triggered_at: now,
        };
        let signal_id = uow.insert_signal(&signal).await?;

        let payload = NotificationPayload {
            signal_id,
            tenant_id: signal.tenant_id,
            rule_id: signal.rule_id,
            rule_name: rule.name().to_string(),
            asset_id: signal.asset_id,
            asset_name: row.asset_name.clone(),
            metric_name: rule.metric_name().to_string(),
            operator: rule.operator().code().to_string(),
            severity,
            title: signal.title,
            description: signal.description,
            trigger_value: value,
            threshold: signal.threshold,
            triggered_at: now,
            target: rule.target().address.clone(),
        };
        let notification_id = uow
            .insert_notification(&CreateNotification {
                tenant_id: rule.tenant_id(),
                signal_id,
                channel_type_id: rule.target().channel_type_id,
                payload: payload.to_json()?,
            })
            .await?;

        tracing::info!(
            rule_id = rule.id(),
            asset_id = rule.asset_id(),
            signal_id,
            notification_id,
            value = %value,
            threshold = %rule.threshold(),
            "Signal raised",
        );
        Ok(signal_id)
    }
}
