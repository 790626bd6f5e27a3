//! Validated threshold rule definitions.
//!
//! Rules are authored elsewhere; the pipeline rebuilds a [`RuleDefinition`]
//! from each persisted row through [`RuleDefinition::new`], which refuses rows
//! that violate the rule invariants instead of evaluating them.

use std::num::NonZeroU32;

use rust_decimal::Decimal;

use crate::error::CoreError;
use crate::operator::ComparisonOperator;
use crate::types::{DbId, LookupId};

/// Maximum length of a metric name in characters, matching the
/// `char_length` checks on `metrics.name` and `rules.metric_name`.
const MAX_METRIC_NAME_LEN: usize = 128;

/// Number of consecutive true evaluations needed to raise a signal (>= 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequiredBreaches(NonZeroU32);

impl RequiredBreaches {
    pub const ONE: RequiredBreaches = RequiredBreaches(NonZeroU32::MIN);

    pub fn new(value: i32) -> Result<Self, CoreError> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "required_consecutive_breaches must be at least 1, got {value}"
                ))
            })
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Where a triggered rule sends its notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTarget {
    pub channel_type_id: LookupId,
    pub address: String,
}

/// An evaluable threshold rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    id: DbId,
    tenant_id: DbId,
    asset_id: DbId,
    name: String,
    metric_name: String,
    operator: ComparisonOperator,
    threshold: Decimal,
    severity_id: LookupId,
    required: RequiredBreaches,
    target: NotificationTarget,
}

/// Raw inputs for [`RuleDefinition::new`].
#[derive(Debug, Clone)]
pub struct RuleParts {
    pub id: DbId,
    pub tenant_id: DbId,
    pub asset_id: DbId,
    pub name: String,
    pub metric_name: String,
    pub operator: ComparisonOperator,
    pub threshold: Decimal,
    pub severity_id: LookupId,
    pub required_consecutive_breaches: i32,
    pub target: NotificationTarget,
}

impl RuleDefinition {
    /// Build a rule, enforcing:
    /// - `required_consecutive_breaches >= 1`;
    /// - a non-empty metric name of at most 128 characters;
    /// - a non-empty notification address.
    pub fn new(parts: RuleParts) -> Result<Self, CoreError> {
        let required = RequiredBreaches::new(parts.required_consecutive_breaches)?;

        let metric_name = parts.metric_name.trim().to_string();
        if metric_name.is_empty() {
            return Err(CoreError::Validation(
                "Rule metric name must not be empty".to_string(),
            ));
        }
        if metric_name.chars().count() > MAX_METRIC_NAME_LEN {
            return Err(CoreError::Validation(format!(
                "Rule metric name must not exceed {MAX_METRIC_NAME_LEN} characters"
            )));
        }
        if parts.target.address.trim().is_empty() {
            return Err(CoreError::Validation(
                "Rule notification target must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: parts.id,
            tenant_id: parts.tenant_id,
            asset_id: parts.asset_id,
            name: parts.name,
            metric_name,
            operator: parts.operator,
            threshold: parts.threshold,
            severity_id: parts.severity_id,
            required,
            target: parts.target,
        })
    }

    pub fn id(&self) -> DbId {
        self.id
    }

    pub fn tenant_id(&self) -> DbId {
        self.tenant_id
    }

    pub fn asset_id(&self) -> DbId {
        self.asset_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub fn severity_id(&self) -> LookupId {
        self.severity_id
    }

    pub fn required(&self) -> RequiredBreaches {
        self.required
    }

    pub fn target(&self) -> &NotificationTarget {
        &self.target
    }

    /// Whether `value` breaches this rule.
    pub fn is_breached_by(&self, value: Decimal) -> bool {
        self.operator.evaluate(value, self.threshold)
    }

    /// Signal title, e.g. `"High CPU: cpu_usage > 90"`.
    pub fn signal_title(&self) -> String {
        format!(
            "{}: {} {} {}",
            self.name,
            self.metric_name,
            self.operator.symbol(),
            self.threshold
        )
    }

    /// Signal description for a breach observed at `value`.
    pub fn signal_description(&self, value: Decimal, asset_name: &str) -> String {
        let required = self.required.get();
        let plural = if required == 1 { "" } else { "s" };
        format!(
            "{} on asset {asset_name} reported {value}, which is {} the threshold {} \
             for {required} consecutive evaluation{plural}.",
            self.metric_name,
            operator_phrase(self.operator),
            self.threshold,
        )
    }
}

fn operator_phrase(op: ComparisonOperator) -> &'static str {
    match op {
        ComparisonOperator::Gt => "above",
        ComparisonOperator::Gte => "at or above",
        ComparisonOperator::Lt => "below",
        ComparisonOperator::Lte => "at or below",
        ComparisonOperator::Eq => "equal to",
        ComparisonOperator::Neq => "different from",
    }
}
