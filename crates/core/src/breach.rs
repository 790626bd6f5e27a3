//! Consecutive-breach hysteresis for threshold rules.
//!
//! One [`BreachState`] exists per `(tenant, rule)`. It is the only memory the
//! evaluation stage carries between ticks:
//!
//! ```text
//!            false                      true, n < required
//!   * ──────────────► NO_BREACH ───────────────────────────► BREACHING
//!                        ▲                                       │
//!                        │ counter reset        true, n == required
//!                        └──────────────── TRIGGERED ◄───────────┘
//! ```
//!
//! Reaching `required` fires exactly once and resets the counter, so a
//! sustained breach needs another full run of `required` true ticks before it
//! fires again.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CoreError;
use crate::rule::RequiredBreaches;

/// Coarse phase derived from the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachPhase {
    NoBreach,
    Breaching,
}

/// What a single observation did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreachTransition {
    /// Condition false; counter is back to zero.
    Cleared,
    /// Condition true but the run is still shorter than required.
    Breaching { consecutive: u32 },
    /// The run reached the required length. A signal must be raised; the
    /// counter has already been reset.
    Triggered,
}

impl BreachTransition {
    pub fn is_triggered(self) -> bool {
        matches!(self, Self::Triggered)
    }
}

/// Per-rule hysteresis counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreachState {
    consecutive_breaches: u32,
    last_value: Option<Decimal>,
}

impl BreachState {
    /// A fresh state, as created on a rule's first evaluation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state from its persisted columns.
    pub fn from_persisted(
        consecutive_breaches: i32,
        last_value: Option<Decimal>,
    ) -> Result<Self, CoreError> {
        let consecutive_breaches = u32::try_from(consecutive_breaches).map_err(|_| {
            CoreError::Validation(format!(
                "consecutive_breaches must not be negative, got {consecutive_breaches}"
            ))
        })?;
        Ok(Self {
            consecutive_breaches,
            last_value,
        })
    }

    pub fn consecutive_breaches(&self) -> u32 {
        self.consecutive_breaches
    }

    pub fn last_value(&self) -> Option<Decimal> {
        self.last_value
    }

    pub fn phase(&self) -> BreachPhase {
        if self.consecutive_breaches == 0 {
            BreachPhase::NoBreach
        } else {
            BreachPhase::Breaching
        }
    }

    /// Feed one evaluation result into the state machine.
    ///
    /// A counter already above `required` (the rule was edited to need fewer
    /// breaches mid-run) triggers on the next true observation.
    pub fn observe(
        &mut self,
        condition: bool,
        value: Decimal,
        required: RequiredBreaches,
    ) -> BreachTransition {
        self.last_value = Some(value);

        if !condition {
            self.consecutive_breaches = 0;
            return BreachTransition::Cleared;
        }

        self.consecutive_breaches = self.consecutive_breaches.saturating_add(1);
        if self.consecutive_breaches >= required.get() {
            self.consecutive_breaches = 0;
            BreachTransition::Triggered
        } else {
            BreachTransition::Breaching {
                consecutive: self.consecutive_breaches,
            }
        }
    }
}
