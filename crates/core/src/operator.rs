//! Comparison operators used by threshold rules.
//!
//! Values and thresholds are [`Decimal`]s and compared exactly: `EQ` and
//! `NEQ` carry no tolerance, so `EQ` only holds when the metric reports the
//! threshold to the last digit.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lookup::CATEGORY_OPERATOR;

/// Operator applied as `value OP threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComparisonOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl ComparisonOperator {
    /// Every operator, in lookup seed order.
    pub const ALL: [ComparisonOperator; 6] = [
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Eq,
        Self::Neq,
    ];

    /// The lookup code stored for this operator (`"GT"`, `"GTE"`, ...).
    pub fn code(self) -> &'static str {
        match self {
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Lt => "LT",
            Self::Lte => "LTE",
            Self::Eq => "EQ",
            Self::Neq => "NEQ",
        }
    }

    /// Mathematical symbol, used in signal titles.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::Neq => "!=",
        }
    }

    /// Evaluate `value OP threshold`.
    pub fn evaluate(self, value: Decimal, threshold: Decimal) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
            Self::Eq => value == threshold,
            Self::Neq => value != threshold,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownCode {
                category: CATEGORY_OPERATOR,
                code: s.to_string(),
            })
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
