//! Row models and insert DTOs.

pub mod asset;
pub mod breach_state;
pub mod lookup;
pub mod metric;
pub mod notification;
pub mod rule;
pub mod signal;
