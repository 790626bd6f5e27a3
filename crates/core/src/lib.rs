//! Tripwire domain core.
//!
//! Pure, I/O-free building blocks shared by the persistence layer and the
//! alerting pipeline: identifiers, the breach state machine, comparison
//! operators, cursor arithmetic and the dispatch retry policy.

pub mod breach;
pub mod error;
pub mod lookup;
pub mod operator;
pub mod retry;
pub mod rule;
pub mod schedule;
pub mod tenant;
pub mod types;
