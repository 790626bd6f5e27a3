//! The Tripwire worker process: configuration, logging and stage wiring.

pub mod config;
pub mod logging;
pub mod stages;
