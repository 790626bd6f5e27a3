//! External delivery transports for queued notifications.
//!
//! Each transport performs exactly one attempt per call; retry accounting
//! belongs to the dispatch stage.

pub mod chat;
pub mod email;
pub mod webhook;
