//! The Tripwire alerting pipeline.
//!
//! Three stateless stages, each driven by its own [`TickScheduler`]:
//!
//! - [`IngestionRunner`] pulls metrics for assets whose cursor is due.
//! - [`EvaluationRunner`] applies every active rule to the latest value and
//!   raises signals through the breach state machine.
//! - [`DispatchRunner`] delivers queued notifications with bounded retry.
//!
//! Stages share no in-process state; they coordinate only through the rows
//! they read and write via an [`AlertStore`]. Several instances may run the
//! same stage at once. Nothing here takes a lock, so a signal can be raised
//! twice when two instances evaluate the same rule against the same breach
//! state (at-least-once semantics).

pub mod dispatch;
pub mod error;
pub mod evaluation;
pub mod ingestion;
pub mod lookup;
pub mod payload;
pub mod scheduler;
pub mod source;
pub mod store;

pub use dispatch::{DispatchRunner, DispatchSummary};
pub use error::PipelineError;
pub use evaluation::{EvaluationRunner, EvaluationSummary};
pub use ingestion::{IngestionRunner, IngestionSummary};
pub use lookup::{CachedLookupResolver, LookupError, LookupResolver, LookupTable};
pub use scheduler::TickScheduler;
pub use source::{
    HttpMetricSource, MetricSource, RawDataPoint, SourceAsset, SourceError, DEFAULT_SOURCE_TIMEOUT,
};
pub use store::postgres::PgAlertStore;
pub use store::{AlertStore, UnitOfWork};
