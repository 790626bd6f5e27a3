//! One cycle of each stage, wrapped with a span and its summary log line.
//!
//! Every cycle gets a fresh `cycle_id` so that the item-level warnings a
//! runner emits can be tied back to the summary that counted them.

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tripwire_pipeline::{
    DispatchRunner, EvaluationRunner, IngestionRunner, PipelineError,
};
use uuid::Uuid;

use crate::config::{DispatchConfig, IngestionConfig};

fn cycle_span(stage: &'static str) -> tracing::Span {
    tracing::info_span!("cycle", stage, cycle_id = %Uuid::now_v7())
}

fn log_cycle_error(stage: &'static str, error: &PipelineError) {
    tracing::error!(stage, error = %error, "Cycle failed, retrying on next tick");
}

pub async fn ingestion_cycle(
    runner: &IngestionRunner,
    config: &IngestionConfig,
    cancel: CancellationToken,
) {
    async {
        match runner.run(config.max_items_per_tick, &cancel).await {
            Ok(summary) => {
                let duration_ms = summary.duration.as_millis() as u64;
                if summary.did_work() {
                    tracing::info!(
                        assets_processed = summary.assets_processed,
                        data_points_created = summary.data_points_created,
                        errors = summary.errors,
                        cancelled = summary.cancelled,
                        duration_ms,
                        "Ingestion cycle complete",
                    );
                } else {
                    tracing::debug!(duration_ms, "Ingestion cycle: no assets due");
                }
            }
            Err(e) => log_cycle_error("ingestion", &e),
        }
    }
    .instrument(cycle_span("ingestion"))
    .await
}

pub async fn evaluation_cycle(runner: &EvaluationRunner, cancel: CancellationToken) {
    async {
        match runner.run(&cancel).await {
            Ok(summary) => {
                let duration_ms = summary.duration.as_millis() as u64;
                if summary.did_work() {
                    tracing::info!(
                        rules_evaluated = summary.rules_evaluated,
                        rules_skipped = summary.rules_skipped,
                        rules_disabled = summary.rules_disabled,
                        signals_created = summary.signals_created,
                        errors = summary.errors,
                        cancelled = summary.cancelled,
                        duration_ms,
                        "Evaluation cycle complete",
                    );
                } else {
                    tracing::debug!(
                        rules_skipped = summary.rules_skipped,
                        duration_ms,
                        "Evaluation cycle: nothing to evaluate",
                    );
                }
            }
            Err(e) => log_cycle_error("evaluation", &e),
        }
    }
    .instrument(cycle_span("evaluation"))
    .await
}

pub async fn dispatch_cycle(
    runner: &DispatchRunner,
    config: &DispatchConfig,
    cancel: CancellationToken,
) {
    async {
        match runner
            .run(config.max_items_per_tick, config.max_retry_count, &cancel)
            .await
        {
            Ok(summary) => {
                let duration_ms = summary.duration.as_millis() as u64;
                if summary.did_work() {
                    tracing::info!(
                        sent = summary.sent,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        errors = summary.errors,
                        cancelled = summary.cancelled,
                        duration_ms,
                        "Dispatch cycle complete",
                    );
                } else {
                    tracing::debug!(
                        skipped = summary.skipped,
                        duration_ms,
                        "Dispatch cycle: nothing to send",
                    );
                }
            }
            Err(e) => log_cycle_error("dispatch", &e),
        }
    }
    .instrument(cycle_span("dispatch"))
    .await
}
