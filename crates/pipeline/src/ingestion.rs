//! Metric ingestion stage.
//!
//! Pulls values for every asset whose cursor has come due, appends them as
//! data points and moves each asset's cursor forward on its own cadence.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tripwire_core::schedule;
use tripwire_core::tenant::TenantScope;
use tripwire_core::types::{DbId, Timestamp};
use tripwire_db::models::asset::DueAsset;
use tripwire_db::models::metric::CreateDataPoint;

use crate::error::PipelineError;
use crate::source::{MetricSource, RawDataPoint, SourceAsset};
use crate::store::{AlertStore, UnitOfWork};

/// Outcome of one ingestion cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    pub assets_processed: u64,
    pub data_points_created: u64,
    /// Assets whose pull or persistence failed; their cursors did not move.
    pub errors: u64,
    pub cancelled: bool,
    pub duration: Duration,
}

impl IngestionSummary {
    pub fn did_work(&self) -> bool {
        self.assets_processed > 0 || self.errors > 0
    }
}

pub struct IngestionRunner {
    store: Arc<dyn AlertStore>,
    source: Arc<dyn MetricSource>,
    scope: TenantScope,
}

impl IngestionRunner {
    pub fn new(
        store: Arc<dyn AlertStore>,
        source: Arc<dyn MetricSource>,
        scope: TenantScope,
    ) -> Self {
        Self {
            store,
            source,
            scope,
        }
    }

    /// Run one ingestion cycle over at most `max_assets` due assets.
    pub async fn run(
        &self,
        max_assets: u32,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary, PipelineError> {
        let started = Instant::now();
        let now = Utc::now();
        let mut summary = IngestionSummary::default();

        let mut uow = self.store.begin(self.scope).await?;
        let assets = uow.due_assets(now, i64::from(max_assets)).await?;

        if !assets.is_empty() {
            let asset_ids: Vec<DbId> = assets.iter().map(|a| a.id).collect();
            let mut metrics_by_asset: HashMap<DbId, HashMap<String, DbId>> = HashMap::new();
            for metric in uow.active_metrics(&asset_ids).await? {
                metrics_by_asset
                    .entry(metric.asset_id)
                    .or_default()
                    .insert(metric.name, metric.id);
            }

            let mut groups: BTreeMap<String, Vec<DueAsset>> = BTreeMap::new();
            for asset in assets {
                groups
                    .entry(asset.data_source_code.clone())
                    .or_default()
                    .push(asset);
            }

            for (source_code, group) in groups {
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    break;
                }
                self.ingest_group(
                    uow.as_mut(),
                    &source_code,
                    &group,
                    &metrics_by_asset,
                    now,
                    cancel,
                    &mut summary,
                )
                .await?;
            }
        }

        uow.commit().await?;
        summary.duration = started.elapsed();
        Ok(summary)
    }

    /// Pull one data-source group and persist each asset's points.
    ///
    /// Only savepoint bookkeeping errors escape; everything else is counted.
    #[allow(clippy::too_many_arguments)]
    async fn ingest_group(
        &self,
        uow: &mut dyn UnitOfWork,
        source_code: &str,
        group: &[DueAsset],
        metrics_by_asset: &HashMap<DbId, HashMap<String, DbId>>,
        now: Timestamp,
        cancel: &CancellationToken,
        summary: &mut IngestionSummary,
    ) -> Result<(), PipelineError> {
        let request: Vec<SourceAsset> = group
            .iter()
            .map(|asset| {
                let mut metrics: Vec<String> = metrics_by_asset
                    .get(&asset.id)
                    .map(|m| m.keys().cloned().collect())
                    .unwrap_or_default();
                metrics.sort();
                SourceAsset {
                    asset_id: asset.id,
                    external_ref: asset.external_ref.clone(),
                    metrics,
                }
            })
            .collect();

        let points = match self.source.pull(source_code, &request).await {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(
                    source = source_code,
                    assets = group.len(),
                    error = %e,
                    "Metric source pull failed",
                );
                summary.errors += group.len() as u64;
                return Ok(());
            }
        };

        let mut points_by_asset: HashMap<DbId, Vec<RawDataPoint>> = HashMap::new();
        for point in points {
            points_by_asset.entry(point.asset_id).or_default().push(point);
        }

        for asset in group {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let known = metrics_by_asset.get(&asset.id);
            let rows: Vec<CreateDataPoint> = points_by_asset
                .remove(&asset.id)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|point| {
                    match known.and_then(|m| m.get(&point.metric_name)) {
                        Some(&metric_id) => Some(CreateDataPoint {
                            metric_id,
                            value: point.value,
                            recorded_at: point.recorded_at,
                        }),
                        None => {
                            tracing::debug!(
                                asset_id = asset.id,
                                metric_name = %point.metric_name,
                                "Ignoring data point for unknown metric",
                            );
                            None
                        }
                    }
                })
                .collect();

            uow.savepoint().await?;
            match persist_asset(uow, asset, &rows, now).await {
                Ok(created) => {
                    uow.release_savepoint().await?;
                    summary.assets_processed += 1;
                    summary.data_points_created += created;
                }
                Err(e) => {
                    uow.rollback_to_savepoint().await?;
                    summary.errors += 1;
                    tracing::warn!(asset_id = asset.id, error = %e, "Asset ingestion failed");
                }
            }
        }

        for asset_id in points_by_asset
            .keys()
            .filter(|id| !group.iter().any(|asset| asset.id == **id))
        {
            tracing::debug!(
                asset_id,
                source = source_code,
                "Ignoring data points for an asset outside the pull group",
            );
        }

        Ok(())
    }
}

async fn persist_asset(
    uow: &mut dyn UnitOfWork,
    asset: &DueAsset,
    rows: &[CreateDataPoint],
    now: Timestamp,
) -> Result<u64, PipelineError> {
    let next_due_at = schedule::next_due_at(asset.next_due_at, asset.collection_interval_secs, now)?;
    let created = if rows.is_empty() {
        0
    } else {
        uow.insert_data_points(rows).await?
    };
    uow.advance_cursor(asset.id, next_due_at).await?;
    Ok(created)
}
