//! Metric sources: where ingestion pulls data points from.
//!
//! Assets name a `data_source_code`. The ingestion stage groups due assets by
//! that code and makes one [`MetricSource::pull`] call per group.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tripwire_core::types::{DbId, Timestamp};

/// Default timeout for one pull request.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// One asset in a pull request, with the metric names it wants collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAsset {
    pub asset_id: DbId,
    pub external_ref: String,
    pub metrics: Vec<String>,
}

/// A data point returned by a source, not yet matched to a metric row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataPoint {
    pub asset_id: DbId,
    pub metric_name: String,
    pub value: Decimal,
    pub recorded_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Metric source request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Metric source returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Metric source rejected the pull: {0}")]
    Rejected(String),

    #[error("Invalid metric source URL {0:?}")]
    InvalidUrl(String),
}

/// Pulls current values for a group of assets sharing a data source.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn pull(
        &self,
        source_code: &str,
        assets: &[SourceAsset],
    ) -> Result<Vec<RawDataPoint>, SourceError>;
}

#[derive(Serialize)]
struct PullRequest<'a> {
    assets: &'a [SourceAsset],
}

#[derive(Deserialize)]
struct PullResponse {
    data_points: Vec<RawDataPoint>,
}

/// Metric source gateway reached over HTTP.
///
/// `POST {base_url}/sources/{code}/pull` with the asset list; the response
/// carries every data point collected for the group. The code is
/// percent-encoded as a single path segment.
#[derive(Debug)]
pub struct HttpMetricSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpMetricSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, SourceError> {
        let base_url =
            Url::parse(base_url).map_err(|_| SourceError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    fn pull_url(&self, source_code: &str) -> Result<Url, SourceError> {
        // `.` and `..` would be dropped as path segments.
        if matches!(source_code, "" | "." | "..") {
            return Err(SourceError::Rejected(format!(
                "invalid source code {source_code:?}"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["sources", source_code, "pull"]);
        Ok(url)
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn pull(
        &self,
        source_code: &str,
        assets: &[SourceAsset],
    ) -> Result<Vec<RawDataPoint>, SourceError> {
        let response = self
            .client
            .post(self.pull_url(source_code)?)
            .json(&PullRequest { assets })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        let body: PullResponse = response.json().await?;
        tracing::debug!(
            source = source_code,
            assets = assets.len(),
            data_points = body.data_points.len(),
            "Metric source pulled"
        );
        Ok(body.data_points)
    }
}
