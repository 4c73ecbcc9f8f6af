//! Client for the categorization backend's data contract.
//!
//! Every endpoint wraps its payload in a `{ "data": ... }` envelope; the
//! methods here unwrap it and hand back typed values. Categorized clients
//! are returned untyped so they can go through [`crate::metrics::normalize`].

pub mod sequence;

use crate::config::ApiConfig;
use crate::error::Result;
use crate::http::HttpClient;
use crate::metrics::{MonthKey, Overview, VendorSummary};
use crate::recommend::Recommendation;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// `GET /metrics/basic`: totals plus the per-vendor breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicMetrics {
    pub overview: Overview,
    pub by_vendor: Vec<VendorSummary>,
}

/// `GET /metrics/advanced`. The backend's own metrics are kept opaque; the
/// dashboard recomputes them from `categorized_clients`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedPayload {
    pub metrics: serde_json::Value,
    pub categorized_clients: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheStatus {
    pub total: usize,
    pub cached: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CacheStatus {
    /// Share of clients with a cached categorization, 0–100.
    pub fn coverage(&self) -> f64 {
        crate::metrics::types::conversion_rate(self.cached, self.total)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationRequest<'a> {
    client_description: &'a str,
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: HttpClient,
}

impl BackendClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = HttpClient::new(
            "vambe-metrics/0.1.0",
            Duration::from_secs(config.timeout_secs),
        )?
        .with_retries(config.max_retries, config.retry_base_delay_ms);
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!(path, ?query, "GET");
        let envelope: Envelope<T> = self.http.get_json(&self.url(path), query).await?;
        Ok(envelope.data)
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        self.http.get_json(&self.url("/health"), &[]).await
    }

    pub async fn basic_metrics(&self, month: Option<MonthKey>) -> Result<BasicMetrics> {
        let query = month_query(month);
        let metrics: BasicMetrics = self.get_data("/metrics/basic", &query).await?;
        info!(
            clients = metrics.overview.total_clients,
            vendors = metrics.by_vendor.len(),
            "fetched basic metrics"
        );
        Ok(metrics)
    }

    pub async fn advanced_metrics(
        &self,
        force_refresh: bool,
        month: Option<MonthKey>,
    ) -> Result<AdvancedPayload> {
        let mut query = vec![("forceRefresh", force_refresh.to_string())];
        query.extend(month_query(month));
        let payload: AdvancedPayload = self.get_data("/metrics/advanced", &query).await?;
        info!(
            clients = payload.categorized_clients.len(),
            force_refresh, "fetched advanced metrics"
        );
        Ok(payload)
    }

    pub async fn categorized_clients(&self) -> Result<Vec<serde_json::Value>> {
        self.get_data("/clients/categorized", &[]).await
    }

    pub async fn cache_status(&self) -> Result<CacheStatus> {
        self.get_data("/clients/cache/status", &[]).await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.http.post_empty(&self.url("/clients/cache/clear")).await?;
        info!("backend categorization cache cleared");
        Ok(())
    }

    /// Server-side recommendation (`POST /recommendations`).
    pub async fn recommend(&self, description: &str) -> Result<Recommendation> {
        let body = RecommendationRequest {
            client_description: description,
        };
        let envelope: Envelope<Recommendation> = self
            .http
            .post_json(&self.url("/recommendations"), &body)
            .await?;
        Ok(envelope.data)
    }
}

fn month_query(month: Option<MonthKey>) -> Vec<(&'static str, String)> {
    month
        .map(|m| vec![("month", m.to_string())])
        .unwrap_or_default()
}
