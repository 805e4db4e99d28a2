//! Volume usage from the Prometheus HTTP API
//!
//! Two instant queries per cycle over the kubelet volume statistics, joined
//! on the `namespace` and `persistentvolumeclaim` labels.

use crate::cycle::{async_trait, MetricsSource};
use crate::models::{ClaimId, VolumeMetrics};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const USED_QUERY: &str = "kubelet_volume_stats_used_bytes";
pub const CAPACITY_QUERY: &str = "kubelet_volume_stats_capacity_bytes";

const NAMESPACE_LABEL: &str = "namespace";
const CLAIM_LABEL: &str = "persistentvolumeclaim";

/// Prometheus instant query client
pub struct PrometheusMetricsSource {
    client: Client,
    query_url: Url,
}

impl PrometheusMetricsSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        // Keep any path prefix (e.g. behind a proxy) when joining.
        let mut base_url = Url::parse(base_url).context("Invalid Prometheus URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let query_url = base_url
            .join("api/v1/query")
            .context("Invalid Prometheus URL")?;

        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    /// Run one instant query and key the samples by claim
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<HashMap<ClaimId, u64>> {
        let time = at.timestamp().to_string();
        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", query), ("time", time.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to send query {}", query))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Prometheus error ({}): {}", status, body);
        }

        let body: QueryResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response for {}", query))?;

        if body.status != "success" {
            anyhow::bail!(
                "Query {} failed: {}",
                query,
                body.error.unwrap_or_else(|| body.status.clone())
            );
        }

        let samples = body.data.map(|d| d.result).unwrap_or_default();
        Ok(collect_samples(query, samples))
    }
}

#[async_trait]
impl MetricsSource for PrometheusMetricsSource {
    async fn fetch_metrics(&self, at: DateTime<Utc>) -> Result<HashMap<ClaimId, VolumeMetrics>> {
        let used = self.query(USED_QUERY, at).await?;
        let mut capacity = self.query(CAPACITY_QUERY, at).await?;

        let metrics: HashMap<ClaimId, VolumeMetrics> = used
            .into_iter()
            .filter_map(|(id, used_bytes)| {
                let capacity_bytes = capacity.remove(&id)?;
                Some((
                    id,
                    VolumeMetrics {
                        used_bytes,
                        capacity_bytes,
                    },
                ))
            })
            .collect();

        debug!(claims = metrics.len(), "Fetched volume metrics");
        Ok(metrics)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Sample>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    #[serde(default)]
    metric: HashMap<String, String>,
    /// `[unix_seconds, "value"]`
    value: (f64, String),
}

/// Key samples by claim. Duplicate series (e.g. several kubelets reporting
/// the same volume) keep the largest value.
fn collect_samples(query: &str, samples: Vec<Sample>) -> HashMap<ClaimId, u64> {
    let mut out: HashMap<ClaimId, u64> = HashMap::new();

    for sample in samples {
        let (Some(namespace), Some(name)) = (
            sample.metric.get(NAMESPACE_LABEL),
            sample.metric.get(CLAIM_LABEL),
        ) else {
            continue;
        };

        let value = match sample.value.1.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => v as u64,
            _ => {
                warn!(
                    query = %query,
                    namespace = %namespace,
                    claim = %name,
                    value = %sample.value.1,
                    "Dropping unusable sample"
                );
                continue;
            }
        };

        out.entry(ClaimId::new(namespace.as_str(), name.as_str()))
            .and_modify(|v| *v = (*v).max(value))
            .or_insert(value);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn vector(samples: &[(&str, &str, &str)]) -> String {
        let result: Vec<serde_json::Value> = samples
            .iter()
            .map(|(ns, pvc, value)| {
                serde_json::json!({
                    "metric": {
                        "__name__": "kubelet_volume_stats_used_bytes",
                        "namespace": ns,
                        "persistentvolumeclaim": pvc,
                    },
                    "value": [1700000000.0, value],
                })
            })
            .collect();
        serde_json::json!({
            "status": "success",
            "data": { "resultType": "vector", "result": result },
        })
        .to_string()
    }

    #[test]
    fn test_query_url_keeps_path_prefix() {
        let source =
            PrometheusMetricsSource::new("http://prometheus:9090/prom", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            source.query_url().as_str(),
            "http://prometheus:9090/prom/api/v1/query"
        );

        let source =
            PrometheusMetricsSource::new("http://prometheus:9090/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.query_url().as_str(),
            "http://prometheus:9090/api/v1/query"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(PrometheusMetricsSource::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_metrics_joins_used_and_capacity() {
        let mut server = Server::new_async().await;
        let used = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), USED_QUERY.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(vector(&[
                ("db", "data-0", "9663676416"),
                ("db", "data-0", "9000000000"),
                ("db", "orphan", "1"),
            ]))
            .create_async()
            .await;
        let capacity = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), CAPACITY_QUERY.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(vector(&[("db", "data-0", "10737418240")]))
            .create_async()
            .await;

        let source = PrometheusMetricsSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let metrics = source.fetch_metrics(Utc::now()).await.unwrap();

        used.assert_async().await;
        capacity.assert_async().await;
        assert_eq!(metrics.len(), 1);
        assert_eq!(
            metrics[&ClaimId::new("db", "data-0")],
            VolumeMetrics {
                used_bytes: 9_663_676_416,
                capacity_bytes: 10_737_418_240,
            }
        );
    }

    #[tokio::test]
    async fn test_http_error_fails_fetch() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let source = PrometheusMetricsSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = source.fetch_metrics(Utc::now()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_error_status_fails_fetch() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#)
            .create_async()
            .await;

        let source = PrometheusMetricsSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = source.fetch_metrics(Utc::now()).await.unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn test_unusable_samples_dropped() {
        let body: QueryResponse = serde_json::from_str(&vector(&[
            ("db", "a", "NaN"),
            ("db", "b", "-5"),
            ("db", "c", "42"),
        ]))
        .unwrap();

        let samples = collect_samples(USED_QUERY, body.data.unwrap().result);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[&ClaimId::new("db", "c")], 42);
    }

    #[test]
    fn test_samples_without_claim_labels_ignored() {
        let body: QueryResponse = serde_json::from_str(
            r#"{"status":"success","data":{"result":[{"metric":{"namespace":"db"},"value":[1.0,"5"]}]}}"#,
        )
        .unwrap();

        assert!(collect_samples(USED_QUERY, body.data.unwrap().result).is_empty());
    }
}
