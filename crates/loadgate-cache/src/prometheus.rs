use crate::error::{CacheError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Body of a Prometheus `/api/v1/query` response
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: QueryData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryData {
    #[serde(default, rename = "resultType")]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<VectorSample>,
}

/// One element of an instant-vector result
#[derive(Debug, Clone, Deserialize)]
pub struct VectorSample {
    pub metric: SampleLabels,
    /// `[<unix timestamp>, "<value>"]`
    pub value: (serde_json::Value, String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleLabels {
    #[serde(default)]
    pub instance: String,
}

impl QueryResponse {
    /// Decode a raw response body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| {
            CacheError::malformed_response(format!("Failed to decode query response: {}", e))
        })
    }

    /// Turn a successful response into `(instance, percent)` pairs.
    ///
    /// Samples whose value has no integer part are skipped.
    pub fn into_values(self, query: &str) -> Result<Vec<(String, i64)>> {
        if self.status != "success" {
            return Err(CacheError::QueryFailed {
                query: query.to_string(),
                status: self.status,
            });
        }

        let mut values = Vec::with_capacity(self.data.result.len());
        for sample in self.data.result {
            match parse_percentage(&sample.value.1) {
                Some(value) => values.push((sample.metric.instance, value)),
                None => warn!(
                    "Skipping sample for {}: cannot parse value '{}'",
                    sample.metric.instance, sample.value.1
                ),
            }
        }

        Ok(values)
    }
}

/// Integer part of a Prometheus sample value ("85.37" -> 85)
pub fn parse_percentage(raw: &str) -> Option<i64> {
    let integer = raw.split('.').next().unwrap_or_default();
    integer.trim().parse::<i64>().ok()
}

/// Client for the Prometheus instant-query endpoint
pub struct PrometheusClient {
    base_url: String,
    query: String,
    client: Client,
}

impl PrometheusClient {
    /// Create a client querying `query` against `base_url` with a request timeout
    pub fn new(base_url: &str, query: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            query: query.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// GET {base_url}/api/v1/query?query={query}
    pub async fn fetch(&self) -> Result<Vec<(String, i64)>> {
        let url = format!("{}/api/v1/query", self.base_url);
        debug!("GET {} (query: {})", url, self.query);

        let resp = self
            .client
            .get(&url)
            .query(&[("query", self.query.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| CacheError::backend_unreachable(format!("HTTP request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CacheError::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await.map_err(|e| {
            CacheError::backend_unreachable(format!("Failed to read response body: {}", e))
        })?;

        QueryResponse::from_slice(&body)?.into_values(&self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    const SUCCESS_BODY: &str = r#"{
        "status": "success",
        "data": {
            "resultType": "vector",
            "result": [
                {"metric": {"instance": "node-a"}, "value": [1714552200.123, "85.37"]},
                {"metric": {"instance": "node-b"}, "value": [1714552200.123, "12"]}
            ]
        }
    }"#;

    async fn serve(status: axum::http::StatusCode, body: &'static str) -> String {
        let app = Router::new().route("/api/v1/query", get(move || async move { (status, body) }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("85.37"), Some(85));
        assert_eq!(parse_percentage("100"), Some(100));
        assert_eq!(parse_percentage("0.99"), Some(0));
        assert_eq!(parse_percentage("NaN"), None);
        assert_eq!(parse_percentage(""), None);
    }

    #[test]
    fn test_into_values() {
        let resp = QueryResponse::from_slice(SUCCESS_BODY.as_bytes()).unwrap();
        assert_eq!(resp.data.result_type, "vector");

        let values = resp.into_values("HostMemoryUsagePercent").unwrap();
        assert_eq!(
            values,
            vec![("node-a".to_string(), 85), ("node-b".to_string(), 12)]
        );
    }

    #[test]
    fn test_into_values_skips_unparsable_sample() {
        let body = r#"{"status":"success","data":{"result":[
            {"metric":{"instance":"node-a"},"value":[1,"NaN"]},
            {"metric":{"instance":"node-b"},"value":[1,"40.2"]}
        ]}}"#;
        let values = QueryResponse::from_slice(body.as_bytes())
            .unwrap()
            .into_values("q")
            .unwrap();
        assert_eq!(values, vec![("node-b".to_string(), 40)]);
    }

    #[test]
    fn test_non_success_status() {
        let body = r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#;
        let err = QueryResponse::from_slice(body.as_bytes())
            .unwrap()
            .into_values("q")
            .unwrap_err();
        assert!(matches!(err, CacheError::QueryFailed { .. }));
    }

    #[test]
    fn test_malformed_body() {
        let err = QueryResponse::from_slice(b"<html>").unwrap_err();
        assert!(matches!(err, CacheError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_fetch_from_backend() {
        let url = serve(axum::http::StatusCode::OK, SUCCESS_BODY).await;
        let client =
            PrometheusClient::new(&url, "HostMemoryUsagePercent", Duration::from_secs(5)).unwrap();

        let values = client.fetch().await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], ("node-a".to_string(), 85));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let url = serve(axum::http::StatusCode::SERVICE_UNAVAILABLE, "down").await;
        let client = PrometheusClient::new(&url, "q", Duration::from_secs(5)).unwrap();

        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, CacheError::BackendStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let client =
            PrometheusClient::new("http://127.0.0.1:1/", "q", Duration::from_secs(2)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:1");

        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, CacheError::BackendUnreachable { .. }));
    }
}
