//! HTTP transport for SPARQL queries

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Issues one query against one endpoint URL and returns the raw JSON body
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn post_query(&self, url: &str, query: &str) -> Result<Value>;
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

/// reqwest-backed transport posting `{"query": ...}` as JSON
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self { http_client })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Self::new(config.timeout_secs)
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn post_query(&self, url: &str, query: &str) -> Result<Value> {
        debug!(url = %url, query_len = query.len(), "Sending SPARQL query");

        let response = self
            .http_client
            .post(url)
            .header(ACCEPT, "application/sparql-results+json, application/json")
            .json(&QueryBody { query })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::transport(url, "request timed out")
                } else {
                    Error::NetworkError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(url, format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::transport(url, format!("Failed to parse response: {}", e)))
    }
}
