//! Search index connector
//!
//! Every endpoint may mirror its data into an Elasticsearch-compatible
//! index. A search fans out to all mirrored endpoints and returns one
//! response per endpoint that answered.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::config::{HttpConfig, SearchConfig};
use crate::endpoint::{EndpointRegistry, EndpointUrls};
use crate::error::{Error, Result};

use super::filters::ElasticFilters;

/// Full-text + facet search over the index mirrors
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search_entities(
        &self,
        query: &str,
        filters: &ElasticFilters,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchResponse>>;
}

/// One endpoint's answer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Filled in by the connector, not part of the wire format
    #[serde(skip)]
    pub endpoint_id: String,
    #[serde(default)]
    pub hits: HitsEnvelope,
    #[serde(default)]
    pub aggregations: Option<Aggregations>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// Raw hit; `source` holds predicate -> value(s)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Aggregations {
    #[serde(default)]
    pub types: Option<TermsAggregation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TermsAggregation {
    #[serde(default)]
    pub buckets: Vec<TermsBucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TermsBucket {
    pub key: String,
    pub doc_count: u64,
}

/// Build the `_search` request body
pub fn build_search_body(
    query: &str,
    filters: &ElasticFilters,
    offset: usize,
    limit: usize,
    type_field: &str,
) -> Value {
    let must = if query.trim().is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "multi_match": { "query": query, "fields": ["*"], "lenient": true } })
    };

    let filter: Vec<Value> = filters
        .terms
        .iter()
        .map(|(field, values)| json!({ "terms": { field: values } }))
        .collect();

    json!({
        "from": offset,
        "size": limit,
        "query": { "bool": { "must": [must], "filter": filter } },
        "aggs": { "types": { "terms": { "field": type_field, "size": 100 } } }
    })
}

/// reqwest-backed connector for Elasticsearch-compatible mirrors
#[derive(Debug, Clone)]
pub struct ElasticIndex {
    http_client: HttpClient,
    registry: EndpointRegistry,
    type_field: String,
}

impl ElasticIndex {
    pub fn new(registry: EndpointRegistry, search: &SearchConfig, http: &HttpConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            registry,
            type_field: search.type_field.clone(),
        })
    }

    async fn search_endpoint(&self, endpoint: &EndpointUrls, url: &str, body: &Value) -> Result<SearchResponse> {
        let url = format!("{}/_search", url.trim_end_matches('/'));
        debug!(endpoint = %endpoint.id, url = %url, "Sending index search");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::transport(endpoint.id.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::transport(
                endpoint.id.as_str(),
                format!("HTTP {}: {}", status, text),
            ));
        }

        let mut parsed: SearchResponse = response.json().await.map_err(|e| {
            Error::transport(endpoint.id.as_str(), format!("Failed to parse response: {}", e))
        })?;
        parsed.endpoint_id = endpoint.id.clone();
        Ok(parsed)
    }
}

#[async_trait]
impl SearchIndex for ElasticIndex {
    async fn search_entities(
        &self,
        query: &str,
        filters: &ElasticFilters,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchResponse>> {
        self.registry.ensure_not_empty()?;
        let body = build_search_body(query, filters, offset, limit, &self.type_field);

        let targets: Vec<(&EndpointUrls, &str)> = self
            .registry
            .searchable()
            .filter_map(|e| e.elastic.as_deref().map(|url| (e, url)))
            .collect();
        if targets.is_empty() {
            return Err(Error::SearchFailed(
                "No endpoint mirrors a search index".to_string(),
            ));
        }

        let outcomes = join_all(
            targets
                .iter()
                .map(|(endpoint, url)| self.search_endpoint(endpoint, url, &body)),
        )
        .await;

        let attempted = outcomes.len();
        let mut responses = Vec::new();
        let mut last_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(response) => responses.push(response),
                Err(e) => {
                    warn!(error = %e, "Index search failed for endpoint");
                    last_error = Some(e);
                }
            }
        }

        match (responses.is_empty(), last_error) {
            (true, Some(e)) => Err(Error::SearchFailed(format!(
                "all {} index endpoints failed, last error: {}",
                attempted, e
            ))),
            _ => Ok(responses),
        }
    }
}
