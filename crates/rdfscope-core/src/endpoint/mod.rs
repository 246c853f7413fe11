//! Endpoint registry
//!
//! Holds the ordered list of configured data sources. The first entry is the
//! primary endpoint; the full list is the fallback chain used when describing
//! a node.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// URLs for one configured data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointUrls {
    /// Identifier recorded on nodes resolved from this endpoint
    pub id: String,
    /// SPARQL query URL
    pub sparql: String,
    /// Search index URL (Elasticsearch-compatible `_search` base), if mirrored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic: Option<String>,
}

impl EndpointUrls {
    pub fn new(id: impl Into<String>, sparql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sparql: sparql.into(),
            elastic: None,
        }
    }

    pub fn with_elastic(mut self, url: impl Into<String>) -> Self {
        self.elastic = Some(url.into());
        self
    }
}

/// Ordered, read-only endpoint lookup
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointUrls>,
}

impl EndpointRegistry {
    pub fn new(endpoints: Vec<EndpointUrls>) -> Self {
        Self { endpoints }
    }

    /// Primary endpoint
    pub fn first(&self) -> Result<&EndpointUrls> {
        self.endpoints.first().ok_or(Error::NoEndpoints)
    }

    /// Full fallback chain in registry order
    pub fn all(&self) -> &[EndpointUrls] {
        &self.endpoints
    }

    /// Endpoints that mirror a search index
    pub fn searchable(&self) -> impl Iterator<Item = &EndpointUrls> {
        self.endpoints.iter().filter(|e| e.elastic.is_some())
    }

    pub fn get(&self, id: &str) -> Option<&EndpointUrls> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::NoEndpoints);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(vec![
            EndpointUrls::new("a", "http://a/sparql").with_elastic("http://a/es"),
            EndpointUrls::new("b", "http://b/sparql"),
        ])
    }

    #[test]
    fn test_first_is_primary() {
        assert_eq!(registry().first().unwrap().id, "a");
    }

    #[test]
    fn test_empty_registry_fails() {
        let registry = EndpointRegistry::default();
        assert!(matches!(registry.first(), Err(Error::NoEndpoints)));
        assert!(matches!(registry.ensure_not_empty(), Err(Error::NoEndpoints)));
    }

    #[test]
    fn test_all_preserves_order() {
        let ids: Vec<_> = registry().all().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_searchable_only_with_index() {
        let registry = registry();
        let ids: Vec<_> = registry.searchable().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(registry.get("b").is_some());
        assert!(registry.get("c").is_none());
    }
}
