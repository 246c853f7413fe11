//! Relation resolver
//!
//! Translates resolution requests into SPARQL queries against the endpoint
//! registry. Describing a node walks the whole fallback chain; every other
//! lookup asks the primary endpoint only and degrades to "no rows" when the
//! endpoint misbehaves.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PredicateConfig;
use crate::endpoint::EndpointRegistry;
use crate::error::{Error, Result};
use crate::node::{ENDPOINT_ID_KEY, NodeModel, NodeObj};

use super::query;
use super::response::{Row, parse_rows};
use super::transport::QueryTransport;
use super::types::{SparqlIncomingRelation, SparqlNodeParent, ThingWithLabel};

/// Resolves nodes and relations against the configured endpoints
#[derive(Clone)]
pub struct RelationResolver {
    transport: Arc<dyn QueryTransport>,
    registry: EndpointRegistry,
    predicates: PredicateConfig,
}

impl std::fmt::Debug for RelationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationResolver")
            .field("endpoints", &self.registry.len())
            .field("predicates", &self.predicates)
            .finish()
    }
}

impl RelationResolver {
    pub fn new(
        transport: Arc<dyn QueryTransport>,
        registry: EndpointRegistry,
        predicates: PredicateConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            predicates,
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Describe `id` using the first endpoint that knows anything about it
    ///
    /// Endpoints are tried strictly in registry order, one at a time. An
    /// endpoint that fails or answers with zero usable rows is skipped.
    pub async fn resolve_node(&self, id: &str) -> Result<NodeModel> {
        if id.is_empty() {
            return Err(Error::InvalidNode);
        }
        self.registry.ensure_not_empty()?;

        info!(node = %id, "Retrieving node details using SPARQL");
        let query = query::describe_node(id);

        for endpoint in self.registry.all() {
            if endpoint.id.is_empty() {
                warn!(url = %endpoint.sparql, "Skipping endpoint with no ID");
                continue;
            }

            let body = match self.transport.post_query(&endpoint.sparql, &query).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(endpoint = %endpoint.id, node = %id, error = %e, "Failed to query endpoint");
                    continue;
                }
            };

            let rows = match parse_rows(&body) {
                Ok(parsed) => parsed.rows,
                Err(warning) => {
                    warn!(endpoint = %endpoint.id, node = %id, %warning, "Invalid SPARQL response from endpoint");
                    continue;
                }
            };

            let mut node = NodeModel::with_id(id);
            for row in &rows {
                match (row.get("pred"), row.get("obj")) {
                    (Some(pred), Some(obj)) => node.push(pred, NodeObj::outgoing(obj.as_str())),
                    _ => debug!(endpoint = %endpoint.id, "Skipping row without pred/obj"),
                }
            }

            if node.edge_count() == 0 {
                debug!(endpoint = %endpoint.id, node = %id, "Endpoint returned no data");
                continue;
            }

            node.set_reserved(ENDPOINT_ID_KEY, endpoint.id.as_str());
            info!(
                endpoint = %endpoint.id,
                node = %id,
                edges = node.edge_count(),
                "Resolved node"
            );
            return Ok(node);
        }

        Err(Error::NodeNotFound(id.to_string()))
    }

    /// Subjects pointing at `node`, best effort
    pub async fn resolve_incoming_relations(
        &self,
        node: &NodeModel,
    ) -> Result<Vec<SparqlIncomingRelation>> {
        let id = ensure_node_has_id(node)?;
        let rows = self
            .query_primary(&query::incoming_relations(id), "incoming relations")
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                Some(SparqlIncomingRelation {
                    sub: row.remove("sub")?,
                    pred: row.remove("pred")?,
                })
            })
            .collect())
    }

    /// Ancestors of `node` through the configured parent predicates
    pub async fn resolve_ancestry(&self, node: &NodeModel) -> Result<Vec<SparqlNodeParent>> {
        let id = ensure_node_has_id(node)?;
        if self.predicates.parents.is_empty() {
            debug!(node = %id, "No parent predicates configured");
            return Ok(Vec::new());
        }

        let query = query::ancestry(id, &self.predicates.parents, &self.predicates.label);
        let rows = self.query_primary(&query, "ancestry").await?;

        Ok(rows
            .into_iter()
            .take(query::ANCESTRY_LIMIT)
            .filter_map(|mut row| {
                Some(SparqlNodeParent {
                    id: row.remove("id")?,
                    title: row.remove("title"),
                    parent: row.remove("parent"),
                })
            })
            .collect())
    }

    /// Labels for `ids` in a single batched query; unlabeled ids are absent
    pub async fn resolve_labels<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<ThingWithLabel>> {
        self.registry.ensure_not_empty()?;
        if ids.is_empty() || self.predicates.label.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .query_primary(&query::labels(ids, &self.predicates.label), "labels")
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                Some(ThingWithLabel {
                    id: row.remove("s")?,
                    label: row.remove("label")?,
                })
            })
            .collect())
    }

    /// Raw object values of `id` across `predicates`
    pub async fn resolve_object_ids<S: AsRef<str>>(
        &self,
        id: &str,
        predicates: &[S],
    ) -> Result<Vec<String>> {
        if id.is_empty() {
            return Err(Error::InvalidNode);
        }
        self.registry.ensure_not_empty()?;
        if predicates.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .query_primary(&query::object_ids(id, predicates), "object ids")
            .await?;

        Ok(rows.into_iter().filter_map(|mut row| row.remove("o")).collect())
    }

    /// Run `query` on the primary endpoint
    ///
    /// Only a missing endpoint is an error; transport failures and malformed
    /// bodies are logged and yield no rows.
    async fn query_primary(&self, query: &str, operation: &str) -> Result<Vec<Row>> {
        let endpoint = self.registry.first()?;
        debug!(endpoint = %endpoint.id, operation, "Querying primary endpoint");

        let body = match self.transport.post_query(&endpoint.sparql, query).await {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %endpoint.id, operation, error = %e, "SPARQL query failed");
                return Ok(Vec::new());
            }
        };

        match parse_rows(&body) {
            Ok(parsed) => Ok(parsed.rows),
            Err(warning) => {
                warn!(endpoint = %endpoint.id, operation, %warning, "Treating response as empty");
                Ok(Vec::new())
            }
        }
    }
}

fn ensure_node_has_id(node: &NodeModel) -> Result<&str> {
    node.id().ok_or(Error::InvalidNode)
}
