//! Graph enrichment
//!
//! Attaches incoming relations to a batch of already-published nodes. Each
//! node is looked up concurrently; a failed lookup is logged and leaves that
//! node as it was without affecting its siblings.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::node::{NodeModel, NodeObj, SharedNode};
use crate::sparql::{RelationResolver, SparqlIncomingRelation};

/// Source of incoming relation rows for a node
#[async_trait]
pub trait IncomingRelationSource: Send + Sync {
    async fn incoming_relations(&self, node: &NodeModel) -> Result<Vec<SparqlIncomingRelation>>;
}

#[async_trait]
impl IncomingRelationSource for RelationResolver {
    async fn incoming_relations(&self, node: &NodeModel) -> Result<Vec<SparqlIncomingRelation>> {
        self.resolve_incoming_relations(node).await
    }
}

/// Outcome counters for one enrichment batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub nodes: usize,
    pub failed: usize,
    pub edges_added: usize,
}

/// Fans incoming relation lookups out over node batches
pub struct GraphEnricher<S: IncomingRelationSource> {
    source: Arc<S>,
}

impl<S: IncomingRelationSource> Clone for GraphEnricher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: IncomingRelationSource> GraphEnricher<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Enrich every node in `nodes` with its incoming relations
    ///
    /// Completes once every node has been attempted and hands back the same
    /// handles it was given.
    pub async fn enrich_with_incoming_relations(&self, nodes: Vec<SharedNode>) -> Vec<SharedNode> {
        self.enrich_with_report(nodes).await.0
    }

    pub async fn enrich_with_report(
        &self,
        nodes: Vec<SharedNode>,
    ) -> (Vec<SharedNode>, EnrichmentReport) {
        debug!(nodes = nodes.len(), "Enriching with incoming relations");

        let outcomes = join_all(nodes.iter().map(|node| self.enrich_node(node))).await;

        let mut report = EnrichmentReport {
            nodes: nodes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(added) => report.edges_added += added,
                Err(_) => report.failed += 1,
            }
        }

        info!(
            nodes = report.nodes,
            failed = report.failed,
            edges_added = report.edges_added,
            "Enrichment finished"
        );
        (nodes, report)
    }

    async fn enrich_node(&self, node: &SharedNode) -> Result<usize> {
        // lookup runs on a snapshot so the node stays readable meanwhile
        let snapshot = node.read().await.clone();
        let node_id = snapshot.id().unwrap_or("<no id>").to_string();

        match self.source.incoming_relations(&snapshot).await {
            Ok(relations) => {
                debug!(node = %node_id, relations = relations.len(), "Received incoming relations");
                let mut guard = node.write().await;
                Ok(merge_incoming_relations(&mut guard, &relations))
            }
            Err(e) => {
                warn!(node = %node_id, error = %e, "Error enriching node with incoming relations");
                Err(e)
            }
        }
    }
}

/// Append each relation as an Incoming edge unless its subject is already
/// stored under the same predicate; returns the number of edges added
pub fn merge_incoming_relations(node: &mut NodeModel, relations: &[SparqlIncomingRelation]) -> usize {
    let mut added = 0;
    for relation in relations {
        node.ensure_predicate(&relation.pred);

        let existing = node.object_values_for(&[relation.pred.as_str()], None, false);
        if existing.contains(&relation.sub) {
            continue;
        }

        node.push(&relation.pred, NodeObj::incoming(relation.sub.as_str()));
        added += 1;
    }
    added
}
