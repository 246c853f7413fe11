//! Raw index hits -> node models

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::node::{ENDPOINT_ID_KEY, ID_KEY, NodeModel, NodeObj};

use super::index::{SearchHit, SearchResponse};

/// Type IRI -> number of matching documents, summed over endpoints
pub type TypeCounts = BTreeMap<String, u64>;

/// Convert every hit of every response into a node
///
/// The node id comes from `_source["@id"]`, falling back to `_id`; hits with
/// neither are skipped. All other source fields become Outgoing edges.
pub fn parse_to_nodes(responses: &[SearchResponse]) -> Vec<NodeModel> {
    let mut nodes = Vec::new();
    for response in responses {
        for hit in &response.hits.hits {
            match hit_to_node(hit, &response.endpoint_id) {
                Some(node) => nodes.push(node),
                None => debug!(endpoint = %response.endpoint_id, "Skipping hit without id"),
            }
        }
    }
    nodes
}

fn hit_to_node(hit: &SearchHit, endpoint_id: &str) -> Option<NodeModel> {
    let id = hit
        .source
        .get(ID_KEY)
        .and_then(scalar_value)
        .or_else(|| hit.id.clone())
        .filter(|id| !id.is_empty())?;

    let mut node = NodeModel::with_id(id);
    for (predicate, value) in &hit.source {
        if predicate == ID_KEY || predicate == ENDPOINT_ID_KEY {
            continue;
        }
        let objs = node.ensure_predicate(predicate);
        match value {
            Value::Array(items) => {
                objs.extend(items.iter().filter_map(scalar_value).map(NodeObj::outgoing));
            }
            other => objs.extend(scalar_value(other).map(NodeObj::outgoing)),
        }
    }

    if !endpoint_id.is_empty() {
        node.set_reserved(ENDPOINT_ID_KEY, endpoint_id);
    }
    Some(node)
}

/// Strings, numbers, booleans, `{"value": ..}` and `{"@id": ..}` objects
fn scalar_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map
            .get(ID_KEY)
            .or_else(|| map.get("value"))
            .and_then(scalar_value),
        Value::Null | Value::Array(_) => None,
    }
}

pub fn type_counts_from_responses(responses: &[SearchResponse]) -> TypeCounts {
    let mut counts = TypeCounts::new();
    let buckets = responses
        .iter()
        .filter_map(|r| r.aggregations.as_ref()?.types.as_ref())
        .flat_map(|agg| agg.buckets.iter());
    for bucket in buckets {
        *counts.entry(bucket.key.clone()).or_insert(0) += bucket.doc_count;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Direction;
    use serde_json::json;

    fn response(endpoint: &str, raw: Value) -> SearchResponse {
        let mut response: SearchResponse = serde_json::from_value(raw).unwrap();
        response.endpoint_id = endpoint.to_string();
        response
    }

    #[test]
    fn test_hits_become_outgoing_edges() {
        let responses = vec![response(
            "dbpedia",
            json!({ "hits": { "hits": [ {
                "_id": "ignored",
                "_source": {
                    "@id": "http://e/ada",
                    "name": ["Ada", { "value": "Ada Lovelace" }],
                    "born": 1815,
                    "knows": { "@id": "http://e/babbage" },
                    "nothing": null
                }
            } ] } }),
        )];

        let nodes = parse_to_nodes(&responses);

        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.id(), Some("http://e/ada"));
        assert_eq!(node.endpoint_id(), Some("dbpedia"));
        assert_eq!(
            node.object_values_by_direction(&["name"], Direction::Outgoing),
            vec!["Ada", "Ada Lovelace"]
        );
        assert_eq!(node.object_values_for(&["born"], None, false), vec!["1815"]);
        assert_eq!(node.object_values_for(&["knows"], None, false), vec!["http://e/babbage"]);
        assert!(node.get("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_id_falls_back_to_hit_id_and_skips_anonymous_hits() {
        let responses = vec![response(
            "a",
            json!({ "hits": { "hits": [
                { "_id": "http://e/1", "_source": { "p": "v" } },
                { "_source": { "p": "v" } }
            ] } }),
        )];

        let nodes = parse_to_nodes(&responses);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id(), Some("http://e/1"));
    }

    #[test]
    fn test_nodes_keep_response_order() {
        let responses = vec![
            response("a", json!({ "hits": { "hits": [ { "_id": "h1" }, { "_id": "h2" } ] } })),
            response("b", json!({ "hits": { "hits": [ { "_id": "h3" } ] } })),
        ];

        let ids: Vec<_> = parse_to_nodes(&responses)
            .iter()
            .map(|n| n.id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn test_type_counts_sum_across_endpoints() {
        let responses = vec![
            response("a", json!({ "aggregations": { "types": { "buckets": [
                { "key": "Person", "doc_count": 3 },
                { "key": "Place", "doc_count": 1 }
            ] } } })),
            response("b", json!({ "aggregations": { "types": { "buckets": [
                { "key": "Person", "doc_count": 2 }
            ] } } })),
            response("c", json!({})),
        ];

        let counts = type_counts_from_responses(&responses);
        assert_eq!(counts["Person"], 5);
        assert_eq!(counts["Place"], 1);
        assert_eq!(counts.len(), 2);
    }
}
