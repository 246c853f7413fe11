//! Normalized rows returned by the relation resolver

use serde::{Deserialize, Serialize};

/// A subject pointing at the queried node, before merge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparqlIncomingRelation {
    pub sub: String,
    pub pred: String,
}

impl SparqlIncomingRelation {
    pub fn new(sub: impl Into<String>, pred: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            pred: pred.into(),
        }
    }
}

/// One ancestor reached through the parent predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparqlNodeParent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingWithLabel {
    #[serde(rename = "@id")]
    pub id: String,
    pub label: String,
}
