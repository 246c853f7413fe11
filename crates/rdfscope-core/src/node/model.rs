//! Node types and accessors

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tokio::sync::RwLock;

/// Reserved key holding the node IRI
pub const ID_KEY: &str = "@id";

/// Reserved key holding the id of the endpoint that described the node
pub const ENDPOINT_ID_KEY: &str = "endpointId";

/// Handle to a published node, mutated in place by enrichment
pub type SharedNode = Arc<RwLock<NodeModel>>;

/// Orientation of an edge relative to the owning node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// One edge endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeObj {
    pub value: String,
    /// `None` for reserved keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl NodeObj {
    pub fn outgoing(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            direction: Some(Direction::Outgoing),
        }
    }

    pub fn incoming(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            direction: Some(Direction::Incoming),
        }
    }

    /// Value without direction, used for reserved keys
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            direction: None,
        }
    }
}

/// Predicate -> objects mapping for one RDF subject
///
/// Keys keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeModel {
    entries: Vec<(String, Vec<NodeObj>)>,
    index: HashMap<String, usize>,
}

impl NodeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unresolved node carrying only its IRI
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut node = Self::new();
        node.set_reserved(ID_KEY, id);
        node
    }

    pub fn into_shared(self) -> SharedNode {
        Arc::new(RwLock::new(self))
    }

    /// Objects stored under `predicate`, if the key exists
    pub fn get(&self, predicate: &str) -> Option<&[NodeObj]> {
        self.index
            .get(predicate)
            .map(|&i| self.entries[i].1.as_slice())
    }

    pub fn contains_predicate(&self, predicate: &str) -> bool {
        self.index.contains_key(predicate)
    }

    /// Create `predicate` with no objects if it is not present yet
    pub fn ensure_predicate(&mut self, predicate: &str) -> &mut Vec<NodeObj> {
        let i = match self.index.get(predicate) {
            Some(&i) => i,
            None => {
                self.entries.push((predicate.to_string(), Vec::new()));
                let i = self.entries.len() - 1;
                self.index.insert(predicate.to_string(), i);
                i
            }
        };
        &mut self.entries[i].1
    }

    /// Append an object under `predicate`, keeping row-level duplicates
    pub fn push(&mut self, predicate: &str, obj: NodeObj) {
        self.ensure_predicate(predicate).push(obj);
    }

    /// Replace the value of a reserved key
    pub fn set_reserved(&mut self, key: &str, value: impl Into<String>) {
        let objs = self.ensure_predicate(key);
        objs.clear();
        objs.push(NodeObj::plain(value));
    }

    /// Objects for any of `predicates`, in predicate-then-insertion order
    ///
    /// Missing predicates are skipped and empty values dropped.
    pub fn objects_for<S: AsRef<str>>(&self, predicates: &[S]) -> Vec<NodeObj> {
        predicates
            .iter()
            .filter_map(|p| self.get(p.as_ref()))
            .flatten()
            .filter(|obj| !obj.value.is_empty())
            .cloned()
            .collect()
    }

    /// Plain values for `predicates`, optionally restricted to one direction
    /// and optionally deduplicated (first occurrence wins)
    pub fn object_values_for<S: AsRef<str>>(
        &self,
        predicates: &[S],
        direction: Option<Direction>,
        unique: bool,
    ) -> Vec<String> {
        let values = self
            .objects_for(predicates)
            .into_iter()
            .filter(|obj| direction.is_none() || obj.direction == direction)
            .map(|obj| obj.value);

        if unique {
            let mut seen = HashSet::new();
            values.filter(|v| seen.insert(v.clone())).collect()
        } else {
            values.collect()
        }
    }

    pub fn object_values_by_direction<S: AsRef<str>>(
        &self,
        predicates: &[S],
        direction: Direction,
    ) -> Vec<String> {
        self.object_values_for(predicates, Some(direction), false)
    }

    /// Node IRI, `None` while unresolved
    pub fn id(&self) -> Option<&str> {
        self.first_value(ID_KEY)
    }

    pub fn endpoint_id(&self) -> Option<&str> {
        self.first_value(ENDPOINT_ID_KEY)
    }

    /// Keys in insertion order, reserved keys included
    pub fn predicates(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// True once the node carries more than the reserved keys
    pub fn is_resolved(&self) -> bool {
        self.entries
            .iter()
            .any(|(k, _)| k != ID_KEY && k != ENDPOINT_ID_KEY)
    }

    /// Number of edges, reserved keys excluded
    pub fn edge_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k != ID_KEY && k != ENDPOINT_ID_KEY)
            .map(|(_, objs)| objs.len())
            .sum()
    }

    fn first_value(&self, key: &str) -> Option<&str> {
        self.get(key)?
            .iter()
            .map(|obj| obj.value.as_str())
            .find(|v| !v.is_empty())
    }
}

impl Serialize for NodeModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (predicate, objs) in &self.entries {
            map.serialize_entry(predicate, objs)?;
        }
        map.end()
    }
}
