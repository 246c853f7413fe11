//! Graph node model
//!
//! A node is one RDF subject seen as an ordered mapping from predicate IRI
//! to the objects reached through it. Every object carries a direction tag:
//! `Outgoing` when the node is the subject of the triple, `Incoming` when it
//! is the object.
//!
//! Two keys are reserved and never hold graph edges:
//!
//! - `@id`: the node's IRI (exactly one value once resolved)
//! - `endpointId`: the endpoint that answered the describe query
//!
//! Nodes reach the result stream as [`SharedNode`] handles so enrichment can
//! attach edges after the node has been published.

mod model;

pub use model::{Direction, ENDPOINT_ID_KEY, ID_KEY, NodeModel, NodeObj, SharedNode};
