//! SPARQL access
//!
//! This module provides:
//! - Query text builders for every lookup the browser needs
//! - Response normalization for SPARQL JSON and bare-row bodies
//! - A pluggable transport with a reqwest implementation
//! - The relation resolver with per-endpoint fallback

pub mod query;
mod resolver;
mod response;
mod transport;
mod types;

pub use resolver::RelationResolver;
pub use response::{MalformedResponse, ParsedRows, ResponseShape, Row, parse_rows};
pub use transport::{HttpTransport, QueryTransport};
pub use types::{SparqlIncomingRelation, SparqlNodeParent, ThingWithLabel};
