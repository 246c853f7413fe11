//! Rdfscope Core Library
//!
//! This crate provides the core functionality for Rdfscope, including:
//! - Node model with directed edges (incoming and outgoing)
//! - Endpoint registry (SPARQL + optional search index per endpoint)
//! - SPARQL query builders, response parsing and transport
//! - Relation resolution with per-endpoint fallback
//! - Concurrent enrichment with incoming relations
//! - Paged, filtered entity search with published state

pub mod config;
pub mod endpoint;
pub mod enrichment;
pub mod error;
pub mod node;
pub mod search;
pub mod sparql;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::endpoint::{EndpointRegistry, EndpointUrls};
    pub use crate::enrichment::GraphEnricher;
    pub use crate::error::{Error, Result};
    pub use crate::node::{Direction, NodeModel, NodeObj, SharedNode};
    pub use crate::search::{ElasticFilters, SearchOrchestrator};
    pub use crate::sparql::RelationResolver;
}
