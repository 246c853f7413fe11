//! Entity search
//!
//! This module provides:
//! - Term filter state
//! - The index connector trait and its Elasticsearch implementation
//! - Conversion of raw hits into nodes and facet counts
//! - The orchestrator that pages, publishes and enriches results

mod filters;
mod hits;
mod index;
mod orchestrator;

pub use filters::ElasticFilters;
pub use hits::{TypeCounts, parse_to_nodes, type_counts_from_responses};
pub use index::{
    Aggregations, ElasticIndex, HitsEnvelope, SearchHit, SearchIndex, SearchResponse,
    TermsAggregation, TermsBucket, build_search_body,
};
pub use orchestrator::{SearchOrchestrator, SearchResults};
