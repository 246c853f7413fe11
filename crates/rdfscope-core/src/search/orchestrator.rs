//! Search orchestration
//!
//! Owns the query, the active filters and the accumulated result pages.
//! State is published on `watch` channels so any number of views can
//! follow along; every publish replaces the whole value at once.
//!
//! A page is requested from the index, converted to nodes, appended to the
//! results and then enriched with incoming relations on a spawned task. The
//! published nodes are shared handles, so enrichment shows up in place
//! without another publish. Callers that need the edges before moving on
//! can await [`SearchOrchestrator::wait_for_enrichment`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{Config, SearchConfig};
use crate::enrichment::{GraphEnricher, IncomingRelationSource};
use crate::error::{Error, Result};
use crate::node::SharedNode;
use crate::sparql::{HttpTransport, RelationResolver};

use super::filters::ElasticFilters;
use super::hits::{TypeCounts, parse_to_nodes, type_counts_from_responses};
use super::index::{ElasticIndex, SearchIndex};

/// Accumulated results across pages
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub nodes: Vec<SharedNode>,
    pub type_counts: TypeCounts,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Default)]
struct SearchState {
    query: String,
    page: usize,
    /// Bumped on every reset; responses from older generations are dropped
    generation: u64,
}

pub struct SearchOrchestrator<I, S>
where
    I: SearchIndex + 'static,
    S: IncomingRelationSource + 'static,
{
    index: Arc<I>,
    enricher: GraphEnricher<S>,
    page_size: usize,
    request_timeout: Duration,
    state: Mutex<SearchState>,
    in_flight: Mutex<usize>,
    /// Enrichment tasks spawned by `execute` and not yet awaited
    enrichment: Mutex<Vec<JoinHandle<()>>>,
    filters: watch::Sender<ElasticFilters>,
    results: watch::Sender<SearchResults>,
    loading: watch::Sender<bool>,
}

impl SearchOrchestrator<ElasticIndex, RelationResolver> {
    /// Wire the HTTP index connector and resolver from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = config.registry();
        registry.ensure_not_empty()?;

        let index = ElasticIndex::new(registry.clone(), &config.search, &config.http)?;
        let transport = Arc::new(HttpTransport::from_config(&config.http)?);
        let resolver = RelationResolver::new(transport, registry, config.predicates.clone());

        let orchestrator = Self::new(
            Arc::new(index),
            GraphEnricher::new(Arc::new(resolver)),
            &config.search,
        );
        orchestrator.set_query(config.search.default_query.clone());
        Ok(orchestrator)
    }
}

impl<I, S> SearchOrchestrator<I, S>
where
    I: SearchIndex + 'static,
    S: IncomingRelationSource + 'static,
{
    pub fn new(index: Arc<I>, enricher: GraphEnricher<S>, config: &SearchConfig) -> Self {
        let (filters, _) = watch::channel(ElasticFilters::default());
        let (results, _) = watch::channel(SearchResults::default());
        let (loading, _) = watch::channel(false);

        Self {
            index,
            enricher,
            page_size: config.results_per_page_per_endpoint.max(1),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            state: Mutex::new(SearchState::default()),
            in_flight: Mutex::new(0),
            enrichment: Mutex::new(Vec::new()),
            filters,
            results,
            loading,
        }
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.state().query = query.into();
    }

    pub fn query(&self) -> String {
        self.state().query.clone()
    }

    /// Index of the next page to request
    pub fn page(&self) -> usize {
        self.state().page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn enricher(&self) -> &GraphEnricher<S> {
        &self.enricher
    }

    pub fn filters(&self) -> ElasticFilters {
        self.filters.borrow().clone()
    }

    pub fn has_filter(&self, filter_id: &str, value: &str) -> bool {
        self.filters.borrow().has(filter_id, value)
    }

    /// Select `value` for `filter_id`, or deselect it if already selected
    pub fn toggle_filter(&self, filter_id: &str, value: &str) {
        self.filters.send_modify(|filters| filters.toggle(filter_id, value));
    }

    pub fn clear_filters(&self) {
        self.filters.send_if_modified(|filters| {
            if filters.is_empty() {
                return false;
            }
            *filters = ElasticFilters::default();
            true
        });
    }

    /// Drop all pages and restart from page zero
    pub fn clear_results(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.page = 0;
        self.results.send_replace(SearchResults::default());
        debug!(generation = state.generation, "Cleared search results");
    }

    pub fn results(&self) -> SearchResults {
        self.results.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe_filters(&self) -> watch::Receiver<ElasticFilters> {
        self.filters.subscribe()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<SearchResults> {
        self.results.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Request the next page and append it to the results
    ///
    /// With `clear_first` the results are reset to page zero beforehand.
    /// Returns the number of nodes appended; a response that arrives after a
    /// reset is discarded and counts as zero. On failure the published state
    /// is left as it was.
    pub async fn execute(&self, clear_first: bool) -> Result<usize> {
        if clear_first {
            self.clear_results();
        }
        let _loading = LoadingGuard::enter(&self.in_flight, &self.loading);

        let (query, page, generation) = {
            let state = self.state();
            (state.query.clone(), state.page, state.generation)
        };
        let filters = self.filters();
        let offset = page * self.page_size;
        debug!(query = %query, page, offset, "Executing search");

        let request = self
            .index
            .search_entities(&query, &filters, offset, self.page_size);
        let responses = match timeout(self.request_timeout, request).await {
            Ok(Ok(responses)) => responses,
            Ok(Err(e)) => {
                warn!(error = %e, "Error searching");
                return Err(e);
            }
            Err(_) => {
                let e = Error::Timeout(self.request_timeout.as_secs());
                warn!(error = %e, "Error searching");
                return Err(e);
            }
        };

        let hit_count: usize = responses.iter().map(|r| r.hits.hits.len()).sum();
        let type_counts = type_counts_from_responses(&responses);
        let nodes: Vec<SharedNode> = parse_to_nodes(&responses)
            .into_iter()
            .map(|node| node.into_shared())
            .collect();
        let added = nodes.len();

        {
            let mut state = self.state();
            if state.generation != generation {
                debug!(
                    stale = generation,
                    current = state.generation,
                    "Discarding stale search response"
                );
                return Ok(0);
            }
            if hit_count > 0 {
                state.page = state.page.max(page + 1);
            }
            let appended = nodes.clone();
            self.results.send_modify(|results| {
                results.nodes.extend(appended);
                results.type_counts = type_counts;
            });
        }

        if !nodes.is_empty() {
            let enricher = self.enricher.clone();
            let handle = tokio::spawn(async move {
                enricher.enrich_with_incoming_relations(nodes).await;
            });
            let mut pending = self.enrichment.lock().unwrap_or_else(PoisonError::into_inner);
            pending.retain(|task| !task.is_finished());
            pending.push(handle);
        }

        info!(hits = hit_count, added, page, "Search page loaded");
        Ok(added)
    }

    /// Wait until every enrichment task spawned so far has finished
    ///
    /// Nodes published before this call carry their incoming edges once it
    /// returns. Pages loaded concurrently may spawn tasks this call misses.
    pub async fn wait_for_enrichment(&self) {
        let pending = std::mem::take(
            &mut *self.enrichment.lock().unwrap_or_else(PoisonError::into_inner),
        );
        debug!(tasks = pending.len(), "Waiting for enrichment");
        for outcome in join_all(pending).await {
            if let Err(e) = outcome {
                warn!(error = %e, "Enrichment task did not complete");
            }
        }
    }

    /// Re-run the search from page zero whenever the filters change
    ///
    /// Rapid toggles collapse into one search for the latest filters. The
    /// task ends once the orchestrator is dropped.
    pub fn spawn_filter_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::downgrade(self);
        let changes = self.filters.subscribe();
        tokio::spawn(Self::run_filter_watch(orchestrator, changes))
    }

    async fn run_filter_watch(
        orchestrator: Weak<Self>,
        mut changes: watch::Receiver<ElasticFilters>,
    ) {
        while changes.changed().await.is_ok() {
            let Some(orchestrator) = orchestrator.upgrade() else {
                break;
            };
            // failures are already logged by execute
            let _ = orchestrator.execute(true).await;
        }
        debug!("Filter watch stopped");
    }

    fn state(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the loading flag up while at least one search is in flight
struct LoadingGuard<'a> {
    in_flight: &'a Mutex<usize>,
    loading: &'a watch::Sender<bool>,
}

impl<'a> LoadingGuard<'a> {
    fn enter(in_flight: &'a Mutex<usize>, loading: &'a watch::Sender<bool>) -> Self {
        let mut count = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        loading.send_replace(true);
        Self { in_flight, loading }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut count = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.loading.send_replace(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Direction, NodeModel};
    use crate::search::index::SearchResponse;
    use crate::sparql::SparqlIncomingRelation;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    type Page = Result<Vec<SearchResponse>>;

    /// Index replaying scripted pages and recording every request
    #[derive(Default)]
    struct MockIndex {
        pages: Mutex<VecDeque<Page>>,
        calls: Mutex<Vec<(String, ElasticFilters, usize, usize)>>,
        gated: bool,
        hang: bool,
        entered: Notify,
        gate: Notify,
    }

    impl MockIndex {
        fn new() -> Self {
            Self::default()
        }

        fn page(self, ids: &[&str]) -> Self {
            self.pages.lock().unwrap().push_back(Ok(vec![hits(ids)]));
            self
        }

        fn failure(self) -> Self {
            self.pages
                .lock()
                .unwrap()
                .push_back(Err(Error::SearchFailed("index down".to_string())));
            self
        }

        fn gated(mut self) -> Self {
            self.gated = true;
            self
        }

        fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }

        fn offsets(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(|c| c.2).collect()
        }
    }

    #[async_trait]
    impl SearchIndex for MockIndex {
        async fn search_entities(
            &self,
            query: &str,
            filters: &ElasticFilters,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<SearchResponse>> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), filters.clone(), offset, limit));
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.gated {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![hits(&[])]))
        }
    }

    /// Every node gets one incoming `seeAlso` edge from `http://e/src`
    #[derive(Default)]
    struct SeeAlsoSource {
        queried: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IncomingRelationSource for SeeAlsoSource {
        async fn incoming_relations(&self, node: &NodeModel) -> Result<Vec<SparqlIncomingRelation>> {
            let id = node.id().ok_or(Error::InvalidNode)?;
            self.queried.lock().unwrap().push(id.to_string());
            Ok(vec![SparqlIncomingRelation::new("http://e/src", SEE_ALSO)])
        }
    }

    const SEE_ALSO: &str = "http://www.w3.org/2000/01/rdf-schema#seeAlso";

    fn hits(ids: &[&str]) -> SearchResponse {
        let hits: Vec<_> = ids.iter().map(|id| json!({ "_id": id, "_source": {} })).collect();
        let mut response: SearchResponse = serde_json::from_value(json!({
            "hits": { "hits": hits },
            "aggregations": { "types": { "buckets": [
                { "key": "http://schema.org/Thing", "doc_count": ids.len() }
            ] } }
        }))
        .unwrap();
        response.endpoint_id = "mock".to_string();
        response
    }

    fn orchestrator(index: Arc<MockIndex>) -> SearchOrchestrator<MockIndex, SeeAlsoSource> {
        let config = SearchConfig {
            results_per_page_per_endpoint: 2,
            request_timeout_secs: 1,
            ..Default::default()
        };
        SearchOrchestrator::new(
            index,
            GraphEnricher::new(Arc::new(SeeAlsoSource::default())),
            &config,
        )
    }

    async fn ids(results: &SearchResults) -> Vec<String> {
        let mut ids = Vec::new();
        for node in &results.nodes {
            ids.push(node.read().await.id().unwrap_or_default().to_string());
        }
        ids
    }

    #[tokio::test]
    async fn test_pages_accumulate_and_empty_page_keeps_position() {
        let index = Arc::new(MockIndex::new().page(&["h1", "h2"]).page(&["h3"]).page(&[]));
        let search = orchestrator(index.clone());
        search.set_query("ada");

        assert_eq!(search.execute(false).await.unwrap(), 2);
        assert_eq!(search.execute(false).await.unwrap(), 1);
        assert_eq!(search.execute(false).await.unwrap(), 0);

        assert_eq!(search.page(), 2);
        assert_eq!(ids(&search.results()).await, vec!["h1", "h2", "h3"]);
        assert_eq!(index.offsets(), vec![0, 2, 4]);
        assert_eq!(index.calls.lock().unwrap()[0].0, "ada");
        assert!(!search.is_loading());
    }

    #[tokio::test]
    async fn test_type_counts_follow_latest_page() {
        let index = Arc::new(MockIndex::new().page(&["h1", "h2"]).page(&["h3"]));
        let search = orchestrator(index);

        search.execute(false).await.unwrap();
        search.execute(false).await.unwrap();

        assert_eq!(search.results().type_counts["http://schema.org/Thing"], 1);
    }

    #[tokio::test]
    async fn test_clear_first_restarts_from_page_zero() {
        let index = Arc::new(MockIndex::new().page(&["h1", "h2"]).page(&["n1"]));
        let search = orchestrator(index.clone());

        search.execute(false).await.unwrap();
        search.execute(true).await.unwrap();

        assert_eq!(ids(&search.results()).await, vec!["n1"]);
        assert_eq!(index.offsets(), vec![0, 0]);
        assert_eq!(search.page(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_results_and_clears_loading() {
        let index = Arc::new(MockIndex::new().page(&["h1"]).failure());
        let search = orchestrator(index);
        let loading = search.subscribe_loading();

        search.execute(false).await.unwrap();
        let err = search.execute(false).await.unwrap_err();

        assert!(matches!(err, Error::SearchFailed(_)));
        assert_eq!(ids(&search.results()).await, vec!["h1"]);
        assert_eq!(search.page(), 1);
        assert!(!*loading.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_index_times_out() {
        let search = orchestrator(Arc::new(MockIndex::new().hanging()));

        let err = search.execute(false).await.unwrap_err();

        assert!(matches!(err, Error::Timeout(1)));
        assert!(!search.is_loading());
        assert!(search.results().is_empty());
    }

    #[tokio::test]
    async fn test_response_after_reset_is_discarded() {
        let index = Arc::new(MockIndex::new().gated().page(&["old"]));
        let search = Arc::new(orchestrator(index.clone()));

        let pending = tokio::spawn({
            let search = search.clone();
            async move { search.execute(false).await }
        });
        index.entered.notified().await;
        assert!(search.is_loading());

        search.clear_results();
        index.gate.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), 0);
        assert!(search.results().is_empty());
        assert_eq!(search.page(), 0);
        assert!(!search.is_loading());
    }

    #[tokio::test]
    async fn test_nodes_are_enriched_in_place() {
        let search = orchestrator(Arc::new(MockIndex::new().page(&["h1"])));

        search.execute(false).await.unwrap();
        let node = search.results().nodes[0].clone();
        search.wait_for_enrichment().await;

        assert_eq!(
            node.read()
                .await
                .object_values_by_direction(&[SEE_ALSO], Direction::Incoming),
            vec!["http://e/src"]
        );
        assert!(Arc::ptr_eq(&node, &search.results().nodes[0]));
    }

    #[tokio::test]
    async fn test_each_page_is_enriched_once() {
        let index = Arc::new(MockIndex::new().page(&["h1", "h2"]).page(&["h3"]));
        let search = orchestrator(index);

        search.execute(false).await.unwrap();
        search.execute(false).await.unwrap();
        search.wait_for_enrichment().await;
        search.wait_for_enrichment().await;

        let mut queried = search.enricher().source().queried.lock().unwrap().clone();
        queried.sort();
        assert_eq!(queried, vec!["h1", "h2", "h3"]);
        for node in &search.results().nodes {
            assert_eq!(node.read().await.edge_count(), 1);
        }
    }

    #[test]
    fn test_from_config_requires_endpoints() {
        let result = SearchOrchestrator::from_config(&Config::default());
        assert!(matches!(result, Err(Error::NoEndpoints)));
    }

    #[test]
    fn test_from_config_applies_search_settings() {
        let config: Config = toml::from_str(
            r#"
[search]
default_query = "castle"
results_per_page_per_endpoint = 7

[[endpoints]]
id = "local"
sparql = "http://127.0.0.1:9/sparql"
"#,
        )
        .unwrap();

        let search = SearchOrchestrator::from_config(&config).unwrap();

        assert_eq!(search.query(), "castle");
        assert_eq!(search.page_size(), 7);
        assert_eq!(search.page(), 0);
        assert!(search.results().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_filter_publishes_and_inverts() {
        let search = orchestrator(Arc::new(MockIndex::new()));
        let mut filters = search.subscribe_filters();

        search.toggle_filter("@type", "http://schema.org/Person");
        assert!(filters.has_changed().unwrap());
        assert!(filters.borrow_and_update().has("@type", "http://schema.org/Person"));
        assert!(search.has_filter("@type", "http://schema.org/Person"));

        search.toggle_filter("@type", "http://schema.org/Person");
        assert!(search.filters().is_empty());

        filters.borrow_and_update();
        search.clear_filters();
        assert!(!filters.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_filter_change_triggers_fresh_search() {
        let index = Arc::new(MockIndex::new().page(&["h1"]).page(&["f1"]));
        let search = Arc::new(orchestrator(index.clone()));
        search.execute(false).await.unwrap();

        let watcher = search.spawn_filter_watch();
        let mut results = search.subscribe_results();
        search.toggle_filter("@type", "http://schema.org/Person");

        timeout(Duration::from_secs(5), async {
            loop {
                results.changed().await.unwrap();
                let fresh = results.borrow_and_update().nodes.first().cloned();
                if let Some(node) = fresh {
                    if node.read().await.id() == Some("f1") {
                        break;
                    }
                }
            }
        })
        .await
        .expect("filter search did not run");

        let calls = index.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].2, 0);
        assert!(calls[1].1.has("@type", "http://schema.org/Person"));
        assert_eq!(search.results().len(), 1);
        watcher.abort();
    }
}
