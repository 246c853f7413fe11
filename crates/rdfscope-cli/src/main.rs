//! Rdfscope CLI - federated RDF graph browser

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use rdfscope_core::config::Config;
use rdfscope_core::enrichment::GraphEnricher;
use rdfscope_core::node::{Direction, NodeModel, SharedNode};
use rdfscope_core::search::{ElasticFilters, SearchOrchestrator};
use rdfscope_core::sparql::{HttpTransport, RelationResolver};
use serde_json::json;
use tracing::debug;

#[derive(Parser)]
#[command(name = "rdfscope")]
#[command(author, version, about = "Federated RDF graph browser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the endpoint indexes
    Search {
        /// Free-text query (defaults to search.default_query)
        query: Option<String>,
        /// Term filter as id=value, repeatable
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: usize,
        /// Wait for incoming relations before printing
        #[arg(long)]
        incoming: bool,
    },

    /// Describe a node using the first endpoint that knows it
    Node {
        /// Node IRI
        id: String,
        /// Also attach incoming relations
        #[arg(long)]
        incoming: bool,
    },

    /// List subjects pointing at a node
    Incoming { id: String },

    /// Walk the parent predicates upwards from a node
    Ancestors { id: String },

    /// Look up labels for one or more nodes
    Labels {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List object values of a node for the given predicates
    Objects {
        id: String,
        /// Predicate IRI, repeatable
        #[arg(short, long = "predicate", required = true)]
        predicates: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rdfscope=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { action } => cmd_config(action, config_path, out),

        Commands::Search {
            query,
            filters,
            pages,
            incoming,
        } => {
            let config = load_config(config_path)?;
            cmd_search(&config, query, &filters, pages, incoming, out).await
        }

        Commands::Node { id, incoming } => {
            let resolver = build_resolver(&load_config(config_path)?)?;
            cmd_node(resolver, &id, incoming, out).await
        }

        Commands::Incoming { id } => {
            let resolver = build_resolver(&load_config(config_path)?)?;
            cmd_incoming(&resolver, &id, out).await
        }

        Commands::Ancestors { id } => {
            let resolver = build_resolver(&load_config(config_path)?)?;
            cmd_ancestors(&resolver, &id, out).await
        }

        Commands::Labels { ids } => {
            let resolver = build_resolver(&load_config(config_path)?)?;
            cmd_labels(&resolver, &ids, out).await
        }

        Commands::Objects { id, predicates } => {
            let resolver = build_resolver(&load_config(config_path)?)?;
            cmd_objects(&resolver, &id, &predicates, out).await
        }
    }
}

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn print_json(&self, value: &serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn build_resolver(config: &Config) -> anyhow::Result<RelationResolver> {
    let registry = config.registry();
    registry.ensure_not_empty()?;
    let transport = HttpTransport::from_config(&config.http)?;
    Ok(RelationResolver::new(
        Arc::new(transport),
        registry,
        config.predicates.clone(),
    ))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_search(
    config: &Config,
    query: Option<String>,
    filters: &[String],
    pages: usize,
    incoming: bool,
    out: Output,
) -> anyhow::Result<()> {
    let filters = ElasticFilters::from_pairs(filters)
        .ok_or_else(|| anyhow!("Filters must be given as id=value"))?;

    let search = SearchOrchestrator::from_config(config)?;
    if let Some(query) = query {
        search.set_query(query);
    }
    for (filter_id, values) in &filters.terms {
        for value in values {
            search.toggle_filter(filter_id, value);
        }
    }

    for page in 0..pages.max(1) {
        let added = search.execute(false).await?;
        debug!(page, added, "Loaded page");
        if added == 0 {
            break;
        }
    }

    if incoming {
        search.wait_for_enrichment().await;
    }
    let results = search.results();

    if out.json() {
        let nodes = snapshot(&results.nodes).await;
        return out.print_json(&json!({
            "query": search.query(),
            "page": search.page(),
            "nodes": nodes,
            "typeCounts": results.type_counts,
        }));
    }

    if results.is_empty() {
        if !out.quiet {
            println!("No results.");
        }
        return Ok(());
    }

    if !out.quiet {
        println!("Results ({}):", results.len());
    }
    for node in &results.nodes {
        let node = node.read().await;
        println!(
            "  {} [{}] {} edges",
            node.id().unwrap_or("<no id>"),
            node.endpoint_id().unwrap_or("?"),
            node.edge_count()
        );
    }
    if !out.quiet && !results.type_counts.is_empty() {
        println!("\nTypes:");
        for (type_iri, count) in &results.type_counts {
            println!("  {} ({})", type_iri, count);
        }
    }
    Ok(())
}

async fn cmd_node(
    resolver: RelationResolver,
    id: &str,
    incoming: bool,
    out: Output,
) -> anyhow::Result<()> {
    let resolver = Arc::new(resolver);
    let node = resolver.resolve_node(id).await?.into_shared();

    if incoming {
        GraphEnricher::new(resolver)
            .enrich_with_incoming_relations(vec![node.clone()])
            .await;
    }

    let node = node.read().await;
    if out.json() {
        return out.print_json(&serde_json::to_value(&*node)?);
    }
    print_node(&node, out.quiet);
    Ok(())
}

async fn cmd_incoming(resolver: &RelationResolver, id: &str, out: Output) -> anyhow::Result<()> {
    let relations = resolver
        .resolve_incoming_relations(&NodeModel::with_id(id))
        .await?;

    if out.json() {
        return out.print_json(&serde_json::to_value(&relations)?);
    }
    if relations.is_empty() && !out.quiet {
        println!("No incoming relations for {}.", id);
    }
    for relation in relations {
        println!("  {} --{}--> {}", relation.sub, relation.pred, id);
    }
    Ok(())
}

async fn cmd_ancestors(resolver: &RelationResolver, id: &str, out: Output) -> anyhow::Result<()> {
    let parents = resolver.resolve_ancestry(&NodeModel::with_id(id)).await?;

    if out.json() {
        return out.print_json(&serde_json::to_value(&parents)?);
    }
    if parents.is_empty() && !out.quiet {
        println!("No ancestors found for {}.", id);
    }
    for parent in parents {
        let title = parent.title.as_deref().unwrap_or("");
        match parent.parent {
            Some(up) => println!("  {} {} (parent: {})", parent.id, title, up),
            None => println!("  {} {}", parent.id, title),
        }
    }
    Ok(())
}

async fn cmd_labels(resolver: &RelationResolver, ids: &[String], out: Output) -> anyhow::Result<()> {
    let labels = resolver.resolve_labels(ids).await?;

    if out.json() {
        return out.print_json(&serde_json::to_value(&labels)?);
    }
    for thing in labels {
        println!("  {} = {}", thing.id, thing.label);
    }
    Ok(())
}

async fn cmd_objects(
    resolver: &RelationResolver,
    id: &str,
    predicates: &[String],
    out: Output,
) -> anyhow::Result<()> {
    let objects = resolver.resolve_object_ids(id, predicates).await?;

    if out.json() {
        return out.print_json(&json!(objects));
    }
    if objects.is_empty() && !out.quiet {
        println!("No objects found.");
    }
    for object in objects {
        println!("  {}", object);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, path: Option<&Path>, out: Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = load_config(path)?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = load_config_or_default(path)?;
            config.set(&key, &value)?;
            match path {
                Some(path) => config.save_to(path)?,
                None => config.save()?,
            }
            if !out.quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = load_config(path)?;
            let items = config.list()?;
            if out.json() {
                let map: serde_json::Map<_, _> = items
                    .into_iter()
                    .map(|(key, value)| (key, json!(value)))
                    .collect();
                return out.print_json(&serde_json::Value::Object(map));
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = match path {
                Some(path) => path.to_path_buf(),
                None => Config::config_path()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// An explicit `--config` path may not exist yet when setting the first key
fn load_config_or_default(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) if !path.exists() => Ok(Config::default()),
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Could not load {}", path.display())),
        None => Config::load(),
    }
}

fn print_node(node: &NodeModel, quiet: bool) {
    if !quiet {
        println!("Node: {}", node.id().unwrap_or("<no id>"));
        if let Some(endpoint) = node.endpoint_id() {
            println!("  Endpoint: {}", endpoint);
        }
    }
    for predicate in node.predicates() {
        let outgoing = node.object_values_by_direction(&[predicate], Direction::Outgoing);
        let incoming = node.object_values_by_direction(&[predicate], Direction::Incoming);
        for value in outgoing {
            println!("  {} -> {}", predicate, value);
        }
        for value in incoming {
            println!("  {} <- {}", predicate, value);
        }
    }
}

async fn snapshot(nodes: &[SharedNode]) -> Vec<NodeModel> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        out.push(node.read().await.clone());
    }
    out
}
