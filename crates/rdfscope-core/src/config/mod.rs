//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::endpoint::{EndpointRegistry, EndpointUrls};

/// rdfscope configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: Vec<EndpointUrls>,
    #[serde(default)]
    pub predicates: PredicateConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Predicate IRIs with special meaning for resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateConfig {
    pub label: Vec<String>,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_query: String,
    pub results_per_page_per_endpoint: usize,
    pub type_field: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for PredicateConfig {
    fn default() -> Self {
        Self {
            label: vec![
                "http://www.w3.org/2000/01/rdf-schema#label".to_string(),
                "http://www.w3.org/2004/02/skos/core#prefLabel".to_string(),
            ],
            parents: vec![
                "http://www.w3.org/2000/01/rdf-schema#subClassOf".to_string(),
                "http://www.w3.org/2004/02/skos/core#broader".to_string(),
            ],
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_query: String::new(),
            results_per_page_per_endpoint: 20,
            type_field: "@type".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("RDFSCOPE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("rdfscope")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.id.trim().is_empty() {
                return Err(anyhow!("Endpoint with SPARQL URL {} has no id", endpoint.sparql));
            }
            if !seen.insert(endpoint.id.as_str()) {
                return Err(anyhow!("Duplicate endpoint id: {}", endpoint.id));
            }
            reqwest::Url::parse(&endpoint.sparql).with_context(|| {
                format!("Invalid SPARQL URL for endpoint {}: {}", endpoint.id, endpoint.sparql)
            })?;
            if let Some(elastic) = &endpoint.elastic {
                reqwest::Url::parse(elastic).with_context(|| {
                    format!("Invalid index URL for endpoint {}: {}", endpoint.id, elastic)
                })?;
            }
        }

        if self.search.results_per_page_per_endpoint == 0 {
            return Err(anyhow!("search.results_per_page_per_endpoint must be positive"));
        }
        if self.search.request_timeout_secs == 0 {
            return Err(anyhow!("search.request_timeout_secs must be positive"));
        }
        if self.http.timeout_secs == 0 {
            return Err(anyhow!("http.timeout_secs must be positive"));
        }

        Ok(())
    }

    /// Build the endpoint registry from the configured endpoints
    pub fn registry(&self) -> EndpointRegistry {
        EndpointRegistry::new(self.endpoints.clone())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "endpoints" => Ok(self
                .endpoints
                .iter()
                .map(|e| e.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")),

            // Predicate settings
            "predicates.label" => Ok(self.predicates.label.join(", ")),
            "predicates.parents" => Ok(self.predicates.parents.join(", ")),

            // Search settings
            "search.default_query" => Ok(self.search.default_query.clone()),
            "search.results_per_page_per_endpoint" => {
                Ok(self.search.results_per_page_per_endpoint.to_string())
            }
            "search.type_field" => Ok(self.search.type_field.clone()),
            "search.request_timeout_secs" => Ok(self.search.request_timeout_secs.to_string()),

            "http.timeout_secs" => Ok(self.http.timeout_secs.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `rdfscope config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "predicates.label" => {
                self.predicates.label = split_list(value);
            }
            "predicates.parents" => {
                self.predicates.parents = split_list(value);
            }
            "search.default_query" => {
                self.search.default_query = value.to_string();
            }
            "search.results_per_page_per_endpoint" => {
                let size: usize = value
                    .parse()
                    .with_context(|| format!("Invalid page size value: {}", value))?;
                if size == 0 {
                    return Err(anyhow!("Page size must be positive"));
                }
                self.search.results_per_page_per_endpoint = size;
            }
            "search.type_field" => {
                self.search.type_field = value.to_string();
            }
            "search.request_timeout_secs" => {
                self.search.request_timeout_secs = parse_timeout(value)
                    .with_context(|| format!("Invalid request_timeout_secs value: {}", value))?;
            }
            "http.timeout_secs" => {
                self.http.timeout_secs = parse_timeout(value)
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "endpoints" => {
                return Err(anyhow!(
                    "Endpoints are edited in the config file directly. Run `rdfscope config path` to locate it."
                ));
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `rdfscope config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "endpoints",
            "predicates.label",
            "predicates.parents",
            "search.default_query",
            "search.results_per_page_per_endpoint",
            "search.type_field",
            "search.request_timeout_secs",
            "http.timeout_secs",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }
}

fn parse_timeout(value: &str) -> anyhow::Result<u64> {
    match value.parse::<u64>()? {
        0 => Err(anyhow!("Timeout must be positive")),
        secs => Ok(secs),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
