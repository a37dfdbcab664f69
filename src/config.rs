/// Configuration module.
///
/// Settings come from built-in defaults, an optional JSON file, `GRAPHQL_DOCS_*`
/// environment variables and command-line flags, in increasing precedence.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENV_DOCS_PATH: &str = "GRAPHQL_DOCS_PATH";
pub const ENV_DB_PATH: &str = "GRAPHQL_DOCS_DB_PATH";
pub const ENV_TOP_K: &str = "GRAPHQL_DOCS_TOP_K";
pub const ENV_MAX_FIELDS: &str = "GRAPHQL_DOCS_MAX_FIELDS";
pub const ENV_CODE_PREVIEW: &str = "GRAPHQL_DOCS_CODE_PREVIEW";

/// Used as the documentation root when nothing else is configured.
const LOCAL_DOCS_DIR: &str = "data";

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    match dirs::home_dir() {
        Some(home) => home
            .join(".mcp")
            .join("graphql-docs")
            .join("database.db")
            .to_string_lossy()
            .into_owned(),
        None => "./graphql-docs.db".to_string(),
    }
}

fn default_search_top_k() -> usize {
    5
}

fn default_max_fields() -> usize {
    20
}

fn default_code_preview() -> usize {
    400
}

fn default_max_examples() -> usize {
    3
}

fn default_schema_language() -> String {
    "graphql".to_string()
}

// ── Config struct ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Documentation root. Resolved by [`Config::resolve_docs_path`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_path: Option<String>,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default = "default_max_fields")]
    pub max_fields_per_element: usize,

    /// Characters of code shown per block in tool output.
    #[serde(default = "default_code_preview")]
    pub max_code_preview: usize,

    #[serde(default = "default_max_examples")]
    pub max_examples_per_element: usize,

    /// Fence language scanned for schema elements.
    #[serde(default = "default_schema_language")]
    pub schema_language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs_path: None,
            db_path: default_db_path(),
            search_top_k: default_search_top_k(),
            max_fields_per_element: default_max_fields(),
            max_code_preview: default_code_preview(),
            max_examples_per_element: default_max_examples(),
            schema_language: default_schema_language(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`. A missing file
    /// yields the defaults; a file that cannot be read or decoded is an error.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON in config: {path}"))?;

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Apply `GRAPHQL_DOCS_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_DOCS_PATH) {
            self.docs_path = Some(v);
        }
        if let Some(v) = get(ENV_DB_PATH) {
            self.db_path = v;
        }
        if let Some(v) = get(ENV_TOP_K) {
            self.search_top_k = parse_count(ENV_TOP_K, &v)?;
        }
        if let Some(v) = get(ENV_MAX_FIELDS) {
            self.max_fields_per_element = parse_count(ENV_MAX_FIELDS, &v)?;
        }
        if let Some(v) = get(ENV_CODE_PREVIEW) {
            self.max_code_preview = parse_count(ENV_CODE_PREVIEW, &v)?;
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.max_fields_per_element > 0,
            "max_fields_per_element must be positive"
        );
        anyhow::ensure!(self.max_code_preview > 0, "max_code_preview must be positive");
        anyhow::ensure!(
            self.max_examples_per_element > 0,
            "max_examples_per_element must be positive"
        );
        anyhow::ensure!(
            !self.schema_language.trim().is_empty(),
            "schema_language must not be empty"
        );
        anyhow::ensure!(!self.db_path.trim().is_empty(), "db_path must not be empty");
        Ok(())
    }

    /// The documentation root, relative paths taken against the working directory.
    pub fn resolve_docs_path(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("failed to read working directory")?;
        self.resolve_docs_path_in(&cwd)
    }

    /// An explicitly configured root must exist. Without one, `<base>/data` is
    /// used if present.
    pub fn resolve_docs_path_in(&self, base: &Path) -> Result<PathBuf> {
        if let Some(configured) = &self.docs_path {
            let path = base.join(configured);
            anyhow::ensure!(
                path.is_dir(),
                "documentation directory {} does not exist",
                path.display()
            );
            return Ok(path);
        }

        let local = base.join(LOCAL_DOCS_DIR);
        if local.is_dir() {
            return Ok(local);
        }

        anyhow::bail!(
            "no documentation directory found. Set one of:\n  \
             1. the --docs <PATH> command-line flag\n  \
             2. the {ENV_DOCS_PATH} environment variable\n  \
             3. \"docs_path\" in the JSON config file\n  \
             4. a ./{LOCAL_DOCS_DIR} directory in the working directory"
        )
    }

    /// Store location, with its parent directory created.
    pub fn prepare_db_path(&self) -> Result<PathBuf> {
        let path = PathBuf::from(&self.db_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(path)
    }

    /// Settings that change the rows ingestion derives from the same files.
    #[must_use]
    pub fn ingest_salt(&self) -> String {
        format!(
            "{}:{}",
            self.schema_language.to_lowercase(),
            self.max_fields_per_element
        )
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got {value:?}"))
}

// ── Tests ────────────────────────────────────────────────────────────
