//! Checker configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `kcorpus.toml` (or an explicit file), then `KCORPUS_*` environment
//! variables. Command-line flags are applied on top by the caller.

use std::path::{Path, PathBuf};

use kcorpus_shared::types::report::Severity;
use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_NAME: &str = "kcorpus";

/// Environment variable prefix (`KCORPUS_MAX_CONCURRENCY=4`)
pub const ENV_PREFIX: &str = "KCORPUS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Stub headers treated as one include path
    pub stub_paths: Vec<PathBuf>,

    /// Identifiers never reported as unresolved
    pub ignore_identifiers: Vec<String>,

    /// Upper bound on concurrently loaded sample files
    pub max_concurrency: usize,

    /// Findings below this severity are dropped from reports
    pub min_severity: Severity,

    /// Also require stubs to declare every struct/union/enum tag samples use
    pub include_tags: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            stub_paths: Vec::new(),
            ignore_identifiers: Vec::new(),
            max_concurrency: num_cpus::get(),
            min_severity: Severity::Info,
            include_tags: false,
        }
    }
}

impl CheckerConfig {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `kcorpus.toml` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("stub_paths")
                    .with_list_parse_key("ignore_identifiers"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn with_stubs(mut self, stubs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.stub_paths.extend(stubs);
        self
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_identifiers.iter().any(|i| i == name)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(CorpusError::InvalidConfig(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        for stub in &self.stub_paths {
            if !stub.is_file() {
                return Err(CorpusError::StubNotFound(stub.clone()));
            }
        }

        Ok(())
    }
}
