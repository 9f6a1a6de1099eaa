//! Engine configuration, read from the `[elevation]` table of a TOML file.

use crate::analysis::AnalyzerKind;
use crate::error::Result;
use crate::rules::RuleStore;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Default number of index snapshots whose providers stay cached.
pub const DEFAULT_MAX_CACHED_SNAPSHOTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analysis applied to rule and request queries.
    pub analyzer: AnalyzerKind,
    /// Default for requests that do not set `force_elevation`.
    pub force_elevation: bool,
    /// Fall back to the largest contained rule when no rule matches exactly.
    pub subset_matching: bool,
    /// Snapshot providers kept in memory; 0 keeps all of them.
    pub max_cached_snapshots: usize,
    /// Rule file, relative to the configuration file.
    pub rules: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerKind::default(),
            force_elevation: false,
            subset_matching: true,
            max_cached_snapshots: DEFAULT_MAX_CACHED_SNAPSHOTS,
            rules: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    elevation: EngineConfig,
}

impl EngineConfig {
    /// Parses the `[elevation]` table; a missing table yields the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).context("Invalid elevation configuration")?;
        Ok(file.elevation)
    }

    /// Reads a configuration file, resolving `rules` against its directory.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        let mut config = Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse configuration {}", path.display()))?;

        if let Some(rules) = config.rules.take() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.rules = Some(base.join(rules));
        }

        tracing::debug!("Loaded elevation configuration from {}", path.display());
        Ok(config)
    }

    pub fn cache_capacity(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.max_cached_snapshots)
    }

    /// A rule store with this configuration's analysis and matching mode.
    pub fn rule_store(&self) -> RuleStore {
        RuleStore::new(self.analyzer.build()).with_subset_matching(self.subset_matching)
    }
}
