//! Elevation rule records, rule files and the rule store that validates them.

use crate::analysis::Analyzer;
use crate::error::{ConfigError, Result};
use crate::provider::ElevationProvider;
use crate::types::{DocId, TokenKey};
use ahash::{AHashMap, AHashSet};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xxhash_rust::xxh3::Xxh3;

/// A rule record as written by the operator, before analysis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRule {
    /// Query text the rule applies to.
    pub query: String,
    /// Documents to pin to the top, in priority order.
    #[serde(default)]
    pub elevate: Vec<String>,
    /// Documents to remove from the results.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl RawRule {
    pub fn new<E, X>(query: impl Into<String>, elevate: E, exclude: X) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        X: IntoIterator,
        X::Item: Into<String>,
    {
        Self {
            query: query.into(),
            elevate: elevate.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }
}

/// Contents of a rule file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RawRule>,
}

impl RuleSet {
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Parses by file extension: `.json` is JSON, anything else TOML.
    pub fn parse(path: &Path, text: &str) -> std::result::Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(text)
        } else {
            Self::from_toml_str(text)
        }
    }

    /// Reads and parses a rule file without blocking the runtime.
    pub async fn read(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read rule file {}", path.display()))?;
        Self::parse(path, &text)
            .with_context(|| format!("Failed to parse rule file {}", path.display()))
    }
}

/// Where rule records come from when a provider is (re)built.
pub trait RuleSource: Send + Sync {
    fn load(&self) -> std::result::Result<Vec<RawRule>, ConfigError>;

    /// Short description for log lines.
    fn describe(&self) -> String;
}

/// A fixed, in-memory list of rules.
#[derive(Debug, Clone, Default)]
pub struct StaticRules(pub Vec<RawRule>);

impl RuleSource for StaticRules {
    fn load(&self) -> std::result::Result<Vec<RawRule>, ConfigError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("{} static rules", self.0.len())
    }
}

/// A TOML or JSON rule file, re-read on every load.
#[derive(Debug, Clone)]
pub struct RuleFile {
    path: PathBuf,
}

impl RuleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RuleSource for RuleFile {
    fn load(&self) -> std::result::Result<Vec<RawRule>, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(RuleSet::parse(&self.path, &text)?.rules)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Elevated and excluded documents, shared by configured rules and
/// per-request overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Elevation {
    elevated: Vec<DocId>,
    excluded: AHashSet<DocId>,
}

impl Elevation {
    /// Builds an elevation, keeping the first occurrence of repeated ids.
    ///
    /// Returns the first id found in both lists as the error value.
    pub fn new<E, X>(elevate: E, exclude: X) -> std::result::Result<Self, DocId>
    where
        E: IntoIterator,
        E::Item: Into<DocId>,
        X: IntoIterator,
        X::Item: Into<DocId>,
    {
        let excluded: AHashSet<DocId> = exclude.into_iter().map(Into::into).collect();
        let mut seen = AHashSet::new();
        let mut elevated = Vec::new();
        for id in elevate {
            let id = id.into();
            if excluded.contains(&id) {
                return Err(id);
            }
            if seen.insert(id.clone()) {
                elevated.push(id);
            }
        }
        Ok(Self { elevated, excluded })
    }

    /// Elevated ids in priority order.
    pub fn elevated_ids(&self) -> &[DocId] {
        &self.elevated
    }

    pub fn excluded_ids(&self) -> &AHashSet<DocId> {
        &self.excluded
    }

    pub fn is_elevated(&self, id: &DocId) -> bool {
        self.elevated.contains(id)
    }

    pub fn is_excluded(&self, id: &DocId) -> bool {
        self.excluded.contains(id)
    }

    /// Map from elevated id to its priority (0 is the top).
    pub(crate) fn priorities(&self) -> AHashMap<&DocId, usize> {
        self.elevated
            .iter()
            .enumerate()
            .map(|(rank, id)| (id, rank))
            .collect()
    }
}

/// A validated rule: analyzed key plus its elevation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationRule {
    query: String,
    key: TokenKey,
    elevation: Elevation,
}

impl ElevationRule {
    /// Analyzes and validates a raw record.
    pub fn from_raw(raw: &RawRule, analyzer: &dyn Analyzer) -> std::result::Result<Self, ConfigError> {
        let key = analyzer.key(&raw.query);
        if key.is_empty() {
            return Err(ConfigError::EmptyQuery {
                query: raw.query.clone(),
            });
        }

        let elevation = Elevation::new(
            raw.elevate.iter().map(String::as_str),
            raw.exclude.iter().map(String::as_str),
        )
        .map_err(|id| ConfigError::ConflictingId {
            query: raw.query.clone(),
            id: id.to_string(),
        })?;

        Ok(Self {
            query: raw.query.clone(),
            key,
            elevation,
        })
    }

    /// Query text as configured.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn key(&self) -> &TokenKey {
        &self.key
    }

    pub fn elevation(&self) -> &Elevation {
        &self.elevation
    }

    pub fn elevated_ids(&self) -> &[DocId] {
        self.elevation.elevated_ids()
    }

    pub fn excluded_ids(&self) -> &AHashSet<DocId> {
        self.elevation.excluded_ids()
    }
}

/// Turns rule records into an [`ElevationProvider`].
#[derive(Debug, Clone)]
pub struct RuleStore {
    analyzer: Arc<dyn Analyzer>,
    subset_matching: bool,
}

impl RuleStore {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            analyzer,
            subset_matching: true,
        }
    }

    /// Disables best-subset lookups on the providers this store builds.
    pub fn with_subset_matching(mut self, enabled: bool) -> Self {
        self.subset_matching = enabled;
        self
    }

    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    /// Validates the records and builds a provider.
    pub fn load(&self, records: &[RawRule]) -> std::result::Result<ElevationProvider, ConfigError> {
        self.load_with_overrides(records, &[])
    }

    /// Like [`RuleStore::load`], then lets `overrides` replace configured rules
    /// that share their key (or add new ones at the end).
    pub fn load_with_overrides(
        &self,
        records: &[RawRule],
        overrides: &[ElevationRule],
    ) -> std::result::Result<ElevationProvider, ConfigError> {
        let start = std::time::Instant::now();
        let mut rules: Vec<ElevationRule> = Vec::with_capacity(records.len() + overrides.len());
        let mut positions: AHashMap<TokenKey, usize> = AHashMap::with_capacity(records.len());

        for raw in records {
            let rule = ElevationRule::from_raw(raw, self.analyzer.as_ref())?;
            if let Some(&previous) = positions.get(rule.key()) {
                return Err(ConfigError::DuplicateRule {
                    query: raw.query.clone(),
                    previous: rules[previous].query.clone(),
                });
            }
            positions.insert(rule.key.clone(), rules.len());
            rules.push(rule);
        }

        for rule in overrides {
            match positions.get(rule.key()) {
                Some(&index) => rules[index] = rule.clone(),
                None => {
                    positions.insert(rule.key.clone(), rules.len());
                    rules.push(rule.clone());
                }
            }
        }

        let provider = ElevationProvider::new(
            rules,
            Arc::clone(&self.analyzer),
            self.subset_matching,
            fingerprint(records),
        );

        tracing::debug!(
            "Loaded {} elevation rules ({} overrides) in {:?}",
            provider.size(),
            overrides.len(),
            start.elapsed()
        );

        Ok(provider)
    }
}

/// Content hash of a rule list, used to tell configurations apart in logs.
pub fn fingerprint(records: &[RawRule]) -> u64 {
    let mut hasher = Xxh3::new();
    for raw in records {
        hasher.update(raw.query.as_bytes());
        hasher.update(&[0]);
        for id in &raw.elevate {
            hasher.update(id.as_bytes());
            hasher.update(&[1]);
        }
        for id in &raw.exclude {
            hasher.update(id.as_bytes());
            hasher.update(&[2]);
        }
        hasher.update(&[3]);
    }
    hasher.digest()
}
