//! The query elevation engine as a search handler sees it.
//!
//! [`QueryElevator`] ties the pieces together: it loads rules from a
//! [`RuleSource`], caches one provider per index snapshot, holds ad-hoc rule
//! overrides and runs the merge for each request.

use crate::cache::SnapshotCache;
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::merge::{
    DocumentSource, ElevationMarks, Group, MergeRequest, MergedGroup, NoDocuments, SortOrder,
    merge, merge_groups,
};
use crate::params::ElevationParams;
use crate::provider::ElevationProvider;
use crate::rules::{ElevationRule, RawRule, RuleSource, RuleStore, StaticRules};
use crate::types::{Candidate, MergedDoc, SnapshotKey};
use parking_lot::RwLock;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Shared elevation state for all requests of one search handler.
pub struct QueryElevator<K = SnapshotKey> {
    config: EngineConfig,
    store: RuleStore,
    source: Arc<dyn RuleSource>,
    /// Rules set at runtime; they win over configured rules with the same key.
    overrides: RwLock<Vec<ElevationRule>>,
    cache: SnapshotCache<K>,
    /// Most recent provider that built successfully, served when the source
    /// breaks.
    last_good: RwLock<LastGood>,
}

/// Fallback provider tagged with the rule epoch it was built in.
///
/// The epoch moves on every reload and override change, so a build that
/// started before one of those cannot replace the fallback afterwards.
struct LastGood {
    epoch: u64,
    provider: Arc<ElevationProvider>,
}

impl LastGood {
    fn advance(&mut self, provider: Option<Arc<ElevationProvider>>) {
        self.epoch += 1;
        if let Some(provider) = provider {
            self.provider = provider;
        }
    }
}

impl<K: Hash + Eq> fmt::Debug for QueryElevator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryElevator")
            .field("config", &self.config)
            .field("source", &self.source.describe())
            .field("overrides", &self.overrides.read().len())
            .field("cache", &self.cache)
            .finish()
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> QueryElevator<K> {
    /// Validates the source's current rules and sets up an empty cache.
    pub fn new(config: EngineConfig, source: Arc<dyn RuleSource>) -> Result<Self, ConfigError> {
        let store = config.rule_store();
        let provider = store.load(&source.load()?)?;
        tracing::info!(
            "Loaded {} elevation rules from {} (analyzer: {}, fingerprint: {:016x})",
            provider.size(),
            source.describe(),
            config.analyzer,
            provider.fingerprint()
        );

        Ok(Self {
            cache: SnapshotCache::new(config.cache_capacity()),
            config,
            store,
            source,
            overrides: RwLock::new(Vec::new()),
            last_good: RwLock::new(LastGood {
                epoch: 0,
                provider: Arc::new(provider),
            }),
        })
    }

    /// An elevator over a fixed rule list.
    pub fn with_rules(config: EngineConfig, rules: Vec<RawRule>) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(StaticRules(rules)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of snapshots with a cached provider.
    pub fn cached_snapshots(&self) -> usize {
        self.cache.len()
    }

    /// The provider for `snapshot`, building it from the rule source on first
    /// use.
    pub fn provider(&self, snapshot: &K) -> Arc<ElevationProvider> {
        self.cache.get_or_build_shared(snapshot, || {
            let epoch = self.last_good.read().epoch;
            self.build_or_fall_back(snapshot, epoch)
        })
    }

    fn build_or_fall_back(&self, snapshot: &K, epoch: u64) -> Arc<ElevationProvider> {
        match self.build_provider() {
            Ok(provider) => {
                let mut last_good = self.last_good.write();
                if last_good.epoch == epoch {
                    last_good.provider = Arc::clone(&provider);
                } else {
                    tracing::debug!("Rules changed while building {:?}, keeping newer fallback", snapshot);
                }
                provider
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load elevation rules for {:?} from {}, serving previous rules: {}",
                    snapshot,
                    self.source.describe(),
                    e
                );
                Arc::clone(&self.last_good.read().provider)
            }
        }
    }

    fn build_provider(&self) -> Result<Arc<ElevationProvider>, ConfigError> {
        let records = self.source.load()?;
        let overrides = self.overrides.read();
        Ok(Arc::new(self.store.load_with_overrides(&records, &overrides)?))
    }

    /// Re-reads and validates the rules, then drops every cached provider.
    ///
    /// On failure nothing changes and requests keep the previous rules.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let start = std::time::Instant::now();
        let provider = self.build_provider().inspect_err(|e| {
            tracing::error!("Elevation reload from {} failed: {}", self.source.describe(), e);
        })?;

        let count = provider.size();
        self.last_good.write().advance(Some(provider));
        self.cache.invalidate_all();
        tracing::info!("Reloaded {} elevation rules in {:?}", count, start.elapsed());
        Ok(count)
    }

    /// Sets the elevated and excluded documents for `query` at runtime.
    ///
    /// Empty lists remove a previously set override. Takes effect for every
    /// snapshot on its next request.
    pub fn set_top_query_results<E, X>(
        &self,
        query: &str,
        elevate: E,
        exclude: X,
    ) -> Result<(), ConfigError>
    where
        E: IntoIterator,
        E::Item: Into<String>,
        X: IntoIterator,
        X::Item: Into<String>,
    {
        let raw = RawRule::new(query, elevate, exclude);
        let analyzer = self.store.analyzer();

        if raw.elevate.is_empty() && raw.exclude.is_empty() {
            let key = analyzer.key(query);
            self.overrides.write().retain(|rule| *rule.key() != key);
            tracing::debug!("Removed elevation override for '{}'", query);
        } else {
            let rule = ElevationRule::from_raw(&raw, analyzer.as_ref())?;
            let mut overrides = self.overrides.write();
            match overrides.iter_mut().find(|existing| existing.key() == rule.key()) {
                Some(existing) => *existing = rule,
                None => overrides.push(rule),
            }
            tracing::debug!("Set elevation override for '{}'", query);
        }

        self.last_good.write().advance(None);
        self.cache.invalidate_all();
        Ok(())
    }

    /// Drops every cached provider; the next request per snapshot rebuilds.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Merges `ranked` with the elevation that applies to `query`.
    pub fn elevate(
        &self,
        snapshot: &K,
        query: &str,
        params: &ElevationParams,
        sort: SortOrder,
        ranked: &[Candidate],
        documents: &dyn DocumentSource,
    ) -> Vec<MergedDoc> {
        self.elevate_inner(snapshot, query, params, sort, ranked, documents, false)
    }

    /// Like [`QueryElevator::elevate`] for candidates already reduced to one
    /// document per collapse group (plus any kept elevated documents).
    pub fn elevate_collapsed(
        &self,
        snapshot: &K,
        query: &str,
        params: &ElevationParams,
        sort: SortOrder,
        ranked: &[Candidate],
    ) -> Vec<MergedDoc> {
        self.elevate_inner(snapshot, query, params, sort, ranked, &NoDocuments, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn elevate_inner(
        &self,
        snapshot: &K,
        query: &str,
        params: &ElevationParams,
        sort: SortOrder,
        ranked: &[Candidate],
        documents: &dyn DocumentSource,
        collapsed: bool,
    ) -> Vec<MergedDoc> {
        if !params.enable {
            return ranked.iter().map(MergedDoc::plain).collect();
        }

        let provider = self.provider(snapshot);
        let mut request = self.request(&provider, query, params, sort);
        request.candidates_collapsed = collapsed;

        merge(&request, ranked, documents).unwrap_or_else(|e| {
            tracing::warn!("Ignoring elevation for query '{}': {}", query, e);
            ranked.iter().map(MergedDoc::plain).collect()
        })
    }

    /// Grouped counterpart of [`QueryElevator::elevate`].
    pub fn elevate_groups<G: Clone>(
        &self,
        snapshot: &K,
        query: &str,
        params: &ElevationParams,
        sort: SortOrder,
        group_sort: Option<&SortOrder>,
        groups: &[Group<G>],
    ) -> Vec<MergedGroup<G>> {
        let plain = || -> Vec<MergedGroup<G>> {
            groups
                .iter()
                .map(|group| MergedGroup {
                    value: group.value.clone(),
                    docs: group.docs.iter().map(MergedDoc::plain).collect(),
                })
                .collect()
        };
        if !params.enable {
            return plain();
        }

        let provider = self.provider(snapshot);
        let request = self.request(&provider, query, params, sort);
        merge_groups(&request, group_sort, groups).unwrap_or_else(|e| {
            tracing::warn!("Ignoring elevation for grouped query '{}': {}", query, e);
            plain()
        })
    }

    /// Elevation membership for `query`, for use while collapsing results.
    pub fn marks(&self, snapshot: &K, query: &str, params: &ElevationParams) -> Option<ElevationMarks> {
        if !params.enable {
            return None;
        }

        let provider = self.provider(snapshot);
        let request = self.request(&provider, query, params, SortOrder::Relevance);
        ElevationMarks::for_request(&request).unwrap_or_else(|e| {
            tracing::warn!("Ignoring elevation for query '{}': {}", query, e);
            None
        })
    }

    fn request<'a>(
        &self,
        provider: &'a ElevationProvider,
        query: &str,
        params: &ElevationParams,
        sort: SortOrder,
    ) -> MergeRequest<'a> {
        let rule = provider.lookup_text(query);
        if let Some(rule) = rule {
            tracing::debug!("Query '{}' matched elevation rule '{}'", query, rule.query());
        }

        MergeRequest::new(rule)
            .with_policy(params.policy(self.config.force_elevation))
            .with_sort(sort)
            .with_ids(params.elevate_ids.clone(), params.exclude_ids.clone())
    }
}
