//! Merging elevation rules into ranked result lists.
//!
//! A merge takes the ranked candidates of one query, the elevation that applies
//! to it (a configured rule or per-request ids) and a [`MergePolicy`], and
//! produces the final ordered, annotated document list.

// Module declarations
pub(crate) mod group;
pub(crate) mod marks;

// Public re-exports (used via lib.rs)
pub use group::{Group, MergedGroup, merge_groups};
pub use marks::ElevationMarks;

use crate::error::OverrideError;
use crate::rules::{Elevation, ElevationRule};
use crate::types::{Candidate, DocId, MergedDoc};
use ahash::{AHashMap, AHashSet};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied ordering for non-relevance sorts.
pub type Comparator = Arc<dyn Fn(&Candidate, &Candidate) -> Ordering + Send + Sync>;

/// The order the query executor ranked candidates in.
#[derive(Clone, Default)]
pub enum SortOrder {
    /// Score descending.
    #[default]
    Relevance,
    Explicit(Comparator),
}

impl SortOrder {
    pub fn explicit<F>(compare: F) -> Self
    where
        F: Fn(&Candidate, &Candidate) -> Ordering + Send + Sync + 'static,
    {
        Self::Explicit(Arc::new(compare))
    }

    pub fn is_relevance(&self) -> bool {
        matches!(self, Self::Relevance)
    }

    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        match self {
            Self::Relevance => b.score.total_cmp(&a.score),
            Self::Explicit(compare) => compare(a, b),
        }
    }

    /// Stable sort, so equal candidates keep their ranked order.
    pub(crate) fn sort(&self, candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Debug for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relevance => f.write_str("Relevance"),
            Self::Explicit(_) => f.write_str("Explicit(..)"),
        }
    }
}

/// Per-request switches controlling how elevation reshapes results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    /// Boost elevated documents even when the sort is not relevance.
    pub force_elevation: bool,
    /// Return only elevated documents.
    pub exclusive: bool,
    /// Keep excluded documents, flagged, instead of removing them.
    pub mark_excludes: bool,
    /// Never add elevated documents the query did not match.
    pub elevate_only_matching_query: bool,
    /// Order boosted documents as configured rather than by the sort.
    pub use_configured_elevated_order: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            force_elevation: false,
            exclusive: false,
            mark_excludes: false,
            elevate_only_matching_query: false,
            use_configured_elevated_order: true,
        }
    }
}

/// Resolves document ids that did not match the query.
///
/// Used to pull configured elevated documents into results that would
/// otherwise miss them. Ids it cannot resolve are ignored.
pub trait DocumentSource {
    fn fetch(&self, id: &DocId) -> Option<Candidate>;
}

impl<F> DocumentSource for F
where
    F: Fn(&DocId) -> Option<Candidate>,
{
    fn fetch(&self, id: &DocId) -> Option<Candidate> {
        self(id)
    }
}

/// A source that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocuments;

impl DocumentSource for NoDocuments {
    fn fetch(&self, _id: &DocId) -> Option<Candidate> {
        None
    }
}

/// Everything a merge needs besides the candidates themselves.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest<'a> {
    /// Rule matched by the query, if any.
    pub rule: Option<&'a ElevationRule>,
    /// Explicit elevated ids; replaces `rule` when either list is present.
    pub elevate_ids: Option<Vec<DocId>>,
    pub exclude_ids: Option<Vec<DocId>>,
    pub policy: MergePolicy,
    pub sort: SortOrder,
    /// Candidates were already reduced to one per collapse group.
    pub candidates_collapsed: bool,
}

impl<'a> MergeRequest<'a> {
    pub fn new(rule: Option<&'a ElevationRule>) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_ids(mut self, elevate: Option<Vec<DocId>>, exclude: Option<Vec<DocId>>) -> Self {
        self.elevate_ids = elevate;
        self.exclude_ids = exclude;
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.candidates_collapsed = true;
        self
    }

    /// True when the active sort lets elevated documents move.
    pub fn boosts(&self) -> bool {
        self.sort.is_relevance() || self.policy.force_elevation
    }

    /// The elevation this request applies, explicit ids taking precedence over
    /// the matched rule.
    pub fn effective_elevation(&self) -> Result<Option<Cow<'a, Elevation>>, OverrideError> {
        if self.elevate_ids.is_none() && self.exclude_ids.is_none() {
            return Ok(self.rule.map(|rule| Cow::Borrowed(rule.elevation())));
        }

        let elevate = self.elevate_ids.iter().flatten().cloned();
        let exclude = self.exclude_ids.iter().flatten().cloned();
        Elevation::new(elevate, exclude)
            .map(|elevation| Some(Cow::Owned(elevation)))
            .map_err(|id| OverrideError::ConflictingId { id: id.to_string() })
    }
}

/// Merges one ranked result list with the request's elevation.
pub fn merge(
    request: &MergeRequest<'_>,
    ranked: &[Candidate],
    documents: &dyn DocumentSource,
) -> Result<Vec<MergedDoc>, OverrideError> {
    let Some(elevation) = request.effective_elevation()? else {
        let mut natural = ranked.to_vec();
        request.sort.sort(&mut natural);
        return Ok(natural.iter().map(MergedDoc::plain).collect());
    };

    let fetch_absent =
        !request.policy.elevate_only_matching_query && !request.candidates_collapsed;
    let documents = fetch_absent.then_some(documents);
    Ok(apply(&elevation, request.policy, &request.sort, request.boosts(), ranked, documents))
}

/// The merge algorithm proper, shared with grouped merging.
///
/// `documents` is `None` when absent elevated ids must not be added.
pub(crate) fn apply(
    elevation: &Elevation,
    policy: MergePolicy,
    sort: &SortOrder,
    boost: bool,
    ranked: &[Candidate],
    documents: Option<&dyn DocumentSource>,
) -> Vec<MergedDoc> {
    let priorities = elevation.priorities();
    let mut natural = ranked.to_vec();

    if let Some(documents) = documents {
        let present: AHashSet<&DocId> = ranked.iter().map(|c| &c.id).collect();
        for id in elevation.elevated_ids() {
            if present.contains(id) {
                continue;
            }
            match documents.fetch(id) {
                Some(candidate) => natural.push(Candidate::new(id.clone(), candidate.score)),
                None => tracing::trace!("Elevated document '{}' not found, skipping", id),
            }
        }
    }

    sort.sort(&mut natural);

    let mut merged = if boost {
        let (mut elevated, rest): (Vec<Candidate>, Vec<Candidate>) = natural
            .into_iter()
            .partition(|c| priorities.contains_key(&c.id));
        if policy.use_configured_elevated_order {
            elevated.sort_by_key(|c| priorities.get(&c.id).copied().unwrap_or(usize::MAX));
        }
        elevated
            .iter()
            .chain(rest.iter())
            .filter_map(|c| annotate(c, elevation, &priorities, policy.mark_excludes))
            .collect::<Vec<_>>()
    } else {
        natural
            .iter()
            .filter_map(|c| annotate(c, elevation, &priorities, policy.mark_excludes))
            .collect()
    };

    if policy.exclusive {
        merged.retain(|doc| doc.elevated);
    }
    merged
}

/// Flags a candidate, or drops it when it is excluded and not marked.
fn annotate(
    candidate: &Candidate,
    elevation: &Elevation,
    priorities: &AHashMap<&DocId, usize>,
    mark_excludes: bool,
) -> Option<MergedDoc> {
    let mut doc = MergedDoc::plain(candidate);
    if priorities.contains_key(&candidate.id) {
        doc.elevated = true;
    } else if elevation.is_excluded(&candidate.id) {
        if !mark_excludes {
            return None;
        }
        doc.excluded = true;
    }
    Some(doc)
}
