//! Elevation over grouped results.

use super::{MergeRequest, SortOrder, apply};
use crate::error::OverrideError;
use crate::types::{Candidate, MergedDoc};
use serde::Serialize;

/// One group of ranked candidates sharing a group value.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<G> {
    pub value: G,
    pub docs: Vec<Candidate>,
}

impl<G> Group<G> {
    pub fn new(value: G, docs: Vec<Candidate>) -> Self {
        Self { value, docs }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedGroup<G> {
    pub value: G,
    pub docs: Vec<MergedDoc>,
}

impl<G> MergedGroup<G> {
    pub fn has_elevated(&self) -> bool {
        self.docs.iter().any(|doc| doc.elevated)
    }
}

/// Merges every group with the request's elevation.
///
/// Documents inside a group are ordered by `group_sort` (the request's sort
/// when `None`). When the request's own sort boosts, groups holding an
/// elevated document move ahead of the others. Elevated ids absent from all
/// groups are never added.
pub fn merge_groups<G: Clone>(
    request: &MergeRequest<'_>,
    group_sort: Option<&SortOrder>,
    groups: &[Group<G>],
) -> Result<Vec<MergedGroup<G>>, OverrideError> {
    let within = group_sort.unwrap_or(&request.sort);
    let Some(elevation) = request.effective_elevation()? else {
        return Ok(groups
            .iter()
            .map(|group| {
                let mut docs = group.docs.clone();
                within.sort(&mut docs);
                MergedGroup {
                    value: group.value.clone(),
                    docs: docs.iter().map(MergedDoc::plain).collect(),
                }
            })
            .collect());
    };

    let boost_docs = within.is_relevance() || request.policy.force_elevation;
    let mut merged: Vec<MergedGroup<G>> = groups
        .iter()
        .map(|group| MergedGroup {
            value: group.value.clone(),
            docs: apply(&elevation, request.policy, within, boost_docs, &group.docs, None),
        })
        .collect();

    if request.policy.exclusive {
        merged.retain(|group| !group.docs.is_empty());
    }

    if request.boosts() {
        let priorities = elevation.priorities();
        // Best (lowest) priority of the elevated docs in a group, if any.
        let rank = |group: &MergedGroup<G>| {
            group
                .docs
                .iter()
                .filter_map(|doc| priorities.get(&doc.id).copied())
                .min()
        };
        if request.policy.use_configured_elevated_order {
            merged.sort_by_key(|group| rank(group).unwrap_or(usize::MAX));
        } else {
            merged.sort_by_key(|group| !group.has_elevated());
        }
    }

    Ok(merged)
}
