//! Per-request elevation parameters.

use crate::merge::MergePolicy;
use crate::types::DocId;
use serde::{Deserialize, Deserializer, Serialize};

/// Request switches, deserializable from a search request's parameters.
///
/// Field names are snake_case; the camelCase names search clients commonly
/// send (`forceElevation`, `elevateIds`, ...) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationParams {
    #[serde(alias = "enableElevation")]
    pub enable: bool,
    /// Overrides the engine's configured default when set.
    #[serde(alias = "forceElevation")]
    pub force_elevation: Option<bool>,
    #[serde(alias = "markExcludes")]
    pub mark_excludes: bool,
    #[serde(alias = "elevateOnlyDocsMatchingQuery")]
    pub elevate_only_matching_query: bool,
    #[serde(alias = "useConfiguredElevatedOrder")]
    pub use_configured_elevated_order: bool,
    pub exclusive: bool,
    /// Replaces the matched rule's elevated ids for this request.
    #[serde(alias = "elevateIds", deserialize_with = "id_list")]
    pub elevate_ids: Option<Vec<DocId>>,
    #[serde(alias = "excludeIds", deserialize_with = "id_list")]
    pub exclude_ids: Option<Vec<DocId>>,
}

impl Default for ElevationParams {
    fn default() -> Self {
        Self {
            enable: true,
            force_elevation: None,
            mark_excludes: false,
            elevate_only_matching_query: false,
            use_configured_elevated_order: true,
            exclusive: false,
            elevate_ids: None,
            exclude_ids: None,
        }
    }
}

impl ElevationParams {
    /// Merge policy for this request, with `default_force` standing in for an
    /// unset `force_elevation`.
    pub fn policy(&self, default_force: bool) -> MergePolicy {
        MergePolicy {
            force_elevation: self.force_elevation.unwrap_or(default_force),
            exclusive: self.exclusive,
            mark_excludes: self.mark_excludes,
            elevate_only_matching_query: self.elevate_only_matching_query,
            use_configured_elevated_order: self.use_configured_elevated_order,
        }
    }

    pub fn with_elevate_ids(mut self, ids: &str) -> Self {
        self.elevate_ids = Some(parse_id_list(ids));
        self
    }

    pub fn with_exclude_ids(mut self, ids: &str) -> Self {
        self.exclude_ids = Some(parse_id_list(ids));
        self
    }
}

/// Splits a comma separated id list, dropping blanks.
pub fn parse_id_list(ids: &str) -> Vec<DocId> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(DocId::from)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdList {
    Joined(String),
    Items(Vec<String>),
}

fn id_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<DocId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdList>::deserialize(deserializer)?.map(|ids| match ids {
        IdList::Joined(ids) => parse_id_list(&ids),
        IdList::Items(ids) => ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(DocId::from)
            .collect(),
    }))
}
