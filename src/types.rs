//! Core value types shared by the rule store, provider, cache and merge engine.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Unique key of a document in the index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DocId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Order-independent lookup key built from analyzed query tokens.
///
/// Tokens are sorted and deduplicated: `"AA BB AA"` and `"BB AA"` produce the
/// same key. Containment is set containment, not multiset containment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TokenKey(Vec<String>);

impl TokenKey {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = tokens.into_iter().map(Into::into).collect();
        Self(set.into_iter().collect())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(", "))
    }
}

/// Identity of an index snapshot (e.g. a reader generation).
///
/// Only compared and hashed, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey(pub u64);

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot#{}", self.0)
    }
}

/// A ranked document handed to the merge engine by the query executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: DocId,
    pub score: f32,
}

impl Candidate {
    pub fn new(id: impl Into<DocId>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// A document in the merged result, with its elevation markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedDoc {
    pub id: DocId,
    pub score: f32,
    pub elevated: bool,
    pub excluded: bool,
}

impl MergedDoc {
    pub(crate) fn plain(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.clone(),
            score: candidate.score,
            elevated: false,
            excluded: false,
        }
    }
}
