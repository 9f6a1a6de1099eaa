//! Shared test fixtures and utilities for integration tests.
//!
//! # Available Fixtures
//!
//! - `corpus`: a small in-memory index with term-frequency scoring
//! - `elevator`: a [`QueryElevator`] over [`RULES`] with default configuration
//!
//! # Shared Infrastructure
//!
//! [`TempWorkspace`] holds rule and configuration files for tests that exercise
//! reloading from disk.

use query_elevation::{
    Candidate, DocId, DocumentSource, EngineConfig, MergedDoc, QueryElevator, RuleSet,
};
use rstest::fixture;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Rules used by most scenarios.
pub const RULES: &str = r#"
[[rule]]
query = "ipod"
elevate = ["x", "y", "z"]

[[rule]]
query = "boosted"
elevate = ["b"]
exclude = ["y"]

[[rule]]
query = "XXXX"
elevate = ["1"]

[[rule]]
query = "YYYY"
elevate = ["1", "2"]

[[rule]]
query = "ZZZZ"
elevate = ["1", "2", "3"]

[[rule]]
query = "BB CC"
elevate = ["13", "10", "12", "11"]

[[rule]]
query = "CC DD BB"
elevate = ["10", "12", "11"]

[[rule]]
query = "AA BB"
elevate = ["12", "14"]

[[rule]]
query = "RR BB"
elevate = ["99"]
"#;

/// A document in the test index.
#[derive(Debug, Clone)]
pub struct TestDoc {
    pub id: &'static str,
    pub title: &'static str,
    /// Grouping and collapsing field.
    pub group: &'static str,
}

/// In-memory index scoring documents by how often the query terms occur in
/// their title.
#[derive(Debug, Clone)]
pub struct Corpus {
    docs: BTreeMap<&'static str, TestDoc>,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl Corpus {
    pub fn new(docs: &[TestDoc]) -> Self {
        Self {
            docs: docs.iter().map(|doc| (doc.id, doc.clone())).collect(),
        }
    }

    fn score(&self, doc: &TestDoc, query: &str) -> f32 {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        doc.title
            .split_whitespace()
            .filter(|word| terms.contains(&word.to_lowercase()))
            .count() as f32
    }

    /// Matching documents, best first; ties in id order.
    pub fn search(&self, query: &str) -> Vec<Candidate> {
        let mut hits: Vec<Candidate> = self
            .docs
            .values()
            .map(|doc| Candidate::new(doc.id, self.score(doc, query)))
            .filter(|candidate| candidate.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits
    }

    pub fn group_of(&self, id: &DocId) -> Option<&'static str> {
        self.docs.get(id.as_str()).map(|doc| doc.group)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }
}

impl DocumentSource for Corpus {
    fn fetch(&self, id: &DocId) -> Option<Candidate> {
        self.docs
            .get(id.as_str())
            .map(|doc| Candidate::new(doc.id, 0.0))
    }
}

/// Six documents: "ipod" matches a, b and c with increasing frequency;
/// "boosted" matches x, y and z the same way.
#[fixture]
pub fn corpus() -> Corpus {
    Corpus::new(&[
        TestDoc { id: "a", title: "ipod", group: "apple" },
        TestDoc { id: "b", title: "ipod ipod", group: "apple" },
        TestDoc { id: "c", title: "ipod ipod ipod", group: "other" },
        TestDoc { id: "x", title: "boosted", group: "boost" },
        TestDoc { id: "y", title: "boosted boosted", group: "boost" },
        TestDoc { id: "z", title: "boosted boosted boosted", group: "other" },
    ])
}

#[fixture]
pub fn elevator() -> QueryElevator {
    let rules = RuleSet::from_toml_str(RULES).expect("Test rules should parse");
    QueryElevator::with_rules(EngineConfig::default(), rules.rules)
        .expect("Test rules should validate")
}

/// Ids of merged documents, in order.
#[allow(dead_code)]
pub fn ids(docs: &[MergedDoc]) -> Vec<&str> {
    docs.iter().map(|doc| doc.id.as_str()).collect()
}

/// Ids of the documents flagged elevated.
#[allow(dead_code)]
pub fn elevated(docs: &[MergedDoc]) -> Vec<&str> {
    docs.iter()
        .filter(|doc| doc.elevated)
        .map(|doc| doc.id.as_str())
        .collect()
}

/// A temporary directory for rule and configuration files.
///
/// Cleaned up when dropped.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes (or overwrites) a file and returns its full path.
    ///
    /// # Panics
    /// Panics if writing fails.
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(path);
        std::fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", path, e));
        full_path
    }
}
