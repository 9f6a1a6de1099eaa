pub mod analysis;
pub mod annotate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod cursor;
pub mod elevator;
pub mod error;
pub mod logging;
pub mod merge;
pub mod params;
pub mod provider;
pub mod rules;
pub mod types;

pub use analysis::{Analyzer, AnalyzerKind};
pub use annotate::{Annotation, RequestedAnnotations};
pub use cache::SnapshotCache;
pub use config::EngineConfig;
pub use cursor::{CursorMark, Page, paginate};
pub use elevator::QueryElevator;
pub use error::{ConfigError, OverrideError};
pub use merge::{
    DocumentSource, ElevationMarks, Group, MergePolicy, MergeRequest, MergedGroup, NoDocuments,
    SortOrder, merge, merge_groups,
};
pub use params::ElevationParams;
pub use provider::ElevationProvider;
pub use rules::{Elevation, ElevationRule, RawRule, RuleFile, RuleSet, RuleSource, RuleStore, StaticRules};
pub use types::{Candidate, DocId, MergedDoc, SnapshotKey, TokenKey};
