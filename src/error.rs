//! Error handling types and utilities.

use std::path::PathBuf;

/// A specialized Result type for application-level code (CLI, file loading).
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods.
pub type Result<T> = anyhow::Result<T>;

/// Error raised while turning rule records into an elevation provider.
///
/// Any of these aborts a reload; the previously active provider stays in place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Two rule records analyze to the same token key.
    #[error("duplicate elevation rule: '{query}' normalizes to the same key as '{previous}'")]
    DuplicateRule { query: String, previous: String },

    /// Analysis of the rule's query produced no tokens.
    #[error("elevation rule query '{query}' has no tokens after analysis")]
    EmptyQuery { query: String },

    /// A document is both elevated and excluded by the same rule.
    #[error("document '{id}' is both elevated and excluded for query '{query}'")]
    ConflictingId { query: String, id: String },

    /// The rule file could not be parsed.
    #[error("malformed elevation rules: {0}")]
    Malformed(String),

    /// The rule file could not be read.
    #[error("failed to read elevation rules from {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

/// Error raised by per-request elevate/exclude overrides.
///
/// Rejects the request's elevation but never the search itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    #[error("document '{id}' is listed in both elevate and exclude ids")]
    ConflictingId { id: String },
}
