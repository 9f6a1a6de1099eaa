//! Query text analysis used to derive rule and query token keys.
//!
//! The search server owns the real analysis chain; these analyzers cover the
//! field types elevation is usually configured against.

use crate::types::TokenKey;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Common English stop words dropped by the stemming analyzer.
pub(crate) const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with",
];

/// Maps raw query text to an ordered sequence of normalized tokens.
pub trait Analyzer: Send + Sync + fmt::Debug {
    fn analyze(&self, text: &str) -> Vec<String>;

    /// Analyzes `text` and collapses the tokens into a lookup key.
    fn key(&self, text: &str) -> TokenKey {
        TokenKey::from_tokens(self.analyze(text))
    }
}

/// The whole (trimmed) text is a single, case-sensitive token.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            vec![]
        } else {
            vec![text.to_string()]
        }
    }
}

/// Whitespace tokens, lower-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseAnalyzer;

impl Analyzer for LowercaseAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    }
}

/// Splits on every non-alphanumeric character and lower-cases each word.
///
/// With stemming enabled, stop words are dropped and each word is reduced to
/// its English stem, so "Parsing the files" analyzes to `["pars", "file"]`.
pub struct TextAnalyzer {
    stemmer: Option<Stemmer>,
}

impl fmt::Debug for TextAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextAnalyzer")
            .field("stemming", &self.stemmer.is_some())
            .finish()
    }
}

impl TextAnalyzer {
    pub fn new() -> Self {
        Self { stemmer: None }
    }

    pub fn stemmed() -> Self {
        Self {
            stemmer: Some(Stemmer::create(Algorithm::English)),
        }
    }
}

impl Default for TextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for TextAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        let mut tokens = vec![];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            match &self.stemmer {
                Some(stemmer) => stem_token(word, &mut tokens, stemmer),
                None => tokens.push(word.to_lowercase()),
            }
        }
        tokens
    }
}

/// Add a stemmed token, filtering out stop words.
fn stem_token(token: &str, tokens: &mut Vec<String>, stemmer: &Stemmer) {
    let lowercase = token.to_lowercase();

    if STOP_WORDS.contains(&lowercase.as_str()) {
        return;
    }

    let stemmed = stemmer.stem(&lowercase);
    tokens.push(stemmed.into_owned());
}

/// Analyzer selection by configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    Keyword,
    Lowercase,
    #[default]
    Text,
    Stemmed,
}

impl AnalyzerKind {
    pub fn build(self) -> Arc<dyn Analyzer> {
        match self {
            Self::Keyword => Arc::new(KeywordAnalyzer),
            Self::Lowercase => Arc::new(LowercaseAnalyzer),
            Self::Text => Arc::new(TextAnalyzer::new()),
            Self::Stemmed => Arc::new(TextAnalyzer::stemmed()),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Lowercase => "lowercase",
            Self::Text => "text",
            Self::Stemmed => "stemmed",
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyzerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" | "string" => Ok(Self::Keyword),
            "lowercase" => Ok(Self::Lowercase),
            "text" => Ok(Self::Text),
            "stemmed" => Ok(Self::Stemmed),
            other => Err(format!(
                "unknown analyzer '{}' (expected keyword, lowercase, text or stemmed)",
                other
            )),
        }
    }
}
