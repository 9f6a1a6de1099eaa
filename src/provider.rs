//! Immutable index over elevation rules with exact and best-subset lookup.

use crate::analysis::Analyzer;
use crate::rules::ElevationRule;
use crate::types::TokenKey;
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

/// Index position of a rule (load order).
type RuleIdx = usize;

/// All elevation rules of one configuration generation.
///
/// Built once and never mutated; share it behind an `Arc` and query it from any
/// number of threads.
pub struct ElevationProvider {
    /// Rules in load order. The position doubles as the subset tie-break.
    rules: Vec<ElevationRule>,
    /// Exact token key to rule.
    exact: AHashMap<TokenKey, RuleIdx>,
    /// Token to the rules whose key contains it, ascending.
    postings: AHashMap<String, Vec<RuleIdx>>,
    analyzer: Arc<dyn Analyzer>,
    subset_matching: bool,
    fingerprint: u64,
}

impl fmt::Debug for ElevationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevationProvider")
            .field("rules", &self.rules.len())
            .field("subset_matching", &self.subset_matching)
            .field("fingerprint", &format_args!("{:016x}", self.fingerprint))
            .finish()
    }
}

impl ElevationProvider {
    /// Indexes already-validated rules. Keys are expected to be unique.
    pub(crate) fn new(
        rules: Vec<ElevationRule>,
        analyzer: Arc<dyn Analyzer>,
        subset_matching: bool,
        fingerprint: u64,
    ) -> Self {
        let mut exact = AHashMap::with_capacity(rules.len());
        let mut postings: AHashMap<String, Vec<RuleIdx>> = AHashMap::new();

        for (idx, rule) in rules.iter().enumerate() {
            exact.insert(rule.key().clone(), idx);
            if subset_matching {
                for token in rule.key().tokens() {
                    postings.entry(token.clone()).or_default().push(idx);
                }
            }
        }

        Self {
            rules,
            exact,
            postings,
            analyzer,
            subset_matching,
            fingerprint,
        }
    }

    /// A provider without rules; every lookup misses.
    pub fn empty(analyzer: Arc<dyn Analyzer>) -> Self {
        Self::new(Vec::new(), analyzer, true, 0)
    }

    /// Number of rules.
    pub fn size(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in load order.
    pub fn rules(&self) -> &[ElevationRule] {
        &self.rules
    }

    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    /// Hash of the rule records this provider was built from.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Finds the rule for an analyzed query.
    ///
    /// An exact key match always wins. Otherwise the rule with the largest key
    /// contained in `query` is returned, the earliest loaded one on ties.
    pub fn lookup(&self, query: &TokenKey) -> Option<&ElevationRule> {
        if query.is_empty() {
            return None;
        }

        if let Some(&idx) = self.exact.get(query) {
            return Some(&self.rules[idx]);
        }

        if !self.subset_matching {
            return None;
        }

        self.best_subset(query).map(|idx| &self.rules[idx])
    }

    /// Analyzes `text` with the provider's analyzer, then looks it up.
    pub fn lookup_text(&self, text: &str) -> Option<&ElevationRule> {
        self.lookup(&self.analyzer.key(text))
    }

    fn best_subset(&self, query: &TokenKey) -> Option<RuleIdx> {
        // Count how many of each rule's tokens the query holds. A rule whose
        // count reaches its key length is fully contained.
        let mut hits: AHashMap<RuleIdx, usize> = AHashMap::new();
        for token in query.tokens() {
            if let Some(rules) = self.postings.get(token) {
                for &idx in rules {
                    *hits.entry(idx).or_insert(0) += 1;
                }
            }
        }

        hits.into_iter()
            .filter(|&(idx, count)| count == self.rules[idx].key().len())
            .map(|(idx, _)| (self.rules[idx].key().len(), idx))
            .max_by(|(len_a, idx_a), (len_b, idx_b)| len_a.cmp(len_b).then(idx_b.cmp(idx_a)))
            .map(|(_, idx)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{KeywordAnalyzer, LowercaseAnalyzer, TextAnalyzer};
    use crate::rules::{RawRule, RuleStore};
    use crate::types::DocId;
    use assert2::{check, let_assert};
    use rstest::{fixture, rstest};

    fn rule(query: &str, elevate: &[&str]) -> RawRule {
        RawRule::new(query, elevate.iter().copied(), [] as [&str; 0])
    }

    /// Rules modeled after a typical elevate file: single terms plus
    /// overlapping multi-term rules for subset matching.
    #[fixture]
    fn provider() -> ElevationProvider {
        RuleStore::new(Arc::new(TextAnalyzer::new()))
            .load(&[
                rule("XXXX", &["1"]),
                rule("YYYY", &["1", "2"]),
                rule("ZZZZ", &["1", "2", "3"]),
                rule("BB CC", &["13", "10", "12", "11"]),
                rule("CC DD BB", &["10", "12", "11"]),
                rule("AA BB", &["12", "14"]),
                rule("RR BB", &["99"]),
                rule("AA DD", &["20"]),
            ])
            .unwrap()
    }

    fn ids(rule: &ElevationRule) -> Vec<&str> {
        rule.elevated_ids().iter().map(DocId::as_str).collect()
    }

    #[rstest]
    fn test_exact_match(provider: ElevationProvider) {
        let_assert!(Some(rule) = provider.lookup_text("XXXX"));
        check!(ids(rule) == ["1"]);
        let_assert!(Some(rule) = provider.lookup_text("yyyy"));
        check!(ids(rule) == ["1", "2"]);
    }

    #[rstest]
    fn test_exact_beats_larger_subset(provider: ElevationProvider) {
        // "BB CC" is loaded first and is contained in the query too.
        let_assert!(Some(rule) = provider.lookup_text("dd bb cc"));
        check!(rule.query() == "CC DD BB");
        let_assert!(Some(rule) = provider.lookup_text("CC BB"));
        check!(ids(rule) == ["13", "10", "12", "11"]);
    }

    #[rstest]
    #[case("BB DD CC VV", "CC DD BB")]
    #[case("AA BB DD CC AA", "CC DD BB")]
    #[case("ZZZZ QQQQ", "ZZZZ")]
    fn test_largest_subset_wins(
        provider: ElevationProvider,
        #[case] query: &str,
        #[case] expected_rule: &str,
    ) {
        let_assert!(Some(rule) = provider.lookup_text(query));
        check!(rule.query() == expected_rule);
    }

    #[rstest]
    fn test_subset_ties_resolve_to_load_order(provider: ElevationProvider) {
        // {aa, bb}, {rr, bb} and {aa, dd} are all contained and all size two.
        let_assert!(Some(rule) = provider.lookup_text("AA RR BB DD AA"));
        check!(rule.query() == "AA BB");
    }

    #[rstest]
    #[case("QQQQ EE")]
    #[case("AA EE")]
    #[case("")]
    fn test_no_match(provider: ElevationProvider, #[case] query: &str) {
        check!(provider.lookup_text(query).is_none());
    }

    #[test]
    fn test_exact_only_provider_ignores_subsets() {
        let provider = RuleStore::new(Arc::new(TextAnalyzer::new()))
            .with_subset_matching(false)
            .load(&[rule("BB CC", &["1"])])
            .unwrap();
        check!(provider.lookup_text("bb cc").is_some());
        check!(provider.lookup_text("aa bb cc").is_none());
    }

    #[test]
    fn test_keyword_analysis_is_case_sensitive() {
        let provider = RuleStore::new(Arc::new(KeywordAnalyzer))
            .load(&[rule("XXXX", &["1"]), rule("YYYY", &["1", "2"])])
            .unwrap();
        check!(provider.size() == 2);
        check!(provider.lookup_text("XXXX").is_some());
        check!(provider.lookup_text("xxxx").is_none());
    }

    #[test]
    fn test_lowercase_analysis_matches_either_case() {
        let provider = RuleStore::new(Arc::new(LowercaseAnalyzer))
            .load(&[rule("XXXX", &["1"]), rule("ZZZZ", &["1", "2", "3"])])
            .unwrap();
        let_assert!(Some(rule) = provider.lookup_text("zzzz"));
        check!(rule.elevated_ids().len() == 3);
        check!(provider.lookup_text("XXXX").is_some());
    }

    #[test]
    fn test_empty_provider() {
        let provider = ElevationProvider::empty(Arc::new(TextAnalyzer::new()));
        check!(provider.is_empty());
        check!(provider.lookup_text("anything").is_none());
    }
}
