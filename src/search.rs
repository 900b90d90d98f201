use crate::entry::{Entry, Language};
use crate::fuzzy::{FuzzyMatcher, RankedCandidate};
use crate::query::{FUZZY_TRIGGER, MatchPattern, prepare_query};
use crate::store::{DictionaryStore, StoreError};
use crate::words::extract_all_words;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Tunables for the fallback search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Suggestions shown after the headword stages come up empty.
    pub fuzzy_limit: usize,
    /// Suggestions shown for an explicit `~` search.
    pub direct_fuzzy_limit: usize,
    pub length_window: usize,
    /// Queries and headwords of this many characters or fewer skip the
    /// partial stage unless the query is literal.
    pub partial_min_chars: usize,
    pub partial_display_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fuzzy_limit: 10,
            direct_fuzzy_limit: 20,
            length_window: 4,
            partial_min_chars: 3,
            partial_display_limit: 10,
        }
    }
}

impl SearchConfig {
    /// Caps both suggestion lists at `limit`.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.fuzzy_limit = limit;
        self.direct_fuzzy_limit = limit;
        self
    }
}

/// The single result of one search, named after the stage that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Headword hits, in `index_num` order.
    Exact { query: String, entries: Vec<Entry> },
    /// Entries linking to the query from a cross-reference field.
    CrossReference { query: String, entries: Vec<Entry> },
    /// Headwords that contain, or are contained in, the query, plus
    /// suggestions from the whole word set.
    Partial {
        query: String,
        headwords: Vec<String>,
        candidates: Vec<RankedCandidate>,
    },
    /// Ranked near matches. `long_list` marks an explicit `~` search.
    Fuzzy {
        query: String,
        candidates: Vec<RankedCandidate>,
        long_list: bool,
    },
    /// Entries whose definition contains the query, shortest first.
    Definition { query: String, entries: Vec<Entry> },
}

impl SearchOutcome {
    pub fn query(&self) -> &str {
        match self {
            SearchOutcome::Exact { query, .. }
            | SearchOutcome::CrossReference { query, .. }
            | SearchOutcome::Partial { query, .. }
            | SearchOutcome::Fuzzy { query, .. }
            | SearchOutcome::Definition { query, .. } => query,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SearchOutcome::Exact { .. } => "exact",
            SearchOutcome::CrossReference { .. } => "cross_reference",
            SearchOutcome::Partial { .. } => "partial",
            SearchOutcome::Fuzzy { .. } => "fuzzy",
            SearchOutcome::Definition { .. } => "definition",
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("query is empty after removing unsupported characters")]
    EmptyQuery,
}

/// Runs a query through the fallback stages against one store.
#[derive(Clone)]
pub struct SearchOrchestrator {
    store: Arc<dyn DictionaryStore>,
    config: SearchConfig,
    matcher: FuzzyMatcher,
}

impl SearchOrchestrator {
    pub fn new(store: Arc<dyn DictionaryStore>, config: SearchConfig) -> Self {
        Self {
            store,
            matcher: FuzzyMatcher::new(config.length_window),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn search(&self, raw: &str, language: Language) -> Result<SearchOutcome, SearchError> {
        let query = prepare_query(raw);
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        debug!(%query, %language, "search");
        match language {
            Language::Chamoru => self.search_headwords(query),
            Language::English => self.search_definitions(query),
        }
    }

    fn search_headwords(&self, query: String) -> Result<SearchOutcome, SearchError> {
        if query.contains(FUZZY_TRIGGER) {
            let query: String = query.chars().filter(|c| *c != FUZZY_TRIGGER).collect();
            let query = query.trim().to_string();
            if query.is_empty() {
                return Err(SearchError::EmptyQuery);
            }
            let candidates = self.rank(&query, &self.candidate_words()?, self.config.direct_fuzzy_limit);
            debug!(stage = "direct_fuzzy", hits = candidates.len(), "search stage");
            return Ok(SearchOutcome::Fuzzy {
                query,
                candidates,
                long_list: true,
            });
        }

        let pattern = MatchPattern::new(query.as_str());

        let entries = self.store.find_exact(&pattern)?;
        debug!(stage = "exact", literal = pattern.literal, hits = entries.len(), "search stage");
        if !entries.is_empty() {
            return Ok(SearchOutcome::Exact { query, entries });
        }

        let entries = self.store.find_cross_reference(&pattern)?;
        debug!(stage = "cross_reference", hits = entries.len(), "search stage");
        if !entries.is_empty() {
            return Ok(SearchOutcome::CrossReference { query, entries });
        }

        let words = self.candidate_words()?;
        let min_chars = if pattern.literal {
            0
        } else {
            self.config.partial_min_chars
        };
        if pattern.char_len() > min_chars {
            let headwords = self.store.find_partial(&pattern, min_chars)?;
            debug!(stage = "partial", min_chars, hits = headwords.len(), "search stage");
            if !headwords.is_empty() {
                let candidates = self.rank(&query, &words, self.config.fuzzy_limit);
                return Ok(SearchOutcome::Partial {
                    query,
                    headwords,
                    candidates,
                });
            }
        }

        let candidates = self.rank(&query, &words, self.config.fuzzy_limit);
        debug!(stage = "fuzzy", hits = candidates.len(), "search stage");
        Ok(SearchOutcome::Fuzzy {
            query,
            candidates,
            long_list: false,
        })
    }

    fn search_definitions(&self, query: String) -> Result<SearchOutcome, SearchError> {
        let entries = self.store.find_by_definition(&MatchPattern::new(query.as_str()))?;
        debug!(stage = "definition", hits = entries.len(), "search stage");
        Ok(SearchOutcome::Definition { query, entries })
    }

    /// Rebuilt from a full export on every call.
    fn candidate_words(&self) -> Result<BTreeSet<String>, StoreError> {
        let sources = self.store.export_all()?;
        Ok(extract_all_words(&sources))
    }

    fn rank(&self, query: &str, words: &BTreeSet<String>, limit: usize) -> Vec<RankedCandidate> {
        self.matcher.rank(query, words, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::WordSource;
    use crate::store::MemoryStore;
    use crate::store::tests::sample_entries;

    fn orchestrator() -> SearchOrchestrator {
        SearchOrchestrator::new(
            Arc::new(MemoryStore::new(sample_entries())),
            SearchConfig::default(),
        )
    }

    fn words(candidates: &[RankedCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.word.as_str()).collect()
    }

    struct OfflineStore;

    impl DictionaryStore for OfflineStore {
        fn find_exact(&self, _: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn find_cross_reference(&self, _: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn find_partial(&self, _: &MatchPattern, _: usize) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn find_by_definition(&self, _: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn export_all(&self) -> Result<Vec<WordSource>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn glottal_stop_is_optional_in_exact_search() {
        let outcome = orchestrator().search("taotao", Language::Chamoru).unwrap();
        match outcome {
            SearchOutcome::Exact { query, entries } => {
                assert_eq!(query, "taotao");
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].entry, "ta'otao");
            }
            other => panic!("expected exact outcome, got {other:?}"),
        }
    }

    #[test]
    fn verbatim_headword_is_found() {
        for word in ["håfa", "ta'otao", "guma'", "gumagupu"] {
            let outcome = orchestrator().search(word, Language::Chamoru).unwrap();
            assert_eq!(outcome.kind(), "exact", "{word}");
        }
    }

    #[test]
    fn curly_apostrophes_are_folded() {
        let outcome = orchestrator().search("ta’otao", Language::Chamoru).unwrap();
        assert_eq!(outcome.kind(), "exact");
    }

    #[test]
    fn diacritics_are_significant_in_exact_search() {
        let outcome = orchestrator().search("hafa", Language::Chamoru).unwrap();
        match outcome {
            SearchOutcome::Fuzzy {
                candidates,
                long_list,
                ..
            } => {
                assert!(!long_list);
                assert_eq!(candidates[0].word, "håfa");
            }
            other => panic!("expected fuzzy outcome, got {other:?}"),
        }
    }

    #[test]
    fn cross_reference_stage_follows_links() {
        let outcome = orchestrator().search("gumå'ña", Language::Chamoru).unwrap();
        match outcome {
            SearchOutcome::CrossReference { entries, .. } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].entry, "guma'");
            }
            other => panic!("expected cross-reference outcome, got {other:?}"),
        }
    }

    #[test]
    fn fallback_chain_reaches_partial_stage() {
        let outcome = orchestrator().search("gupu", Language::Chamoru).unwrap();
        match outcome {
            SearchOutcome::Partial {
                query,
                headwords,
                candidates,
            } => {
                assert_eq!(query, "gupu");
                assert_eq!(headwords, vec!["gumagupu"]);
                let ranked = words(&candidates);
                // headwords and link targets within the length window
                assert!(ranked.contains(&"håfa"));
                assert!(ranked.contains(&"adai"));
                assert!(ranked.contains(&"taotao"));
                assert!(!ranked.contains(&"gumagupu"));
            }
            other => panic!("expected partial outcome, got {other:?}"),
        }
    }

    #[test]
    fn partial_suggestions_rank_every_extracted_word() {
        let store = Arc::new(MemoryStore::new(sample_entries()));
        let config = SearchConfig::default().with_limit(100);
        let search = SearchOrchestrator::new(store.clone(), config);
        let Ok(SearchOutcome::Partial { candidates, .. }) = search.search("gupu", Language::Chamoru)
        else {
            panic!("expected partial outcome");
        };

        let all_words = extract_all_words(&store.export_all().unwrap());
        assert_eq!(all_words.len(), 7);
        let expected = FuzzyMatcher::new(config.length_window).rank("gupu", &all_words, 100);
        assert_eq!(candidates, expected);

        let ranked: BTreeSet<&str> = candidates.iter().map(|c| c.word.as_str()).collect();
        let in_window: BTreeSet<&str> = all_words
            .iter()
            .map(String::as_str)
            .filter(|word| word.chars().count().abs_diff(4) < config.length_window)
            .collect();
        assert_eq!(ranked, in_window);
    }

    #[test]
    fn short_queries_skip_partial_unless_literal() {
        let outcome = orchestrator().search("gum", Language::Chamoru).unwrap();
        assert_eq!(outcome.kind(), "fuzzy");

        let outcome = orchestrator().search("må", Language::Chamoru).unwrap();
        assert_eq!(outcome.kind(), "fuzzy");

        let outcome = orchestrator().search("ma'", Language::Chamoru).unwrap();
        match outcome {
            SearchOutcome::Partial { headwords, .. } => assert_eq!(headwords, vec!["guma'"]),
            other => panic!("expected partial outcome, got {other:?}"),
        }
    }

    #[test]
    fn link_targets_feed_the_fuzzy_fallback() {
        let outcome = orchestrator().search("adai", Language::Chamoru).unwrap();
        match outcome {
            SearchOutcome::Fuzzy { candidates, .. } => {
                assert_eq!(candidates[0].word, "adai");
                assert_eq!(candidates[0].score, 1.0);
            }
            other => panic!("expected fuzzy outcome, got {other:?}"),
        }
    }

    #[test]
    fn tilde_requests_direct_fuzzy_search() {
        let outcome = orchestrator().search("taotao~", Language::Chamoru).unwrap();
        match outcome {
            SearchOutcome::Fuzzy {
                query,
                candidates,
                long_list,
            } => {
                assert_eq!(query, "taotao");
                assert!(long_list);
                // equal scores keep the sorted word order
                assert_eq!(words(&candidates)[..2], ["ta'otao", "taotao"]);
                assert_eq!(candidates[1].score, 1.0);
            }
            other => panic!("expected fuzzy outcome, got {other:?}"),
        }
    }

    #[test]
    fn limit_caps_suggestions() {
        let search = SearchOrchestrator::new(
            Arc::new(MemoryStore::new(sample_entries())),
            SearchConfig::default().with_limit(2),
        );
        match search.search("~hafa", Language::Chamoru).unwrap() {
            SearchOutcome::Fuzzy { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected fuzzy outcome, got {other:?}"),
        }
    }

    #[test]
    fn english_searches_definitions() {
        let outcome = orchestrator().search("HOME", Language::English).unwrap();
        match &outcome {
            SearchOutcome::Definition { entries, .. } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].entry, "guma'");
            }
            other => panic!("expected definition outcome, got {other:?}"),
        }

        let empty = orchestrator().search("zebra", Language::English).unwrap();
        assert_eq!(
            empty,
            SearchOutcome::Definition {
                query: "zebra".to_string(),
                entries: Vec::new(),
            }
        );
    }

    #[test]
    fn empty_queries_are_rejected() {
        for raw in ["", "   ", "123 !!", "~"] {
            assert!(matches!(
                orchestrator().search(raw, Language::Chamoru),
                Err(SearchError::EmptyQuery)
            ));
        }
    }

    #[test]
    fn store_failures_surface_unchanged() {
        let search = SearchOrchestrator::new(Arc::new(OfflineStore), SearchConfig::default());
        for language in [Language::Chamoru, Language::English] {
            match search.search("adai", language) {
                Err(SearchError::StoreUnavailable(StoreError::Unavailable(reason))) => {
                    assert_eq!(reason, "connection refused");
                }
                other => panic!("expected store failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let outcome = orchestrator().search("gupu", Language::Chamoru).unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "partial");
        assert_eq!(json["headwords"][0], "gumagupu");
    }
}
