use crate::entry::{Entry, WordSource};
use crate::query::{MatchPattern, Wildcard};
use std::io::Read;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("dictionary store unavailable: {0}")]
    Unavailable(String),

    #[error("dictionary store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid dictionary data: {0}")]
    Data(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Data(value.to_string())
    }
}

/// Query operations the search pipeline needs from a dictionary backend.
///
/// Implementations translate the `*`/`?` wildcards of a [`MatchPattern`] into
/// their own query syntax and must escape every other metacharacter.
pub trait DictionaryStore: Send + Sync {
    /// Entries whose headword matches the pattern, by `index_num`.
    fn find_exact(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError>;

    /// Entries whose cross-reference fields contain `[[pattern]]`, by
    /// `index_num`.
    fn find_cross_reference(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError>;

    /// Distinct headwords that contain the pattern or are contained in it.
    /// Headwords of `min_chars` characters or fewer are ignored.
    fn find_partial(
        &self,
        pattern: &MatchPattern,
        min_chars: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Substring search over definitions, shortest definition first. Case
    /// folding covers ASCII letters only, so `Å` and `å` stay distinct.
    fn find_by_definition(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError>;

    fn export_all(&self) -> Result<Vec<WordSource>, StoreError>;
}

/// A store backed by a vector of entries kept in `index_num` order.
#[derive(Default)]
pub struct MemoryStore {
    entries: Vec<Entry>,
}

impl MemoryStore {
    pub fn new(mut entries: Vec<Entry>) -> Self {
        entries.sort_by_key(|entry| entry.index_num);
        Self {
            entries,
        }
    }

    /// Loads a JSON array of entries.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let entries: Vec<Entry> = serde_json::from_reader(reader)?;
        if let Some(bad) = entries.iter().find(|entry| entry.entry.is_empty()) {
            return Err(StoreError::Data(format!(
                "entry #{} has an empty headword",
                bad.index_num
            )));
        }
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn filter_entries<F>(&self, keep: F) -> Vec<Entry>
    where
        F: Fn(&Entry) -> bool,
    {
        self.entries
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect()
    }
}

impl DictionaryStore for MemoryStore {
    fn find_exact(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
        let matcher = Wildcard::new(&pattern.comparable());
        Ok(self.filter_entries(|entry| matcher.matches(&pattern.comparable_field(&entry.entry))))
    }

    fn find_cross_reference(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
        let matcher = Wildcard::link_target(&pattern.comparable());
        Ok(self.filter_entries(|entry| {
            [&entry.alternate_forms, &entry.related_forms, &entry.see_also]
                .into_iter()
                .any(|field| matcher.matches(&pattern.comparable_field(field)))
        }))
    }

    fn find_partial(
        &self,
        pattern: &MatchPattern,
        min_chars: usize,
    ) -> Result<Vec<String>, StoreError> {
        let query = pattern.comparable();
        let matcher = Wildcard::contains(&query);
        let mut headwords: Vec<String> = Vec::new();
        for entry in self.entries.iter() {
            if entry.entry.chars().count() <= min_chars {
                continue;
            }
            let field = pattern.comparable_field(&entry.entry);
            if field.is_empty() {
                continue;
            }
            let hit = query.contains(field.as_str()) || matcher.matches(&field);
            if hit && !headwords.contains(&entry.entry) {
                headwords.push(entry.entry.clone());
            }
        }
        Ok(headwords)
    }

    fn find_by_definition(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
        let matcher = Wildcard::contains(&pattern.text.to_ascii_lowercase());
        let mut hits =
            self.filter_entries(|entry| matcher.matches(&entry.definition.to_ascii_lowercase()));
        hits.sort_by_key(|entry| entry.definition.chars().count());
        Ok(hits)
    }

    fn export_all(&self) -> Result<Vec<WordSource>, StoreError> {
        Ok(self.entries.iter().map(WordSource::from).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_entries() -> Vec<Entry> {
        let mut hafa = Entry::new(1, "håfa");
        hafa.definition = "what".to_string();
        hafa.part_of_speech = "interrogative".to_string();
        hafa.see_also = "[[adai|greeting]]".to_string();

        let mut taotao = Entry::new(2, "ta'otao");
        taotao.definition = "person, people".to_string();
        taotao.part_of_speech = "noun".to_string();
        taotao.alternate_forms = "[[taotao]]".to_string();

        let mut guma = Entry::new(10, "guma'");
        guma.definition = "house, home".to_string();
        guma.part_of_speech = "noun".to_string();
        guma.related_forms = "[[gumå'ña]]".to_string();

        let mut gumagupu = Entry::new(3, "gumagupu");
        gumagupu.definition = "flying".to_string();
        gumagupu.part_of_speech = "verb".to_string();

        vec![hafa, taotao, guma, gumagupu]
    }

    #[test]
    fn memory_store_orders_by_index_num() {
        let store = MemoryStore::new(sample_entries());
        let words: Vec<_> = store
            .export_all()
            .unwrap()
            .into_iter()
            .map(|row| row.entry)
            .collect();
        assert_eq!(words, vec!["håfa", "ta'otao", "gumagupu", "guma'"]);
    }

    #[test]
    fn exact_strips_glottal_stops_unless_literal() {
        let store = MemoryStore::new(sample_entries());
        let basic = MatchPattern::new("taotao");
        let hits = store.find_exact(&basic).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry, "ta'otao");

        let literal = MatchPattern::new("ta'otao");
        assert_eq!(store.find_exact(&literal).unwrap().len(), 1);

        let wrong_literal = MatchPattern::new("tao'tao");
        assert!(store.find_exact(&wrong_literal).unwrap().is_empty());
    }

    #[test]
    fn exact_keeps_diacritics_significant() {
        let store = MemoryStore::new(sample_entries());
        assert!(store.find_exact(&MatchPattern::new("hafa")).unwrap().is_empty());
        assert_eq!(store.find_exact(&MatchPattern::new("håfa")).unwrap().len(), 1);
    }

    #[test]
    fn cross_reference_matches_link_targets_only() {
        let store = MemoryStore::new(sample_entries());
        let hits = store.find_cross_reference(&MatchPattern::new("adai|greeting")).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.find_cross_reference(&MatchPattern::new("ada")).unwrap().is_empty());
    }

    #[test]
    fn partial_matches_both_directions() {
        let store = MemoryStore::new(sample_entries());
        let longer = store.find_partial(&MatchPattern::new("gupu"), 3).unwrap();
        assert_eq!(longer, vec!["gumagupu"]);
        let shorter = store.find_partial(&MatchPattern::new("ta'otaomo'na"), 0).unwrap();
        assert_eq!(shorter, vec!["ta'otao"]);
    }

    #[test]
    fn partial_respects_length_floor() {
        let store = MemoryStore::new(vec![Entry::new(1, "gua"), Entry::new(2, "guaiya")]);
        let hits = store.find_partial(&MatchPattern::new("guaiya"), 3).unwrap();
        assert_eq!(hits, vec!["guaiya"]);
        let hits = store.find_partial(&MatchPattern::new("guaiya"), 0).unwrap();
        assert_eq!(hits, vec!["gua", "guaiya"]);
    }

    #[test]
    fn definition_search_is_case_insensitive_and_shortest_first() {
        let store = MemoryStore::new(sample_entries());
        let hits = store.find_by_definition(&MatchPattern::new("HO")).unwrap();
        let words: Vec<_> = hits.iter().map(|e| e.entry.as_str()).collect();
        assert_eq!(words, vec!["guma'"]);
        let hits = store.find_by_definition(&MatchPattern::new("e")).unwrap();
        let words: Vec<_> = hits.iter().map(|e| e.entry.as_str()).collect();
        assert_eq!(words, vec!["guma'", "ta'otao"]);
    }

    #[test]
    fn definition_search_folds_ascii_case_only() {
        let mut entry = Entry::new(1, "ågaga");
        entry.definition = "Red, ågaga color".to_string();
        let store = MemoryStore::new(vec![entry]);
        assert_eq!(store.find_by_definition(&MatchPattern::new("RED")).unwrap().len(), 1);
        assert_eq!(store.find_by_definition(&MatchPattern::new("åGAGA")).unwrap().len(), 1);
        assert!(store.find_by_definition(&MatchPattern::new("ÅGAGA")).unwrap().is_empty());
    }

    #[test]
    fn json_loader_rejects_empty_headwords() {
        let json = r#"[{"index_num": 1, "entry": ""}]"#;
        assert!(matches!(
            MemoryStore::from_json_reader(json.as_bytes()),
            Err(StoreError::Data(_))
        ));
        let json = r#"[{"index_num": 2, "entry": "adai", "definition": "hi"}]"#;
        let store = MemoryStore::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
