use crate::entry::{WordSource, link_spans};
use std::collections::BTreeSet;

/// Builds the fuzzy-search universe: every headword plus the head of every
/// `[[...]]` link in the cross-reference fields, de-duplicated and sorted.
pub fn extract_all_words<'a, I>(sources: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a WordSource>,
{
    let mut words = BTreeSet::new();
    for source in sources {
        words.insert(source.entry.clone());
        for field in [&source.alternate_forms, &source.related_forms, &source.see_also] {
            for span in link_spans(field) {
                let head = span.head();
                if !head.is_empty() {
                    words.insert(head.to_string());
                }
            }
        }
    }
    words
}
