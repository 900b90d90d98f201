//! Chamoru/English dictionary search.
//!
//! A query runs through [`SearchOrchestrator`], which asks a
//! [`DictionaryStore`] for exact headwords, then cross-references, then
//! partial headwords, and finally falls back to [`FuzzyMatcher`] over every
//! word the dictionary knows. [`ResultFormatter`] turns the outcome into HTML
//! using [`MarkupEngine`] and [`highlight`].

mod entry;
mod format;
mod fuzzy;
mod highlight;
mod markup;
mod query;
mod search;
mod sqlite;
mod store;
mod words;

#[cfg(feature = "web")]
pub mod web;

pub use entry::{CrossReference, Entry, Language, WordSource};
pub use format::{
    ResultFormatter, contains_whole_word, order_cross_references, order_definitions, order_exact,
    order_partial, redirect_target,
};
pub use fuzzy::{FuzzyMatcher, RankedCandidate, distance, normalize, similarity};
pub use highlight::highlight;
pub use markup::{Dialect, MarkupEngine, MarkupError, TemplateKind};
pub use query::{MatchPattern, Wildcard, prepare_query};
pub use search::{SearchConfig, SearchError, SearchOrchestrator, SearchOutcome};
pub use sqlite::SqliteStore;
pub use store::{DictionaryStore, MemoryStore, StoreError};
pub use words::extract_all_words;
