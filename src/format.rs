//! HTML documents for entries and search outcomes.

use crate::entry::Entry;
use crate::fuzzy::RankedCandidate;
use crate::highlight::highlight;
use crate::markup::{MarkupEngine, escape_attr};
use crate::query::has_wildcard;
use crate::search::{SearchError, SearchOutcome};

/// Characters that may sit next to a whole-word hit in a definition.
const WORD_BOUNDARIES: &[char] = &[' ', ',', '.', '?', '!', ';', ':', '-', '(', ')'];

/// Composes markup rendering and highlighting into result pages.
#[derive(Debug, Clone, Copy)]
pub struct ResultFormatter {
    markup: MarkupEngine,
    partial_display_limit: usize,
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ResultFormatter {
    pub fn new(partial_display_limit: usize) -> Self {
        Self {
            markup: MarkupEngine::html(),
            partial_display_limit,
        }
    }

    /// One complete entry. `header` adds the headword title.
    pub fn format_entry(&self, entry: &Entry, header: bool) -> String {
        let field = |label: &str, text: &str| {
            if text.is_empty() {
                String::new()
            } else {
                format!(
                    "<h3>{label}:</h3><div class='entry-field'>{}</div>",
                    self.markup.render(text)
                )
            }
        };

        let mut html = String::from("<div class='entry'>");
        if header {
            html.push_str(&format!("<h1>{}</h1>", entry.entry));
        }
        html.push_str("<div class='content'>");
        if !entry.part_of_speech.is_empty() {
            html.push_str(&format!(
                "<h3 class='part-of-speech'>{}</h3>",
                self.markup.render(&entry.part_of_speech)
            ));
        }
        if !entry.definition.is_empty() {
            html.push_str(&format!(
                "<div class='entry-field'>{}</div>",
                self.markup.render(&entry.definition)
            ));
        }
        if !entry.examples.is_empty() {
            let examples = self.markup.render(&entry.examples);
            let examples = if entry.examples.starts_with("{{") {
                examples
            } else {
                format!("<ul><li><i>{examples}</i></li></ul>")
            };
            html.push_str(&format!("<div class='entry-field'>{examples}</div>"));
        }
        html.push_str("</div>");

        let minor = [
            field("Alternate Forms", &entry.alternate_forms),
            field("Origin", &entry.origin),
            field("Notes", &entry.notes),
            field("Related Forms", &entry.related_forms),
            field("See Also", &entry.see_also),
            field("Source", &entry.source),
        ]
        .concat();
        if !minor.is_empty() {
            html.push_str(&format!("<div class='content minor-content'>{minor}</div>"));
        }
        html.push_str("<br /></div>");
        html
    }

    /// The page for one search outcome.
    pub fn render(&self, outcome: &SearchOutcome) -> String {
        let body = match outcome {
            SearchOutcome::Exact { query, entries } => self.render_exact(query, entries),
            SearchOutcome::CrossReference { query, entries } => {
                self.render_cross_references(query, entries)
            }
            SearchOutcome::Partial {
                query,
                headwords,
                candidates,
            } => self.render_partial(query, headwords, candidates),
            SearchOutcome::Fuzzy {
                query,
                candidates,
                long_list,
            } => self.render_fuzzy(query, candidates, *long_list),
            SearchOutcome::Definition { query, entries } => self.render_definitions(query, entries),
        };
        format!("<div class='results-single'>{body}</div>")
    }

    pub fn render_error(&self, err: &SearchError) -> String {
        match err {
            SearchError::StoreUnavailable(cause) => format!(
                "<div class='no-result'>Not able to connect to database: <br />{}</div>",
                escape_text(&cause.to_string())
            ),
            SearchError::EmptyQuery => {
                "<div class='no-result'>Enter a word to search.</div>".to_string()
            }
        }
    }

    fn render_exact(&self, query: &str, entries: &[Entry]) -> String {
        let mut html = String::new();
        if has_wildcard(query) {
            html.push_str(&format!("<div><h2>{} results found</h2></div>", entries.len()));
        }
        for entry in order_exact(query, entries) {
            html.push_str(&self.format_entry(entry, true));
        }
        html
    }

    fn render_cross_references(&self, query: &str, entries: &[Entry]) -> String {
        if let Some(target) = redirect_target(query, entries) {
            return format!(
                "<div class='entry-field redirect-text'>(Redirected from {})</div>{}",
                query_link(query, query),
                self.format_entry(target, true)
            );
        }

        let ordered = order_cross_references(query, entries);
        let mut html = not_found(query);
        let fuzzy = format!("{query}~");
        html.push_str(&format!(
            "<p class='no-result'><a class='no-result-link' href='#' data-query=\"{}\">\
             Try fuzzy search? {fuzzy}</a><br /><br /></p>",
            escape_attr(&fuzzy)
        ));
        html.push_str(&format!(
            "<div><h3>{} results in other entries</h3></div>",
            ordered.len()
        ));
        for entry in ordered {
            let linked = |label: &str, text: &str| {
                if text.is_empty() {
                    String::new()
                } else {
                    let rendered = self.markup.render(&text.replace("'''", ""));
                    format!("<p><b>{label}: </b>{}</p>", highlight(&rendered, query))
                }
            };
            html.push_str(&format!(
                "<div class='results-english'><h3>{}</h3>\
                 <p><b>Part of Speech:</b> {}</p><p><b>Definition:</b> {}</p>{}{}{}</div>",
                query_link(&entry.entry, &entry.entry),
                entry.part_of_speech,
                self.markup.render(&entry.definition),
                linked("Alternate Forms", &entry.alternate_forms),
                linked("Related Forms", &entry.related_forms),
                linked("See Also", &entry.see_also)
            ));
        }
        html
    }

    fn render_partial(
        &self,
        query: &str,
        headwords: &[String],
        candidates: &[RankedCandidate],
    ) -> String {
        let ordered = order_partial(query, headwords);
        let query_len = query.chars().count();
        let mut html = not_found(query);
        html.push_str(
            "<div class='partial-container'><div class='partial-subcontainer'>\
             <h3>Partial matches</h3><div class='partial-results'>",
        );
        for word in ordered.iter().take(self.partial_display_limit) {
            let label = if word.chars().count() > query_len {
                highlight(word, query)
            } else {
                word.to_string()
            };
            html.push_str(&format!(
                "<div class='partial-match'>• {}</div>",
                query_link(word, &label)
            ));
        }
        if ordered.len() > self.partial_display_limit {
            html.push_str(&format!(
                "<div class='partial-match'>{}</div>",
                query_link(&format!("*{query}*"), "See more…")
            ));
        }
        html.push_str(&format!(
            "</div></div><div class='partial-subcontainer'><h3>Or did you mean: </h3>{}</div></div>",
            fuzzy_list(candidates, false)
        ));
        html
    }

    fn render_fuzzy(&self, query: &str, candidates: &[RankedCandidate], long_list: bool) -> String {
        if long_list {
            format!(
                "<h2>Near matches: <i>{query}</i></h2>{}",
                fuzzy_list(candidates, true)
            )
        } else {
            format!(
                "{}<br /><h3>Did you mean: </h3>{}",
                not_found(query),
                fuzzy_list(candidates, false)
            )
        }
    }

    fn render_definitions(&self, query: &str, entries: &[Entry]) -> String {
        if entries.is_empty() {
            return format!(
                "<h2>{query}</h2><p class='no-result'>No results found</p>\
                 <p class='no-result'><a class='no-result-link' href='#' data-query=\"{}\" \
                 data-lang='ch'>Repeat search in Chamoru?</a></p>",
                escape_attr(query)
            );
        }
        let mut html = format!("<div><h2>{} results found</h2></div>", entries.len());
        for entry in order_definitions(query, entries) {
            let definition = strip_emphasis(&entry.definition);
            let definition = highlight(&self.markup.render(&definition), query);
            html.push_str(&format!(
                "<div class='results-english'><h3>{}</h3>\
                 <p><b>Part of Speech:</b> {}</p><p><b>Definition:</b> {definition}</p></div>",
                query_link(&entry.entry, &entry.entry),
                entry.part_of_speech
            ));
        }
        html
    }
}

/// Headwords equal to the query first, unless the query has wildcards.
pub fn order_exact<'a>(query: &str, entries: &'a [Entry]) -> Vec<&'a Entry> {
    if has_wildcard(query) {
        return entries.iter().collect();
    }
    let (exact, rest): (Vec<&Entry>, Vec<&Entry>) =
        entries.iter().partition(|entry| entry.entry == query);
    exact.into_iter().chain(rest).collect()
}

/// The single entry listing the query as an alternate form, if there is
/// exactly one.
pub fn redirect_target<'a>(query: &str, entries: &'a [Entry]) -> Option<&'a Entry> {
    let link = format!("[[{query}]]");
    let mut hits = entries
        .iter()
        .filter(|entry| entry.alternate_forms.contains(&link));
    match (hits.next(), hits.next()) {
        (Some(entry), None) => Some(entry),
        _ => None,
    }
}

/// Alternate-form hits, then related-form hits, then the rest. Wildcard
/// queries keep store order.
pub fn order_cross_references<'a>(query: &str, entries: &'a [Entry]) -> Vec<&'a Entry> {
    if has_wildcard(query) {
        return entries.iter().collect();
    }
    let rank = |entry: &Entry| {
        if entry.alternate_forms.contains(query) {
            0
        } else if entry.related_forms.contains(query) {
            1
        } else {
            2
        }
    };
    let mut ordered: Vec<&Entry> = entries.iter().collect();
    ordered.sort_by_key(|entry| rank(*entry));
    ordered
}

/// Headwords closest in length to the query first.
pub fn order_partial<'a>(query: &str, headwords: &'a [String]) -> Vec<&'a str> {
    let query_len = query.chars().count();
    let mut ordered: Vec<&str> = headwords.iter().map(String::as_str).collect();
    ordered.sort_by_key(|word| word.chars().count().abs_diff(query_len));
    ordered
}

/// Definitions using the query as a whole word first, each group in store
/// order. Bold and italic markers are ignored.
pub fn order_definitions<'a>(query: &str, entries: &'a [Entry]) -> Vec<&'a Entry> {
    let (whole, rest): (Vec<&Entry>, Vec<&Entry>) = entries
        .iter()
        .partition(|entry| contains_whole_word(&strip_emphasis(&entry.definition), query));
    whole.into_iter().chain(rest).collect()
}

fn strip_emphasis(text: &str) -> String {
    text.replace("'''", "").replace("~~", "")
}

/// Case-insensitive search for `word` bounded by the text edges or
/// punctuation.
pub fn contains_whole_word(text: &str, word: &str) -> bool {
    let text = text.to_lowercase();
    let word = word.to_lowercase();
    if word.is_empty() {
        return false;
    }
    text.match_indices(&word).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + word.len()..].chars().next();
        before.is_none_or(|c| WORD_BOUNDARIES.contains(&c))
            && after.is_none_or(|c| WORD_BOUNDARIES.contains(&c))
    })
}

fn fuzzy_list(candidates: &[RankedCandidate], columns: bool) -> String {
    let class = if columns {
        "fuzzy-container fuzzy-container-columns"
    } else {
        "fuzzy-container"
    };
    let mut html = format!("<div class='{class}'>");
    for candidate in candidates {
        html.push_str(&format!(
            "<div class='fuzzy-match'><div class='match-strength'>\
             <div class='match-strength-bar' style='width:{:.2}em'></div></div>{}<br /></div>",
            5.0 * candidate.score,
            query_link(&candidate.word, &candidate.word)
        ));
    }
    html.push_str("</div>");
    html
}

fn not_found(query: &str) -> String {
    format!("<h2>{query}</h2><p class='no-result'>Entry not found</p>")
}

fn query_link(query: &str, label: &str) -> String {
    format!(
        "<a href='#' data-query=\"{}\">{label}</a>",
        escape_attr(query)
    )
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
