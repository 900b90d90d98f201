use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One dictionary row.
///
/// Text fields are never null; an empty string means the field is omitted
/// from display. `index_num` is the canonical display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    pub index_num: i64,
    pub entry: String,
    pub alternate_forms: String,
    pub related_forms: String,
    pub see_also: String,
    pub definition: String,
    pub part_of_speech: String,
    pub origin: String,
    pub examples: String,
    pub notes: String,
    pub source: String,
}

impl Entry {
    pub fn new(index_num: i64, entry: impl Into<String>) -> Self {
        Self {
            index_num,
            entry: entry.into(),
            ..Self::default()
        }
    }

    /// Every well-formed cross-reference in `alternate_forms`,
    /// `related_forms` and `see_also`, in field order.
    pub fn cross_references(&self) -> impl Iterator<Item = CrossReference> + '_ {
        [&self.alternate_forms, &self.related_forms, &self.see_also]
            .into_iter()
            .flat_map(|field| link_spans(field).filter_map(|span| CrossReference::parse(span.inner)))
    }
}

/// The slice of an entry the bulk export returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordSource {
    pub entry: String,
    pub alternate_forms: String,
    pub related_forms: String,
    pub see_also: String,
}

impl From<&Entry> for WordSource {
    fn from(entry: &Entry) -> Self {
        Self {
            entry: entry.entry.clone(),
            alternate_forms: entry.alternate_forms.clone(),
            related_forms: entry.related_forms.clone(),
            see_also: entry.see_also.clone(),
        }
    }
}

/// A `[[target]]` or `[[target|label]]` link found inside a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    pub target: String,
    pub label: Option<String>,
}

impl CrossReference {
    /// Parses the text between `[[` and `]]`. A pipe with an empty side, or
    /// an empty body, is not a link.
    pub fn parse(inner: &str) -> Option<Self> {
        match inner.split_once('|') {
            Some((target, label)) if !target.is_empty() && !label.is_empty() => Some(Self {
                target: target.to_string(),
                label: Some(label.to_string()),
            }),
            Some(_) => None,
            None if inner.is_empty() => None,
            None => Some(Self {
                target: inner.to_string(),
                label: None,
            }),
        }
    }
}

/// Byte range of a delimited span (`[[...]]`, `{{...}}`) and its inner text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span<'a> {
    pub start: usize,
    pub end: usize,
    pub inner: &'a str,
}

impl<'a> Span<'a> {
    /// Text before the first pipe.
    pub fn head(&self) -> &'a str {
        self.inner.split('|').next().unwrap_or_default()
    }
}

/// Iterates `[[...]]` spans left to right. The closing `]]` is the first one
/// after the opener and the body may not contain `[`; an opener that fails
/// either test is skipped one character at a time.
pub(crate) fn link_spans(text: &str) -> DelimitedSpans<'_> {
    delimited_spans(text, "[[", "]]", '[')
}

/// Same scan as [`link_spans`] for arbitrary delimiters.
pub(crate) fn delimited_spans<'a>(
    text: &'a str,
    open: &'static str,
    close: &'static str,
    forbidden: char,
) -> DelimitedSpans<'a> {
    DelimitedSpans {
        text,
        open,
        close,
        forbidden,
        pos: 0,
    }
}

pub(crate) struct DelimitedSpans<'a> {
    text: &'a str,
    open: &'static str,
    close: &'static str,
    forbidden: char,
    pos: usize,
}

impl<'a> Iterator for DelimitedSpans<'a> {
    type Item = Span<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.text.get(self.pos..)?;
            let start = self.pos + rest.find(self.open)?;
            let body_start = start + self.open.len();
            let close = self.text[body_start..].find(self.close)?;
            let inner = &self.text[body_start..body_start + close];
            if inner.contains(self.forbidden) {
                // openers are ASCII, so the next byte is a char boundary
                self.pos = start + 1;
                continue;
            }
            let end = body_start + close + self.close.len();
            self.pos = end;
            return Some(Span { start, end, inner });
        }
    }
}

/// Which side of the dictionary a query is aimed at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Headword search in the dictionary's own language.
    #[default]
    #[serde(alias = "ch", alias = "CH")]
    Chamoru,
    /// Search inside English definitions.
    #[serde(alias = "en", alias = "eng", alias = "Eng")]
    English,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Chamoru => write!(f, "chamoru"),
            Language::English => write!(f, "english"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "ch" | "chamoru" => Ok(Language::Chamoru),
            "en" | "eng" | "english" => Ok(Language::English),
            other => Err(format!("unknown language {other:?} (expected `ch` or `en`)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_spans_are_non_greedy() {
        let spans: Vec<_> = link_spans("[[a]], [[b|c]] end]]").map(|s| s.inner).collect();
        assert_eq!(spans, vec!["a", "b|c"]);
    }

    #[test]
    fn link_spans_skip_nested_openers() {
        let spans: Vec<_> = link_spans("[[a [[b]]").map(|s| s.inner).collect();
        assert_eq!(spans, vec!["b"]);
    }

    #[test]
    fn unclosed_link_yields_nothing() {
        assert_eq!(link_spans("see [[adai").count(), 0);
    }

    #[test]
    fn cross_reference_rejects_empty_sides() {
        assert_eq!(CrossReference::parse("|label"), None);
        assert_eq!(CrossReference::parse("target|"), None);
        assert_eq!(CrossReference::parse(""), None);
        assert_eq!(
            CrossReference::parse("adai|greeting"),
            Some(CrossReference {
                target: "adai".to_string(),
                label: Some("greeting".to_string()),
            })
        );
    }

    #[test]
    fn entry_collects_cross_references_from_all_fields() {
        let mut entry = Entry::new(1, "håfa");
        entry.alternate_forms = "[[hafa]]".to_string();
        entry.see_also = "[[adai|greeting]] and [[|broken]]".to_string();
        let targets: Vec<_> = entry.cross_references().map(|x| x.target).collect();
        assert_eq!(targets, vec!["hafa", "adai"]);
    }

    #[test]
    fn language_parses_short_codes() {
        assert_eq!("CH".parse::<Language>(), Ok(Language::Chamoru));
        assert_eq!("eng".parse::<Language>(), Ok(Language::English));
        assert!("fr".parse::<Language>().is_err());
    }
}
