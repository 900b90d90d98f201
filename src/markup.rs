//! Wiki-style entry markup.
//!
//! Passes run in a fixed order (bold, italic, links, templates) and each one
//! only rewrites the constructs it owns. Anything that does not parse is left
//! as literal text.

use crate::entry::{CrossReference, Span, delimited_spans, link_spans};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

static PROBABLE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9]\.[A-Za-z0-9]{2}").expect("url heuristic compiles"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),
}

/// Output flavour of the markup engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    Html,
    /// Terminal-friendly Markdown.
    Markdown,
}

impl Dialect {
    fn bold(self) -> (&'static str, &'static str) {
        match self {
            Dialect::Html => ("<b>", "</b>"),
            Dialect::Markdown => ("**", "**"),
        }
    }

    fn italic(self) -> (&'static str, &'static str) {
        match self {
            Dialect::Html => ("<i>", "</i>"),
            Dialect::Markdown => ("*", "*"),
        }
    }

    fn internal_link(self, text: &str, query: &str) -> String {
        match self {
            Dialect::Html => format!(
                "<a class='markup-link' href='#' data-query=\"{}\">{text}</a>",
                escape_attr(query)
            ),
            Dialect::Markdown => format!("`{text}`"),
        }
    }

    fn external_link(self, href: &str, text: &str) -> String {
        match self {
            Dialect::Html => format!(
                "<a class='markup-link external' target='_blank' href=\"{}\">{text}</a>",
                escape_attr(href)
            ),
            Dialect::Markdown => format!("[{text}]({href})"),
        }
    }

    fn line_break(self) -> &'static str {
        match self {
            Dialect::Html => "<br />",
            Dialect::Markdown => "\n",
        }
    }

    fn list_item(self, word: &str, gloss: Option<&str>) -> String {
        let gloss = gloss.map(|g| format!(" ({g})")).unwrap_or_default();
        match self {
            Dialect::Html => format!("<li>{word}{gloss}</li>"),
            Dialect::Markdown => format!("\n* {word}{gloss}"),
        }
    }

    fn example(self, source: &str, translation: Option<&str>) -> String {
        match (self, translation) {
            (Dialect::Html, Some(translation)) => format!(
                "<div class='ex-ch'>{source}</div><div class='ex-eng'>{translation}</div>"
            ),
            (Dialect::Html, None) => format!("<div class='ex-ch'>{source}</div>"),
            (Dialect::Markdown, Some(translation)) => {
                format!("\n* {source}\n  *{translation}*")
            }
            (Dialect::Markdown, None) => format!("\n* {source}"),
        }
    }
}

/// The closed set of `{{...}}` templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// `{{list||word|gloss||...}}`
    List,
    /// `{{||example|translation||...}}`; the empty name selects it.
    Examples,
}

impl FromStr for TemplateKind {
    type Err = MarkupError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "list" => Ok(TemplateKind::List),
            "" | "examples" => Ok(TemplateKind::Examples),
            other => Err(MarkupError::TemplateNotFound(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupEngine {
    dialect: Dialect,
}

impl MarkupEngine {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn html() -> Self {
        Self::new(Dialect::Html)
    }

    pub fn markdown() -> Self {
        Self::new(Dialect::Markdown)
    }

    /// Renders one field. Never fails: unknown templates are dropped and
    /// logged, every other parse problem leaves the text as written.
    pub fn render(&self, text: &str) -> String {
        let text = self.render_bold(text);
        let text = self.render_italic(&text);
        let text = self.render_links(&text);
        self.render_templates(&text)
    }

    fn render_bold(&self, text: &str) -> String {
        pair_markers(text, &bold_markers(text), self.dialect.bold())
    }

    fn render_italic(&self, text: &str) -> String {
        let markers: Vec<(usize, usize)> = text.match_indices("~~").map(|(at, _)| (at, 2)).collect();
        pair_markers(text, &markers, self.dialect.italic())
    }

    fn render_links(&self, text: &str) -> String {
        replace_spans(text, link_spans(text), |span| {
            let link = CrossReference::parse(span.inner)?;
            Some(match link.label {
                Some(piped) if PROBABLE_URL.is_match(&piped) => {
                    self.dialect.external_link(&piped, &link.target)
                }
                Some(piped) => self.dialect.internal_link(&link.target, &piped),
                None => self.dialect.internal_link(&link.target, &link.target),
            })
        })
    }

    fn render_templates(&self, text: &str) -> String {
        replace_spans(text, delimited_spans(text, "{{", "}}", '{'), |span| {
            match self.render_template(span.inner) {
                Ok(rendered) => Some(rendered),
                Err(err) => {
                    warn!(error = %err, body = span.inner, "dropping template span");
                    Some(String::new())
                }
            }
        })
    }

    /// Expands the body of one `{{...}}` span.
    pub fn render_template(&self, body: &str) -> Result<String, MarkupError> {
        if body.is_empty() {
            return Ok(self.dialect.line_break().to_string());
        }
        let mut records = body.split("||");
        let kind: TemplateKind = records.next().unwrap_or_default().parse()?;
        let rendered = records
            .map(|record| {
                let mut fields = record.split('|');
                let first = fields.next().unwrap_or_default();
                let second = fields.next().filter(|field| !field.is_empty());
                match kind {
                    TemplateKind::List => self.dialect.list_item(first, second),
                    TemplateKind::Examples => self.dialect.example(first, second),
                }
            })
            .collect();
        Ok(rendered)
    }
}

/// Positions of `'''` delimiters. A run of four apostrophes is a glottal
/// stop followed by a delimiter; longer runs repeat that rule, then take any
/// plain `'''`, and leftovers stay literal.
fn bold_markers(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut markers = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\'' {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i] == b'\'' {
            i += 1;
        }
        let (mut at, mut run) = (start, i - start);
        while run >= 4 {
            markers.push((at + 1, 3));
            at += 4;
            run -= 4;
        }
        while run >= 3 {
            markers.push((at, 3));
            at += 3;
            run -= 3;
        }
    }
    markers
}

/// Replaces delimiter pairs, left to right, with open/close tags. An odd
/// trailing delimiter is kept as written.
fn pair_markers(text: &str, markers: &[(usize, usize)], tags: (&str, &str)) -> String {
    let mut out = String::with_capacity(text.len() + markers.len() * 2);
    let mut cursor = 0;
    for pair in markers.chunks(2) {
        let [(open_at, open_len), (close_at, close_len)] = pair else {
            break;
        };
        out.push_str(&text[cursor..*open_at]);
        out.push_str(tags.0);
        out.push_str(&text[open_at + open_len..*close_at]);
        out.push_str(tags.1);
        cursor = close_at + close_len;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Rewrites each span with `render`; `None` keeps the span verbatim.
fn replace_spans<'a, I, F>(text: &'a str, spans: I, mut render: F) -> String
where
    I: Iterator<Item = Span<'a>>,
    F: FnMut(&Span<'a>) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        match render(&span) {
            Some(rendered) => out.push_str(&rendered),
            None => out.push_str(&text[span.start..span.end]),
        }
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
