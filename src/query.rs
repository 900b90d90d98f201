use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Requests approximate matching when present anywhere in a query.
pub const FUZZY_TRIGGER: char = '~';
/// Matches any run of characters, including none.
pub const WILDCARD_ANY: char = '*';
/// Matches exactly one character.
pub const WILDCARD_ONE: char = '?';

/// Characters that switch the headword stages to literal matching.
const LITERAL_TRIGGERS: &[char] = &[
    'Å', 'Á', 'É', 'Í', 'Ó', 'Ú', 'á', 'é', 'í', 'ó', 'ú', 'å', 'Ñ', 'ñ', '-', '\'', WILDCARD_ANY,
    WILDCARD_ONE,
];

static DISALLOWED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-ZÅÁÉÍÓÚáéíóúåÑñ \.\-'*?~]+").expect("query filter pattern compiles")
});

/// Cleans a raw user query: curly apostrophes become `'`, anything outside
/// the Chamoru letter set, space, `.`, `-`, `'` and the wildcard glyphs
/// becomes a space, and whitespace is collapsed.
pub fn prepare_query(raw: &str) -> String {
    let folded = fold_apostrophes(raw);
    let filtered = DISALLOWED.replace_all(&folded, " ");
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn fold_apostrophes(text: &str) -> String {
    text.replace(['‘', '’'], "'")
}

/// Drops glottal stops and dashes.
pub fn strip_glottal_and_dash(text: &str) -> String {
    text.chars().filter(|c| *c != '\'' && *c != '-').collect()
}

pub fn has_literal_trigger(query: &str) -> bool {
    query.contains(LITERAL_TRIGGERS)
}

pub fn has_wildcard(query: &str) -> bool {
    query.contains([WILDCARD_ANY, WILDCARD_ONE])
}

/// A query as handed to a dictionary store.
///
/// `text` keeps the user's `*` and `?` wildcards. When `literal` is false the
/// store compares with apostrophes and dashes stripped from both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    pub text: String,
    pub literal: bool,
}

impl MatchPattern {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let literal = has_literal_trigger(&text);
        Self { text, literal }
    }

    /// The text a store should compare against, after the normalization rule.
    pub fn comparable(&self) -> String {
        if self.literal {
            self.text.clone()
        } else {
            strip_glottal_and_dash(&self.text)
        }
    }

    /// Applies the same normalization to a stored field.
    pub fn comparable_field(&self, field: &str) -> String {
        if self.literal {
            field.to_string()
        } else {
            strip_glottal_and_dash(field)
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Glob-style matcher over characters: `*` and `?` are the only
/// metacharacters, everything else matches itself.
#[derive(Debug, Clone)]
pub struct Wildcard {
    pattern: Vec<char>,
}

impl Wildcard {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.chars().collect(),
        }
    }

    /// Pattern anchored to `[[…]]` anywhere inside a field.
    pub fn link_target(pattern: &str) -> Self {
        Self::new(&format!("*[[{pattern}]]*"))
    }

    pub fn contains(pattern: &str) -> Self {
        Self::new(&format!("*{pattern}*"))
    }

    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut p, mut t) = (0usize, 0usize);
        let mut backtrack: Option<(usize, usize)> = None;
        while t < text.len() {
            match self.pattern.get(p) {
                Some(&WILDCARD_ANY) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                Some(&c) if c == WILDCARD_ONE || c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match backtrack {
                    Some((star, consumed)) => {
                        p = star + 1;
                        t = consumed + 1;
                        backtrack = Some((star, consumed + 1));
                    }
                    None => return false,
                },
            }
        }
        self.pattern[p..].iter().all(|c| *c == WILDCARD_ANY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_query_folds_and_filters() {
        assert_eq!(prepare_query("  ta’otao  "), "ta'otao");
        assert_eq!(prepare_query("håfa<script>"), "håfa script");
        assert_eq!(prepare_query("a   b\tc"), "a b c");
        assert_eq!(prepare_query("123"), "");
    }

    #[test]
    fn literal_mode_follows_trigger_set() {
        assert!(!MatchPattern::new("taotao").literal);
        assert!(MatchPattern::new("ta'otao").literal);
        assert!(MatchPattern::new("håfa").literal);
        assert!(MatchPattern::new("ha*").literal);
        assert!(MatchPattern::new("h?fa").literal);
        assert!(MatchPattern::new("guåha").literal);
    }

    #[test]
    fn normalization_is_reflexive() {
        for word in ["ta'otao", "mañe'lu", "hu-guaiya", "adai"] {
            let pattern = MatchPattern {
                text: word.to_string(),
                literal: false,
            };
            assert_eq!(pattern.comparable(), pattern.comparable_field(word));
        }
    }

    #[test]
    fn wildcard_semantics() {
        assert!(Wildcard::new("h*").matches("håfa"));
        assert!(Wildcard::new("h?fa").matches("håfa"));
        assert!(!Wildcard::new("h?fa").matches("hfa"));
        assert!(Wildcard::new("*").matches(""));
        assert!(Wildcard::new("a*b*c").matches("aXXbYc"));
        assert!(!Wildcard::new("a*b*c").matches("aXXbY"));
        assert!(!Wildcard::new("hafa").matches("håfa"));
    }

    #[test]
    fn link_target_pattern_is_anchored_to_brackets() {
        let pattern = Wildcard::link_target("adai");
        assert!(pattern.matches("see [[adai]] too"));
        assert!(!pattern.matches("see [[adaiña]]"));
        assert!(!pattern.matches("adai"));
    }
}
