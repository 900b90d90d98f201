use unicode_normalization::UnicodeNormalization;

const HIGHLIGHT_OPEN: &str = "<span class='highlight'>";
const HIGHLIGHT_CLOSE: &str = "</span>";

/// Wraps every occurrence of `query` in already-rendered HTML with a
/// highlight span.
///
/// Matching ignores tags, case and combining accents, so `hafa` highlights
/// `Håfa`; the inserted spans land on the original, accented text. Queries
/// carrying `*`, `?` or `~` are returned untouched.
pub fn highlight(marked_up: &str, query: &str) -> String {
    if query.is_empty() || query.contains(['*', '?', '~']) {
        return marked_up.to_string();
    }
    let needle: Vec<char> = fold(query).collect();
    if needle.is_empty() {
        return marked_up.to_string();
    }

    let projection = Projection::new(marked_up);
    let mut ranges = Vec::new();
    let mut i = 0;
    while i + needle.len() <= projection.chars.len() {
        if projection.chars[i..i + needle.len()] == needle[..] {
            let start = projection.origin[i];
            let end = projection.byte_after(i + needle.len(), marked_up.len());
            ranges.push((start, end));
            i += needle.len();
        } else {
            i += 1;
        }
    }

    let mut out = marked_up.to_string();
    for (start, end) in ranges.into_iter().rev() {
        out.insert_str(end, HIGHLIGHT_CLOSE);
        out.insert_str(start, HIGHLIGHT_OPEN);
    }
    out
}

/// Tag-free, accent-free, lowercase view of a rendered string, with the byte
/// offset in the original each projected char came from.
struct Projection {
    chars: Vec<char>,
    origin: Vec<usize>,
}

impl Projection {
    fn new(html: &str) -> Self {
        let mut chars = Vec::with_capacity(html.len());
        let mut origin = Vec::with_capacity(html.len());
        let mut pos = 0;
        while pos < html.len() {
            if let Some(len) = tag_len(&html[pos..]) {
                pos += len;
                continue;
            }
            let Some(c) = html[pos..].chars().next() else {
                break;
            };
            for folded in fold_char(c) {
                chars.push(folded);
                origin.push(pos);
            }
            pos += c.len_utf8();
        }
        Self { chars, origin }
    }

    /// Original offset of the projected char at `index`, skipping any tags
    /// in front of it; the end of the input once past the last char.
    fn byte_after(&self, index: usize, total: usize) -> usize {
        self.origin.get(index).copied().unwrap_or(total)
    }
}

/// Length of the tag opening `text`: `<` through the next `>` with no `<`
/// in between.
fn tag_len(text: &str) -> Option<usize> {
    let rest = text.strip_prefix('<')?;
    let close = rest.find(['<', '>'])?;
    rest[close..].starts_with('>').then_some(close + 2)
}

fn fold(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().flat_map(fold_char)
}

fn fold_char(c: char) -> impl Iterator<Item = char> {
    std::iter::once(c)
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .flat_map(char::to_lowercase)
}
