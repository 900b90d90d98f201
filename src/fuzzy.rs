use crate::query::FUZZY_TRIGGER;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Consonants whose doubled spelling is treated as a single letter.
const GEMINATE_CONSONANTS: &[char] = &[
    'b', 'c', 'd', 'f', 'g', 'h', 'k', 'l', 'm', 'n', 'p', 'r', 's', 't', 'y', 'B', 'C', 'D', 'F',
    'G', 'H', 'K', 'L', 'M', 'N', 'P', 'R', 'S', 'T', 'Y',
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub score: f64,
    pub word: String,
}

/// Ranks candidate words by Chamoru-aware similarity to a query.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    /// Candidates whose length differs from the query by this much or more
    /// are never scored.
    pub length_window: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self { length_window: 4 }
    }
}

impl FuzzyMatcher {
    pub fn new(length_window: usize) -> Self {
        Self { length_window }
    }

    /// Returns at most `limit` candidates, best first. Equal scores keep the
    /// candidate set's order.
    pub fn rank(
        &self,
        query: &str,
        candidates: &BTreeSet<String>,
        limit: usize,
    ) -> Vec<RankedCandidate> {
        let query: String = query.chars().filter(|c| *c != FUZZY_TRIGGER).collect();
        let query_len = query.chars().count();
        let words: Vec<&String> = candidates.iter().collect();
        let mut ranked: Vec<RankedCandidate> = words
            .par_iter()
            .filter(|word| query_len.abs_diff(word.chars().count()) < self.length_window)
            .map(|word| RankedCandidate {
                score: similarity(word, &query),
                word: (*word).clone(),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(limit);
        ranked
    }
}

/// Similarity on roughly [0, 1]; 1.0 means identical after normalization.
/// One edit costs a short word less than the raw ratio would suggest.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let max_len = max_len as f64;
    1.0 - (1.0 - 1.0 / (0.5 + max_len)) * (distance(&a, &b) / max_len)
}

/// Drops glottal stops, folds `ñ` to `n`, collapses doubled consonants and
/// lowercases.
pub fn normalize(word: &str) -> Vec<char> {
    let mut folded: Vec<char> = Vec::with_capacity(word.len());
    for c in word.chars() {
        let c = match c {
            '\'' => continue,
            'ñ' => 'n',
            other => other,
        };
        if GEMINATE_CONSONANTS.contains(&c) && folded.last() == Some(&c) {
            continue;
        }
        folded.push(c);
    }
    folded.into_iter().flat_map(char::to_lowercase).collect()
}

/// Weighted Levenshtein distance with unit insertions and deletions.
pub fn distance(a: &[char], b: &[char]) -> f64 {
    let mut prev: Vec<f64> = (0..=b.len()).map(|j| j as f64).collect();
    let mut current = vec![0.0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = (i + 1) as f64;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + substitution_cost(ca, cb);
            let deletion = prev[j + 1] + 1.0;
            let insertion = current[j] + 1.0;
            current[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

/// Cost of swapping one letter for another; common Chamoru spelling
/// variations are cheap.
pub fn substitution_cost(a: char, b: char) -> f64 {
    if a == b {
        return 0.0;
    }
    let is = |x: char, y: char| (a == x && b == y) || (a == y && b == x);
    if is('a', 'å') {
        0.1
    } else if is('i', 'e') || is('i', 'u') || is('u', 'o') || is('e', 'o') {
        0.5
    } else if is('a', 'e')
        || is('a', 'o')
        || is('å', 'o')
        || is('l', 'r')
        || is('l', 't')
        || is('r', 't')
    {
        0.8
    } else {
        1.0
    }
}
