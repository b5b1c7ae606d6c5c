use crate::checker::dictionary::Dictionary;
use std::collections::HashSet;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Generate ranked spelling suggestions for a lowercase word.
///
/// Candidates come from three sources, cheapest first: words one edit away,
/// words sharing a prefix, and (for very short words) a full scan by length.
/// Ranking is by edit distance, then anagrams first, then length difference,
/// then alphabetically, so the output is fully deterministic.
pub fn generate(word: &str, dictionary: &Dictionary, max_suggestions: usize) -> Vec<String> {
    if max_suggestions == 0 || word.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut consider = |candidate: String, limit: usize| {
        if candidate == word || seen.contains(&candidate) {
            return;
        }
        let distance = edit_distance(word, &candidate);
        if distance <= limit {
            seen.insert(candidate.clone());
            candidates.push((rank(word, &candidate, distance), candidate));
        }
    };

    for edit in single_edits(word) {
        if dictionary.contains(&edit) {
            consider(edit, 1);
        }
    }

    let chars: Vec<char> = word.chars().collect();
    for prefix_len in [3, 2] {
        if chars.len() >= prefix_len {
            let prefix: String = chars[..prefix_len].iter().collect();
            for candidate in dictionary.words_with_prefix(&prefix) {
                consider(candidate, 2);
            }
        }
    }

    if chars.len() <= 3 {
        for candidate in dictionary.words_near_length(chars.len()) {
            consider(candidate, 2);
        }
    }

    candidates.sort();
    candidates
        .into_iter()
        .take(max_suggestions)
        .map(|(_, candidate)| candidate)
        .collect()
}

fn rank(word: &str, candidate: &str, distance: usize) -> (usize, bool, usize, String) {
    let mut a: Vec<char> = word.chars().collect();
    let mut b: Vec<char> = candidate.chars().collect();
    a.sort_unstable();
    b.sort_unstable();
    let len_diff = a.len().abs_diff(b.len());
    (distance, a != b, len_diff, candidate.to_string())
}

/// Optimal string alignment distance: Levenshtein plus adjacent transposition.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut before_prev: Vec<usize> = vec![0; b.len() + 1];
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            current[j] = (prev[j] + 1)
                .min(current[j - 1] + 1)
                .min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                current[j] = current[j].min(before_prev[j - 2] + 1);
            }
        }
        std::mem::swap(&mut before_prev, &mut prev);
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Every string one deletion, transposition, replacement or insertion away.
fn single_edits(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut edits = Vec::with_capacity(chars.len() * 54 + 26);

    for i in 0..chars.len() {
        let mut w = chars.clone();
        w.remove(i);
        edits.push(w.into_iter().collect());
    }

    for i in 0..chars.len().saturating_sub(1) {
        let mut w = chars.clone();
        w.swap(i, i + 1);
        edits.push(w.into_iter().collect());
    }

    for i in 0..chars.len() {
        for c in ALPHABET.chars().filter(|&c| c != chars[i]) {
            let mut w = chars.clone();
            w[i] = c;
            edits.push(w.into_iter().collect());
        }
    }

    for i in 0..=chars.len() {
        for c in ALPHABET.chars() {
            let mut w = chars.clone();
            w.insert(i, c);
            edits.push(w.into_iter().collect());
        }
    }

    edits
}
