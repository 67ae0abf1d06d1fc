//! Fuzzy answer matching deciding whether a free-text guess names a song title.
//!
//! The decision is tiered and the first tier that accepts wins:
//!
//! 1. exact equality of the cleaned strings,
//! 2. token overlap against the significant words of the title,
//! 3. normalized edit-distance similarity.

mod normalize;
mod stop_words;

use std::collections::HashSet;

pub use self::normalize::clean;
use self::stop_words::is_stop_word;

/// Minimum share of the title's significant words the guess must contain.
pub const TOKEN_OVERLAP_THRESHOLD: f64 = 0.8;
/// Minimum normalized Levenshtein similarity.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;
/// Length difference (relative to the longer string) above which similarity is 0.
const MAX_LENGTH_GAP: f64 = 0.3;

/// Tier that accepted a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Cleaned strings are identical.
    Exact,
    /// The guess reproduces enough of the title's words.
    TokenOverlap,
    /// The guess is a close spelling of the title.
    EditDistance,
}

/// Return `true` when `guess` is an acceptable answer for `actual_title`.
pub fn accept(guess: &str, actual_title: &str) -> bool {
    evaluate(guess, actual_title).is_some()
}

/// Run the tiered decision, reporting which tier accepted the guess.
pub fn evaluate(guess: &str, actual_title: &str) -> Option<MatchTier> {
    let guess = clean(guess);
    let actual = clean(actual_title);

    if guess.is_empty() || actual.is_empty() {
        return None;
    }

    if guess == actual {
        return Some(MatchTier::Exact);
    }

    if token_overlap(&guess, &actual) >= TOKEN_OVERLAP_THRESHOLD {
        return Some(MatchTier::TokenOverlap);
    }

    if similarity(&guess, &actual) >= SIMILARITY_THRESHOLD {
        return Some(MatchTier::EditDistance);
    }

    None
}

/// Share of the title's significant tokens present in the guess.
///
/// The ratio is relative to the title only: extra words in the guess are not
/// penalized.
pub fn token_overlap(guess: &str, actual: &str) -> f64 {
    let guess_tokens = significant_tokens(guess);
    let actual_tokens = significant_tokens(actual);

    if actual_tokens.is_empty() {
        return 0.0;
    }

    let shared = actual_tokens.intersection(&guess_tokens).count();
    shared as f64 / actual_tokens.len() as f64
}

fn significant_tokens(cleaned: &str) -> HashSet<&str> {
    let all: HashSet<&str> = cleaned.split_whitespace().collect();
    let filtered: HashSet<&str> = all
        .iter()
        .copied()
        .filter(|token| !is_stop_word(token))
        .collect();

    if filtered.is_empty() { all } else { filtered }
}

/// Normalized Levenshtein similarity in `[0, 1]` over characters.
pub fn similarity(left: &str, right: &str) -> f64 {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    let longest = left.len().max(right.len());

    if longest == 0 {
        return 0.0;
    }

    let gap = left.len().abs_diff(right.len());
    if gap as f64 > longest as f64 * MAX_LENGTH_GAP {
        return 0.0;
    }

    1.0 - levenshtein(&left, &right) as f64 / longest as f64
}

/// Classic two-row dynamic programming edit distance.
fn levenshtein(left: &[char], right: &[char]) -> usize {
    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0; right.len() + 1];

    for (i, l) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, r) in right.iter().enumerate() {
            let substitution = previous[j] + usize::from(l != r);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}
