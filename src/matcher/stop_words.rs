//! Articles and conjunctions ignored by the token-overlap tier.

/// English, French, Spanish, Portuguese, Italian and German function words,
/// in their accent-stripped lowercase form.
const STOP_WORDS: &[&str] = &[
    // en
    "the", "a", "an", "and", "or", "of",
    // fr
    "le", "la", "les", "l", "un", "une", "des", "du", "de", "d", "et", "ou",
    // es
    "el", "los", "las", "una", "unos", "unas", "y", "o",
    // pt
    "os", "as", "um", "uma", "e", "do", "da",
    // it
    "il", "lo", "gli", "i", "uno", "ed",
    // de
    "der", "die", "das", "den", "dem", "ein", "eine", "einen", "und", "oder",
];

/// Whether `word` (already cleaned) is a stop word.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}
