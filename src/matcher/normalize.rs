//! Text normalization applied to both sides of a comparison.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Words introducing a featured artist. Everything from the marker on is dropped.
const FEATURING_MARKERS: &[&str] = &["feat", "ft", "featuring"];

/// Normalize a title or guess so that cosmetic differences do not matter.
///
/// The result is lowercase, accent-free, has no parenthesized or bracketed
/// annotations, no trailing featuring credit and only single spaces between
/// alphanumeric words. It may be empty.
pub fn clean(input: &str) -> String {
    let folded = strip_accents(&input.to_lowercase());
    let unannotated = strip_enclosed(&folded);

    let spaced: String = unannotated
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    strip_featuring(spaced.split_whitespace()).join(" ")
}

fn strip_accents(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Drop `( ... )` and `[ ... ]` groups, including nested ones. An unbalanced
/// opening delimiter drops the rest of the string.
fn strip_enclosed(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut depth = 0usize;

    for c in input.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => output.push(c),
            _ => {}
        }
    }

    output
}

/// Cut at the first featuring marker after the leading word. Markers are
/// whole words once punctuation is split off, so `feat.X` and `,ft.` count.
fn strip_featuring<'a>(words: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut kept = Vec::new();
    for word in words {
        if !kept.is_empty() && FEATURING_MARKERS.contains(&word) {
            break;
        }
        kept.push(word);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_accents() {
        assert_eq!(clean("Café Olé"), "cafe ole");
        assert_eq!(clean("ÉTÉ INDIEN"), "ete indien");
        assert_eq!(clean("Señorita"), "senorita");
    }

    #[test]
    fn removes_parenthesized_annotations() {
        assert_eq!(clean("Wonderwall (Remastered 2014)"), "wonderwall");
        assert_eq!(clean("Song [Live] (Radio Edit)"), "song");
        assert_eq!(clean("Outer (a (b) c) tail"), "outer tail");
    }

    #[test]
    fn removes_featuring_credit() {
        assert_eq!(clean("Stay feat. Justin Bieber"), "stay");
        assert_eq!(clean("Lean On ft. MØ"), "lean on");
        assert_eq!(clean("Song featuring Someone"), "song");
        assert_eq!(clean("Song feat.X"), "song");
        assert_eq!(clean("Song,feat. X"), "song");
        assert_eq!(clean("Song (Remix) ft.Someone"), "song");
        // a leading marker is part of the title itself
        assert_eq!(clean("Ft"), "ft");
    }

    #[test]
    fn replaces_punctuation_and_collapses_whitespace() {
        assert_eq!(clean("  Don't   Stop-Me   Now! "), "don t stop me now");
        assert_eq!(clean("AC/DC"), "ac dc");
    }

    #[test]
    fn punctuation_only_input_is_empty() {
        assert_eq!(clean("?!..."), "");
        assert_eq!(clean("(Live)"), "");
        assert_eq!(clean(""), "");
    }
}
