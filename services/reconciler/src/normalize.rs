//! Municipality key normalization
//!
//! The three sources spell the same municipality differently ("São José",
//! "SAO JOSE", "Sao-José", "[São José]"). Every join in the pipeline goes
//! through `normalize` so that keys agree byte for byte.
//!
//! This function is DETERMINISTIC: same text = same key.

use crate::cell::Cell;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn is_bracket(c: char) -> bool {
    matches!(c, '[' | ']' | '{' | '}')
}

fn is_separator(c: char) -> bool {
    matches!(
        c,
        '-' | '\u{2010}'..='\u{2015}' | '\u{2212}' | '\'' | '`' | '\u{2018}' | '\u{2019}' | '\u{02BC}' | '\u{00B4}'
    )
}

/// Steps (a) to (d): strip `[]{}`, NFD + drop combining marks, hyphens and
/// apostrophes to spaces, collapse whitespace.
fn fold(text: &str) -> String {
    let spaced: String = text
        .chars()
        .filter(|c| !is_bracket(*c))
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if is_separator(c) { ' ' } else { c })
        .collect();

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize free text into a municipality key.
pub fn normalize(text: &str) -> String {
    // Case mapping can emit marks or apostrophes (U+01F0, U+0149), fold again
    fold(&fold(text).to_uppercase())
}

/// Normalize a text cell. Numbers and absent cells pass through untouched.
pub fn normalize_cell(cell: &Cell) -> Cell {
    match cell {
        Cell::Text(s) => Cell::Text(normalize(s)),
        other => other.clone(),
    }
}
