//! Brace-balanced span extraction.
//!
//! LaTeX command arguments nest arbitrarily (`\caption{see \ref{fig:a}}`),
//! so a character class can never capture them. Both functions here make a
//! single forward pass with a depth counter: depth rises on an opening
//! delimiter, falls on a closing one, and a span ends when depth returns to
//! zero. Escaped delimiters are not treated specially; every delimiter
//! character counts toward nesting.

/// Contents of the first top-level delimited group in `text`, without the
/// delimiters themselves.
///
/// Returns `None` when no group opens, or when the first group never
/// closes. Stray closing delimiters before the first opening one are
/// ignored.
pub fn balanced_group(text: &str, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
            if depth == 1 {
                start = i + c.len_utf8();
            }
        } else if c == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..i]);
            }
        }
    }

    None
}

/// Every sibling top-level group in `text`, in order.
///
/// `{a}{b}` yields `["a", "b"]`. An unterminated trailing group yields
/// nothing for that group; stray closing delimiters at depth zero are
/// ignored.
pub fn balanced_groups(text: &str, open: char, close: char) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
            if depth == 1 {
                start = i + c.len_utf8();
            }
        } else if c == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                groups.push(&text[start..i]);
            }
        }
    }

    groups
}
