//! Clause segmentation used for the `split_normal` and `split_fine` views.

/// How aggressively a sentence is cut into clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Cut after every sentence terminator (`". "`).
    Normal,
    /// Also cut at enumerators such as `(a) ` and at tabs.
    Fine,
}

const NORMAL_DELIMITERS: &[&str] = &[". "];

const FINE_DELIMITERS: &[&str] = &[
    ". ", "(a) ", "(b) ", "(c) ", "(d) ", "(A) ", "(B) ", "(C) ", "(D) ",
    "\t",
];

const NO_BREAK_SPACE: char = '\u{a0}';

impl Granularity {
    fn delimiters(self) -> &'static [&'static str] {
        match self {
            Self::Normal => NORMAL_DELIMITERS,
            Self::Fine => FINE_DELIMITERS,
        }
    }
}

/// Split a sentence into clauses.
///
/// Delimiters are consumed. Empty clauses are kept, so `"(a) x"` at
/// [`Granularity::Fine`] yields `["", "x"]`. A sentence without any
/// delimiter comes back as a single clause.
///
/// # Examples
///
/// ```
/// use clauseseek::splitter::{split, Granularity};
///
/// assert_eq!(
///     split("First part. Second part", Granularity::Normal),
///     vec!["First part", "Second part"],
/// );
/// assert_eq!(
///     split("Pay (a) rent (b) fees", Granularity::Fine),
///     vec!["Pay ", "rent ", "fees"],
/// );
/// ```
pub fn split(sentence: &str, granularity: Granularity) -> Vec<String> {
    let delimiters = granularity.delimiters();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut pos = 0;

    while pos < sentence.len() {
        let rest = &sentence[pos..];
        if let Some(delimiter) = delimiters.iter().find(|d| rest.starts_with(**d))
        {
            pieces.push(&sentence[start..pos]);
            pos += delimiter.len();
            start = pos;
        } else {
            pos += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    pieces.push(&sentence[start..]);

    match granularity {
        Granularity::Normal => pieces.into_iter().map(str::to_string).collect(),
        Granularity::Fine => pieces
            .into_iter()
            .map(|p| p.replace(NO_BREAK_SPACE, " "))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_splits_on_period_space() {
        assert_eq!(
            split("One. Two. Three.", Granularity::Normal),
            vec!["One", "Two", "Three."]
        );
    }

    #[test]
    fn normal_ignores_enumerators() {
        assert_eq!(
            split("Pay (a) rent", Granularity::Normal),
            vec!["Pay (a) rent"]
        );
    }

    #[test]
    fn no_delimiter_yields_single_clause() {
        assert_eq!(split("plain text", Granularity::Fine), vec!["plain text"]);
        assert_eq!(split("", Granularity::Normal), vec![""]);
    }

    #[test]
    fn fine_splits_on_both_enumerator_cases() {
        assert_eq!(
            split("x (a) y (B) z (d) w", Granularity::Fine),
            vec!["x ", "y ", "z ", "w"]
        );
    }

    #[test]
    fn fine_keeps_leading_empty_clause() {
        assert_eq!(split("(a) first", Granularity::Fine), vec!["", "first"]);
    }

    #[test]
    fn fine_splits_on_tab() {
        assert_eq!(
            split("left\tright", Granularity::Fine),
            vec!["left", "right"]
        );
    }

    #[test]
    fn fine_normalizes_no_break_space_without_splitting() {
        assert_eq!(
            split("a.\u{a0}b c", Granularity::Fine),
            vec!["a. b c"]
        );
    }

    #[test]
    fn adjacent_delimiters_produce_empty_clause() {
        assert_eq!(
            split("end. (a) next", Granularity::Fine),
            vec!["end", "", "next"]
        );
    }

    #[test]
    fn multibyte_text_is_preserved() {
        assert_eq!(
            split("Café ouvert. Thé chaud", Granularity::Normal),
            vec!["Café ouvert", "Thé chaud"]
        );
    }
}
