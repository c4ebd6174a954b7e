//! String heuristics shared by the query encoder, the eligibility filter and
//! result formatting.

/// Sentences with this many whitespace tokens or fewer never rank.
pub const MIN_ELIGIBLE_TOKENS: usize = 5;

/// Closed list of English function words dropped from the content-word view.
pub const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your",
    "yours", "yourself", "yourselves", "he", "him", "his", "himself", "she",
    "her", "hers", "herself", "it", "its", "itself", "they", "them", "their",
    "theirs", "themselves", "what", "which", "who", "whom", "this", "that",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of",
    "at", "by", "for", "with", "about", "against", "between", "into",
    "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again",
    "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "any", "both", "each", "few", "more", "most", "other", "some",
    "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
    "very", "s", "t", "can", "will", "just", "don", "should", "now",
];

/// Phrases that mark a sentence as introducing a defined term.
const DEFINING_PHRASES: &[&str] = &[
    "shall have the meaning set forth",
    "shall mean",
    "means",
    "shall have the meaning",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Whitespace-separated token count.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lower-cased whitespace tokens of `text` that are not stop words.
///
/// Punctuation stays attached to its token, so `"cat?"` is kept as-is.
///
/// # Examples
///
/// ```
/// use clauseseek::text_util::content_words;
///
/// assert_eq!(content_words("Where is the Cat"), vec!["cat"]);
/// assert!(content_words("the and of").is_empty());
/// ```
pub fn content_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| !is_stop_word(w))
        .collect()
}

fn letters_and_spaces(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
        .collect::<String>()
        .to_lowercase()
}

/// Whether `sentence` is (a close variant of) one of `titles`.
///
/// Both sides are reduced to ASCII letters and spaces and compared
/// case-insensitively. A title matches when one string contains the other
/// and the sentence is less than twice the title's length, counted either
/// in characters or in words.
pub fn is_title(sentence: &str, titles: &[String]) -> bool {
    let sentence = letters_and_spaces(sentence);
    let sentence_words = token_count(&sentence);

    titles.iter().any(|title| {
        let title = letters_and_spaces(title);
        let title_words = token_count(&title);
        if title_words == 0 {
            return false;
        }
        if !(sentence.contains(&title) || title.contains(&sentence)) {
            return false;
        }

        let char_ratio = sentence.len() as f64 / title.len() as f64;
        let word_ratio = sentence_words as f64 / title_words as f64;
        char_ratio < 2.0 || word_ratio < 2.0
    })
}

/// Whether `sentence` defines one of `definitions`.
///
/// Requires the term to appear (case-insensitively), the sentence to carry
/// curly quotes, and a defining phrase such as "means" or "shall mean".
pub fn is_definition(sentence: &str, definitions: &[String]) -> bool {
    if !(sentence.contains('\u{201c}') && sentence.contains('\u{201d}')) {
        return false;
    }
    let lowered = sentence.to_lowercase();
    let defines = DEFINING_PHRASES.iter().any(|p| lowered.contains(p));

    defines
        && definitions
            .iter()
            .any(|d| lowered.contains(&d.to_lowercase()))
}

/// Whether a sentence may appear in ranked results at all.
pub fn is_eligible(sentence: &str, titles: &[String]) -> bool {
    token_count(sentence) >= MIN_ELIGIBLE_TOKENS && !is_title(sentence, titles)
}

/// Prepend line numbers to each line of text.
///
/// `start_line` is the number to assign to the first line.
pub fn add_line_numbers(text: &str, start_line: usize) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", start_line + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}
