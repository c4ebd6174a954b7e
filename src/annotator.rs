//! Linguistic annotation: noun phrases, verb phrases and keyphrases.
//!
//! The scoring core only needs the [`Annotator`] trait. [`HeuristicAnnotator`]
//! is a rule-based English implementation that runs without any model: it
//! tags words with a small closed vocabulary plus suffix rules, chunks noun
//! phrases as `DET? CONTENT+`, verb phrases as `VERB? ADV* VERB+`, and ranks
//! document keyphrases RAKE-style (word degree over frequency, summed per
//! stop-word-delimited candidate).

use std::collections::{HashMap, HashSet};

use tantivy::tokenizer::{SimpleTokenizer, TextAnalyzer, TokenStream};

use crate::{error::Result, text_util::is_stop_word};

/// Default number of keyphrases kept per document.
pub const DEFAULT_KEYPHRASE_LIMIT: usize = 30;

/// Longest candidate keyphrase, in words.
const MAX_KEYPHRASE_WORDS: usize = 4;

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "each", "every", "any",
    "some", "no", "its", "their", "his", "her", "our", "your", "my",
];

const MODALS: &[&str] = &[
    "shall", "will", "may", "must", "can", "could", "should", "would", "might",
];

const AUXILIARIES: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "being", "am", "has", "have",
    "had", "do", "does", "did",
];

const NEGATIONS: &[&str] = &["not", "never"];

/// Verbs that the `-ly` adverb rule would otherwise catch.
const LY_VERBS: &[&str] = &[
    "apply", "comply", "supply", "rely", "reply", "imply", "multiply",
];

/// Phrases extracted from a single sentence or query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub noun_phrases: Vec<String>,
    pub verb_phrases: Vec<String>,
}

/// Extracts syntactic phrases and document keyphrases.
pub trait Annotator: Send + Sync {
    /// Noun and verb phrases of one sentence, in order of appearance.
    fn annotate(&self, text: &str) -> Result<Annotation>;

    /// Keyphrases of a whole document, most salient first.
    fn keyphrases(&self, text: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Determiner,
    Function,
    Verb,
    Adverb,
    Content,
}

#[derive(Debug)]
struct Word {
    start: usize,
    end: usize,
    lower: String,
    tag: Tag,
    /// Punctuation or a line break separates this word from the previous one.
    boundary_before: bool,
}

/// Rule-based English annotator.
#[derive(Debug, Clone)]
pub struct HeuristicAnnotator {
    keyphrase_limit: usize,
}

impl Default for HeuristicAnnotator {
    fn default() -> Self {
        Self::new(DEFAULT_KEYPHRASE_LIMIT)
    }
}

impl HeuristicAnnotator {
    pub fn new(keyphrase_limit: usize) -> Self {
        Self { keyphrase_limit }
    }

    pub fn keyphrase_limit(&self) -> usize {
        self.keyphrase_limit
    }
}

impl Annotator for HeuristicAnnotator {
    fn annotate(&self, text: &str) -> Result<Annotation> {
        let words = tag_words(text);
        Ok(Annotation {
            noun_phrases: noun_phrases(text, &words),
            verb_phrases: verb_phrases(text, &words),
        })
    }

    fn keyphrases(&self, text: &str) -> Result<Vec<String>> {
        Ok(rake(text, &tag_words(text), self.keyphrase_limit))
    }
}

fn tokenize(text: &str) -> Vec<(usize, usize)> {
    let mut analyzer = TextAnalyzer::builder(SimpleTokenizer::default()).build();
    let mut stream = analyzer.token_stream(text);
    let mut spans = Vec::new();
    while stream.advance() {
        let token = stream.token();
        spans.push((token.offset_from, token.offset_to));
    }
    spans
}

fn tag_words(text: &str) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut previous_end = 0;

    for (start, end) in tokenize(text) {
        let gap = &text[previous_end..start];
        let boundary_before =
            words.is_empty() || gap.chars().any(|c| !c.is_whitespace() || c == '\n');
        previous_end = end;

        let lower = text[start..end].to_lowercase();
        let after_modal = !boundary_before
            && words
                .iter()
                .rev()
                .find(|w| w.tag != Tag::Adverb)
                .is_some_and(|w| MODALS.contains(&w.lower.as_str()) || w.lower == "to");
        let tag = classify(&lower, after_modal);

        words.push(Word {
            start,
            end,
            lower,
            tag,
            boundary_before,
        });
    }

    words
}

fn classify(word: &str, after_modal: bool) -> Tag {
    if DETERMINERS.contains(&word) {
        Tag::Determiner
    } else if MODALS.contains(&word) || AUXILIARIES.contains(&word) {
        Tag::Verb
    } else if NEGATIONS.contains(&word) {
        Tag::Adverb
    } else if is_stop_word(word) || word == "to" {
        Tag::Function
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        Tag::Content
    } else if word.len() > 3
        && word.ends_with("ly")
        && !LY_VERBS.contains(&word)
    {
        Tag::Adverb
    } else if after_modal
        || (word.len() > 3 && word.ends_with("ed"))
        || (word.len() > 4 && word.ends_with("ing"))
    {
        Tag::Verb
    } else {
        Tag::Content
    }
}

fn span(text: &str, words: &[Word]) -> String {
    match (words.first(), words.last()) {
        (Some(first), Some(last)) => text[first.start..last.end].trim().to_string(),
        _ => String::new(),
    }
}

/// Runs of content words, with the determiner right before them.
fn noun_phrases(text: &str, words: &[Word]) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut i = 0;

    while i < words.len() {
        if words[i].tag != Tag::Content {
            i += 1;
            continue;
        }

        let mut start = i;
        if i > 0
            && words[i - 1].tag == Tag::Determiner
            && !words[i].boundary_before
        {
            start = i - 1;
        }

        let mut end = i + 1;
        while end < words.len()
            && words[end].tag == Tag::Content
            && !words[end].boundary_before
        {
            end += 1;
        }

        phrases.push(span(text, &words[start..end]));
        i = end;
    }

    phrases
}

/// Maximal `VERB? ADV* VERB+` runs.
fn verb_phrases(text: &str, words: &[Word]) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut i = 0;

    while i < words.len() {
        if !matches!(words[i].tag, Tag::Verb | Tag::Adverb) {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < words.len()
            && matches!(words[end].tag, Tag::Verb | Tag::Adverb)
            && !words[end].boundary_before
        {
            end += 1;
        }

        let mut last = end;
        while last > i && words[last - 1].tag == Tag::Adverb {
            last -= 1;
        }
        if last > i {
            phrases.push(span(text, &words[i..last]));
        }
        i = end;
    }

    phrases
}

fn is_candidate_word(word: &Word) -> bool {
    matches!(word.tag, Tag::Content | Tag::Verb)
        && !MODALS.contains(&word.lower.as_str())
        && !AUXILIARIES.contains(&word.lower.as_str())
}

/// RAKE keyphrase ranking over stop-word-delimited candidates.
fn rake(text: &str, words: &[Word], limit: usize) -> Vec<String> {
    let mut candidates: Vec<&[Word]> = Vec::new();
    let mut i = 0;

    while i < words.len() {
        if !is_candidate_word(&words[i]) {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < words.len()
            && end - i < MAX_KEYPHRASE_WORDS
            && is_candidate_word(&words[end])
            && !words[end].boundary_before
        {
            end += 1;
        }
        let candidate = &words[i..end];
        let informative = candidate
            .iter()
            .any(|w| w.lower.chars().any(char::is_alphabetic) && w.lower.len() > 1);
        if informative {
            candidates.push(candidate);
        }
        i = end;
    }

    let mut frequency: HashMap<&str, f32> = HashMap::new();
    let mut degree: HashMap<&str, f32> = HashMap::new();
    for candidate in &candidates {
        for word in candidate.iter() {
            *frequency.entry(word.lower.as_str()).or_default() += 1.0;
            *degree.entry(word.lower.as_str()).or_default() += candidate.len() as f32;
        }
    }

    // (surface form, score, first occurrence)
    let mut ranked: Vec<(String, f32, usize)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (position, candidate) in candidates.iter().enumerate() {
        let key = candidate
            .iter()
            .map(|w| w.lower.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if !seen.insert(key) {
            continue;
        }
        let score: f32 = candidate
            .iter()
            .map(|w| degree[w.lower.as_str()] / frequency[w.lower.as_str()])
            .sum();
        ranked.push((span(text, candidate), score, position));
    }

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.2.cmp(&b.2))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|(surface, _, _)| surface)
        .collect()
}
