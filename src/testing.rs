//! Deterministic capabilities shared by unit tests.

use crate::{
    annotator::{Annotation, Annotator},
    embedding::{Embedder, ViewMatrix},
    error::Result,
};

pub const VOCAB: &[&str] = &[
    "the", "a", "cat", "mat", "dog", "park", "sat", "ran", "where",
];

const NOUNS: &[&str] = &["cat", "mat", "dog", "park"];
const VERBS: &[&str] = &["sat", "ran"];

fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// One-hot embedding of a text's first word over [`VOCAB`]; anything else is
/// the zero vector.
#[derive(Debug, Default)]
pub struct VocabEmbedder {
    pub calls: usize,
    pub texts: usize,
}

impl Embedder for VocabEmbedder {
    fn dimension(&self) -> usize {
        VOCAB.len()
    }

    fn fingerprint(&self) -> String {
        "vocab".to_string()
    }

    fn embed(&mut self, texts: &[String]) -> Result<ViewMatrix> {
        self.calls += 1;
        self.texts += texts.len();

        let dim = VOCAB.len();
        let mut data = vec![0.0; texts.len() * dim];
        for (text, row) in texts.iter().zip(data.chunks_mut(dim)) {
            let first = text.split_whitespace().next().map(normalize);
            if let Some(pos) =
                first.and_then(|w| VOCAB.iter().position(|v| *v == w))
            {
                row[pos] = 1.0;
            }
        }
        ViewMatrix::new(texts.len(), dim, data)
    }
}

/// Nouns and verbs from a fixed word list; keyphrases are the nouns.
#[derive(Debug, Default)]
pub struct KeywordAnnotator;

fn pick(text: &str, list: &[&str]) -> Vec<String> {
    text.split_whitespace()
        .map(normalize)
        .filter(|w| list.contains(&w.as_str()))
        .collect()
}

impl Annotator for KeywordAnnotator {
    fn annotate(&self, text: &str) -> Result<Annotation> {
        Ok(Annotation {
            noun_phrases: pick(text, NOUNS),
            verb_phrases: pick(text, VERBS),
        })
    }

    fn keyphrases(&self, text: &str) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        for noun in pick(text, NOUNS) {
            if !out.contains(&noun) {
                out.push(noun);
            }
        }
        Ok(out)
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
