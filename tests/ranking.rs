use clauseseek::{
    DocumentIndex,
    Result,
    annotator::{Annotation, Annotator},
    build_index,
    codec::{decode_index, encode_index},
    document::{IndexOptions, LineView},
    embedding::{Embedder, ViewMatrix},
    encode,
    final_results,
    query::QueryView,
    rank,
    scoring::{QueryTensors, ScoreTable},
};

const VOCAB: &[&str] = &["the", "a", "cat", "mat", "dog", "park", "sat", "ran"];
const NOUNS: &[&str] = &["cat", "mat", "dog", "park"];
const VERBS: &[&str] = &["sat", "ran"];

fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// One-hot of a text's first word.
struct FirstWordEmbedder;

impl Embedder for FirstWordEmbedder {
    fn dimension(&self) -> usize {
        VOCAB.len()
    }

    fn fingerprint(&self) -> String {
        "first-word".to_string()
    }

    fn embed(&mut self, texts: &[String]) -> Result<ViewMatrix> {
        let dim = VOCAB.len();
        let mut data = vec![0.0; texts.len() * dim];
        for (text, row) in texts.iter().zip(data.chunks_mut(dim)) {
            let first = text.split_whitespace().next().map(normalize);
            if let Some(pos) = first.and_then(|w| VOCAB.iter().position(|v| *v == w)) {
                row[pos] = 1.0;
            }
        }
        ViewMatrix::new(texts.len(), dim, data)
    }
}

struct WordListAnnotator;

fn pick(text: &str, list: &[&str]) -> Vec<String> {
    text.split_whitespace()
        .map(normalize)
        .filter(|w| list.contains(&w.as_str()))
        .collect()
}

impl Annotator for WordListAnnotator {
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

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn index_of(sentences: &[String], titles: &[String]) -> DocumentIndex {
    build_index(
        sentences,
        titles,
        &[],
        &mut FirstWordEmbedder,
        &WordListAnnotator,
        &IndexOptions::default(),
    )
    .unwrap()
}

fn term_value(
    table: &ScoreTable,
    index: &DocumentIndex,
    line: usize,
    query: &QueryTensors,
    query_view: QueryView,
    line_view: LineView,
) -> f32 {
    table
        .breakdown(&index.lines()[line], query)
        .unwrap()
        .into_iter()
        .find(|t| t.term.query_view == query_view && t.term.line_view == line_view)
        .map(|t| t.value)
        .unwrap()
}

#[test]
fn matching_noun_phrase_ranks_first() {
    let sentences = strings(&["a dog ran in the park", "the cat sat on the mat"]);
    let index = index_of(&sentences, &[]);
    let query = encode("where is the cat", &mut FirstWordEmbedder, &WordListAnnotator).unwrap();

    let ranked = rank(&index, &sentences, &query, &[], 10).unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].sentence, "the cat sat on the mat");
    assert!(ranked[0].score - ranked[1].score >= 7.0);

    let table = ScoreTable::tuned();
    let tensors = QueryTensors::new(&query).unwrap();
    let cat = term_value(&table, &index, 1, &tensors, QueryView::NounChunks, LineView::NounPhrases);
    let dog = term_value(&table, &index, 0, &tensors, QueryView::NounChunks, LineView::NounPhrases);
    assert!((cat - 1.0).abs() < 1e-6);
    assert_eq!(dog, 0.0);
}

#[test]
fn cat_query_returns_cat_sentence() {
    let sentences = strings(&["The cat sat on the mat.", "A dog ran in the park."]);
    let index = index_of(&sentences, &[]);

    let top = final_results(
        "Where is the cat",
        &index,
        &sentences,
        &[],
        &mut FirstWordEmbedder,
        &WordListAnnotator,
        1,
    )
    .unwrap();
    assert_eq!(top, vec!["The cat sat on the mat.".to_string()]);
}

#[test]
fn short_sentences_are_filtered() {
    let sentences = strings(&["See Table 1.", "the cat sat on the mat"]);
    let index = index_of(&sentences, &[]);

    let top = final_results(
        "cat",
        &index,
        &sentences,
        &[],
        &mut FirstWordEmbedder,
        &WordListAnnotator,
        10,
    )
    .unwrap();
    assert_eq!(top, vec!["the cat sat on the mat".to_string()]);
}

#[test]
fn stop_word_query_has_no_content_word_terms() {
    let sentences = strings(&["the cat sat on the mat"]);
    let index = index_of(&sentences, &[]);
    let query = encode("the and of", &mut FirstWordEmbedder, &WordListAnnotator).unwrap();
    assert!(query.content_words.is_zero());

    let tensors = QueryTensors::new(&query).unwrap();
    let breakdown = ScoreTable::tuned()
        .breakdown(&index.lines()[0], &tensors)
        .unwrap();
    assert_eq!(breakdown.len(), 28);
    for term in breakdown
        .iter()
        .filter(|t| t.term.query_view == QueryView::ContentWords)
    {
        assert_eq!(term.value, 0.0);
    }
}

#[test]
fn ranking_is_stable_across_runs() {
    let sentences = strings(&[
        "the cat sat on the mat",
        "a dog ran in the park",
        "the mat was under the cat",
    ]);
    let index = index_of(&sentences, &[]);
    let query = encode("cat sat", &mut FirstWordEmbedder, &WordListAnnotator).unwrap();

    let first = rank(&index, &sentences, &query, &[], 10).unwrap();
    for _ in 0..5 {
        assert_eq!(rank(&index, &sentences, &query, &[], 10).unwrap(), first);
    }
}

#[test]
fn decoded_index_ranks_identically() {
    let sentences = strings(&[
        "The Cat Agreement",
        "the cat sat on the mat",
        "a dog ran in the park",
    ]);
    let titles = strings(&["The Cat Agreement"]);
    let index = index_of(&sentences, &titles);
    let query = encode("a dog ran", &mut FirstWordEmbedder, &WordListAnnotator).unwrap();

    let decoded = decode_index(&encode_index(&index)).unwrap();
    assert_eq!(decoded.titles(), index.titles());

    let before = rank(&index, &sentences, &query, &titles, 10).unwrap();
    let after = rank(&decoded, &sentences, &query, decoded.titles(), 10).unwrap();
    assert_eq!(before, after);
    assert_eq!(before.len(), 2);
    assert_eq!(before[0].sentence, "a dog ran in the park");
}
