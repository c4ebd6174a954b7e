use rayon::prelude::*;
use serde::Serialize;

use crate::{
    annotator::Annotator,
    document::DocumentIndex,
    embedding::Embedder,
    error::{Error, Result},
    query::{Query, encode},
    scoring::{QueryTensors, ScoreTable},
    text_util::is_eligible,
};

/// A sentence that survived filtering, with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSentence {
    /// Zero-based line number within the document.
    pub line: usize,
    pub sentence: String,
    pub score: f32,
}

/// Rank the sentences of one document against a query with the tuned table.
pub fn rank(
    index: &DocumentIndex,
    sentences: &[String],
    query: &Query,
    titles: &[String],
    top_n: usize,
) -> Result<Vec<RankedSentence>> {
    rank_with(&ScoreTable::tuned(), index, sentences, query, titles, top_n)
}

/// Rank with an explicit score table.
///
/// Titles and sentences of four tokens or fewer are dropped, the rest are
/// scored in parallel and stably sorted by descending score, so equal scores
/// keep document order. At most `top_n` results are returned.
pub fn rank_with(
    table: &ScoreTable,
    index: &DocumentIndex,
    sentences: &[String],
    query: &Query,
    titles: &[String],
    top_n: usize,
) -> Result<Vec<RankedSentence>> {
    let mut ranked = score_eligible(table, index, sentences, query, titles)?;

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_n);

    Ok(ranked)
}

/// Score every eligible sentence, in document order.
pub fn score_eligible(
    table: &ScoreTable,
    index: &DocumentIndex,
    sentences: &[String],
    query: &Query,
    titles: &[String],
) -> Result<Vec<RankedSentence>> {
    if index.len() != sentences.len() {
        return Err(Error::IndexCountMismatch {
            lines: index.len(),
            sentences: sentences.len(),
        });
    }

    let query = QueryTensors::new(query)?;
    index
        .lines()
        .par_iter()
        .zip(sentences.par_iter())
        .filter(|(_, sentence)| is_eligible(sentence, titles))
        .map(|(line, sentence)| -> Result<RankedSentence> {
            Ok(RankedSentence {
                line: line.index,
                sentence: sentence.clone(),
                score: table.score(line, &query)?,
            })
        })
        .collect()
}

/// Encode `query`, rank, and return just the sentence texts.
pub fn final_results(
    query: &str,
    index: &DocumentIndex,
    sentences: &[String],
    titles: &[String],
    embedder: &mut dyn Embedder,
    annotator: &dyn Annotator,
    top_n: usize,
) -> Result<Vec<String>> {
    let query = encode(query, embedder, annotator)?;
    Ok(rank(index, sentences, &query, titles, top_n)?
        .into_iter()
        .map(|r| r.sentence)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        document::{IndexOptions, build_index},
        testing::{KeywordAnnotator, VocabEmbedder, strings},
    };

    fn index_of(sentences: &[String], titles: &[String]) -> DocumentIndex {
        let mut embedder = VocabEmbedder::default();
        build_index(
            sentences,
            titles,
            &[],
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap()
    }

    fn query(text: &str) -> Query {
        encode(text, &mut VocabEmbedder::default(), &KeywordAnnotator).unwrap()
    }

    #[test]
    fn short_sentences_never_rank() {
        let sentences = strings(&["See Table 1.", "the cat sat on the mat"]);
        let index = index_of(&sentences, &[]);
        let ranked = rank(&index, &sentences, &query("cat"), &[], 10).unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].line, 1);
    }

    #[test]
    fn titles_never_rank() {
        let sentences = strings(&[
            "The Cat and the Mat Agreement",
            "the cat sat on the mat today",
        ]);
        let titles = strings(&["The Cat and the Mat Agreement"]);
        let index = index_of(&sentences, &titles);
        let ranked = rank(&index, &sentences, &query("cat"), &titles, 10).unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].sentence, sentences[1]);
    }

    #[test]
    fn ties_keep_document_order() {
        let sentences = strings(&[
            "nothing to see here at all",
            "also nothing to see here",
            "still nothing to see here",
        ]);
        let index = index_of(&sentences, &[]);
        let ranked = rank(&index, &sentences, &query("the and of"), &[], 10).unwrap();

        let lines: Vec<usize> = ranked.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![0, 1, 2]);
    }

    #[test]
    fn results_are_sorted_and_truncated() {
        let sentences = strings(&[
            "nothing to see here at all",
            "cat sat on the mat today",
            "dog ran in the park today",
        ]);
        let index = index_of(&sentences, &[]);
        let ranked = rank(&index, &sentences, &query("cat sat"), &[], 2).unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].line, 1);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn top_n_zero_is_empty() {
        let sentences = strings(&["cat sat on the mat today"]);
        let index = index_of(&sentences, &[]);
        assert!(rank(&index, &sentences, &query("cat"), &[], 0).unwrap().is_empty());
    }

    #[test]
    fn sentence_count_must_match_index() {
        let sentences = strings(&["cat sat on the mat today"]);
        let index = index_of(&sentences, &[]);
        let err = rank(&index, &[], &query("cat"), &[], 5).unwrap_err();
        assert!(matches!(err, Error::IndexCountMismatch { .. }));
    }

    #[test]
    fn final_results_returns_texts() {
        let sentences = strings(&[
            "dog ran in the park today",
            "cat sat on the mat today",
        ]);
        let index = index_of(&sentences, &[]);
        let mut embedder = VocabEmbedder::default();
        let top = final_results(
            "cat sat",
            &index,
            &sentences,
            &[],
            &mut embedder,
            &KeywordAnnotator,
            1,
        )
        .unwrap();
        assert_eq!(top, vec!["cat sat on the mat today".to_string()]);
    }
}
