use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    annotator::Annotator,
    embedding::{DEFAULT_BATCH_SIZE, Embedder, ViewMatrix, embed_groups},
    error::{Error, Result},
    splitter::{Granularity, split},
};

/// The seven ways a sentence is decomposed for indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineView {
    Full,
    SplitNormal,
    SplitFine,
    NounPhrases,
    VerbPhrases,
    DefinitionMatches,
    Keyphrases,
}

impl LineView {
    pub const ALL: [LineView; 7] = [
        Self::Full,
        Self::SplitNormal,
        Self::SplitFine,
        Self::NounPhrases,
        Self::VerbPhrases,
        Self::DefinitionMatches,
        Self::Keyphrases,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::SplitNormal => "split_normal",
            Self::SplitFine => "split_fine",
            Self::NounPhrases => "noun_phrases",
            Self::VerbPhrases => "verb_phrases",
            Self::DefinitionMatches => "definition_matches",
            Self::Keyphrases => "keyphrases",
        }
    }

    fn position(self) -> usize {
        self as usize
    }
}

/// The indexed form of one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Zero-based position of the sentence in its document.
    pub index: usize,
    pub full: ViewMatrix,
    pub split_normal: ViewMatrix,
    pub split_fine: ViewMatrix,
    pub noun_phrases: ViewMatrix,
    pub verb_phrases: ViewMatrix,
    pub definition_matches: ViewMatrix,
    pub keyphrases: ViewMatrix,
}

impl Line {
    /// Assemble a line from views in [`LineView::ALL`] order.
    pub fn from_views(index: usize, views: [ViewMatrix; 7]) -> Self {
        let [
            full,
            split_normal,
            split_fine,
            noun_phrases,
            verb_phrases,
            definition_matches,
            keyphrases,
        ] = views;
        Self {
            index,
            full,
            split_normal,
            split_fine,
            noun_phrases,
            verb_phrases,
            definition_matches,
            keyphrases,
        }
    }

    pub fn view(&self, view: LineView) -> &ViewMatrix {
        match view {
            LineView::Full => &self.full,
            LineView::SplitNormal => &self.split_normal,
            LineView::SplitFine => &self.split_fine,
            LineView::NounPhrases => &self.noun_phrases,
            LineView::VerbPhrases => &self.verb_phrases,
            LineView::DefinitionMatches => &self.definition_matches,
            LineView::Keyphrases => &self.keyphrases,
        }
    }
}

#[derive(Deserialize)]
struct DocumentIndexRecord {
    dimension: usize,
    embedder: String,
    #[serde(default)]
    titles: Vec<String>,
    lines: Vec<Line>,
}

/// Every line of one document, embedded by one embedder.
///
/// Lines are in sentence order and `lines()[i].index == i`. All views share
/// [`DocumentIndex::dimension`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentIndexRecord")]
pub struct DocumentIndex {
    dimension: usize,
    embedder: String,
    titles: Vec<String>,
    lines: Vec<Line>,
}

impl TryFrom<DocumentIndexRecord> for DocumentIndex {
    type Error = Error;

    fn try_from(record: DocumentIndexRecord) -> Result<Self> {
        Self::new(record.dimension, record.embedder, record.titles, record.lines)
    }
}

impl DocumentIndex {
    pub fn new(
        dimension: usize,
        embedder: String,
        titles: Vec<String>,
        lines: Vec<Line>,
    ) -> Result<Self> {
        for (position, line) in lines.iter().enumerate() {
            if line.index != position {
                return Err(Error::Codec(format!(
                    "line at position {position} claims index {}",
                    line.index
                )));
            }
            for view in LineView::ALL {
                let width = line.view(view).dimension();
                if width != dimension {
                    return Err(Error::ShapeMismatch {
                        source_name: "document index",
                        expected: format!("dimension {dimension}"),
                        actual: format!(
                            "dimension {width} in {} of line {position}",
                            view.name()
                        ),
                    });
                }
            }
        }

        Ok(Self {
            dimension,
            embedder,
            titles,
            lines,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Fingerprint of the embedder that built this index.
    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Tuning for [`build_index`].
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Texts per embedder call.
    pub batch_size: usize,
    /// Draw a progress bar per view on stderr.
    pub show_progress: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }
}

/// The texts of every view of one sentence, in [`LineView::ALL`] order.
type ViewTexts = [Vec<String>; 7];

/// Items of `candidates` that occur verbatim in `sentence`, in candidate order.
fn occurring_in(sentence: &str, candidates: &[String]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| !c.is_empty() && sentence.contains(c.as_str()))
        .cloned()
        .collect()
}

fn view_texts(
    sentence: &str,
    definitions: &[String],
    keyphrases: &[String],
    annotator: &dyn Annotator,
) -> Result<ViewTexts> {
    let annotation = annotator.annotate(sentence)?;
    Ok([
        vec![sentence.to_string()],
        split(sentence, Granularity::Normal),
        split(sentence, Granularity::Fine),
        annotation.noun_phrases,
        annotation.verb_phrases,
        occurring_in(sentence, definitions),
        occurring_in(sentence, keyphrases),
    ])
}

/// Decompose and embed every sentence of a document.
///
/// Keyphrases are extracted once from the whole document (sentences joined
/// by newlines) before any sentence is matched against them. Each view kind
/// is then embedded in a single batched pass over all sentences.
///
/// `titles` are kept on the index for the eligibility filter; they are not
/// embedded.
pub fn build_index(
    sentences: &[String],
    titles: &[String],
    definitions: &[String],
    embedder: &mut dyn Embedder,
    annotator: &dyn Annotator,
    options: &IndexOptions,
) -> Result<DocumentIndex> {
    let dimension = embedder.dimension();
    tracing::info!(sentences = sentences.len(), "indexing document");

    let keyphrases = annotator.keyphrases(&sentences.join("\n"))?;
    tracing::debug!(keyphrases = keyphrases.len(), "extracted keyphrases");

    let texts: Vec<ViewTexts> = sentences
        .par_iter()
        .map(|s| view_texts(s, definitions, &keyphrases, annotator))
        .collect::<Result<_>>()?;

    let mut columns = Vec::with_capacity(LineView::ALL.len());
    for view in LineView::ALL {
        let groups: Vec<Vec<String>> = texts
            .iter()
            .map(|t| t[view.position()].clone())
            .collect();
        let matrices = embed_groups(
            embedder,
            &groups,
            options.batch_size,
            view.name(),
            options.show_progress,
        )?;
        columns.push(matrices.into_iter());
    }

    let mut lines = Vec::with_capacity(sentences.len());
    'assemble: for index in 0.. {
        let mut views = Vec::with_capacity(LineView::ALL.len());
        for column in columns.iter_mut() {
            match column.next() {
                Some(matrix) => views.push(matrix),
                None if views.is_empty() => break 'assemble,
                None => {
                    return Err(Error::IndexCountMismatch {
                        lines: index,
                        sentences: sentences.len(),
                    });
                }
            }
        }
        let views: [ViewMatrix; 7] =
            views.try_into().map_err(|_| Error::IndexCountMismatch {
                lines: index,
                sentences: sentences.len(),
            })?;
        lines.push(Line::from_views(index, views));
    }

    if lines.len() != sentences.len() {
        return Err(Error::IndexCountMismatch {
            lines: lines.len(),
            sentences: sentences.len(),
        });
    }

    DocumentIndex::new(
        dimension,
        embedder.fingerprint(),
        titles.to_vec(),
        lines,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::HashingEmbedder,
        testing::{KeywordAnnotator, VOCAB, VocabEmbedder, strings},
    };

    fn one_hot(word: &str) -> Vec<f32> {
        VOCAB
            .iter()
            .map(|v| if *v == word { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn one_line_per_sentence_in_order() {
        let sentences = strings(&["The cat sat.", "A dog ran.", "Nothing here."]);
        let mut embedder = VocabEmbedder::default();
        let index = build_index(
            &sentences,
            &[],
            &[],
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), VOCAB.len());
        assert_eq!(index.embedder(), "vocab");
        for (i, line) in index.lines().iter().enumerate() {
            assert_eq!(line.index, i);
            assert_eq!(line.full.rows(), 1);
        }
    }

    #[test]
    fn views_hold_the_extracted_phrases() {
        let sentences = strings(&["cat sat on mat"]);
        let mut embedder = VocabEmbedder::default();
        let index = build_index(
            &sentences,
            &[],
            &strings(&["mat"]),
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap();
        let line = &index.lines()[0];

        assert_eq!(line.full.row(0), one_hot("cat").as_slice());
        assert_eq!(line.noun_phrases.rows(), 2);
        assert_eq!(line.noun_phrases.row(1), one_hot("mat").as_slice());
        assert_eq!(line.verb_phrases.row(0), one_hot("sat").as_slice());
        assert_eq!(line.definition_matches.row(0), one_hot("mat").as_slice());
        assert_eq!(line.keyphrases.rows(), 2);
    }

    #[test]
    fn empty_extractions_become_zero_vectors() {
        let sentences = strings(&["nothing to see"]);
        let mut embedder = VocabEmbedder::default();
        let index = build_index(
            &sentences,
            &[],
            &[],
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap();
        let line = &index.lines()[0];

        for view in [
            LineView::NounPhrases,
            LineView::VerbPhrases,
            LineView::DefinitionMatches,
            LineView::Keyphrases,
        ] {
            assert_eq!(line.view(view).rows(), 1, "{}", view.name());
            assert!(line.view(view).is_zero(), "{}", view.name());
        }
    }

    #[test]
    fn keyphrase_matching_is_case_sensitive() {
        let sentences = strings(&["the cat", "The Cat"]);
        let mut embedder = VocabEmbedder::default();
        let index = build_index(
            &sentences,
            &[],
            &[],
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap();

        assert!(!index.lines()[0].keyphrases.is_zero());
        assert!(index.lines()[1].keyphrases.is_zero());
    }

    #[test]
    fn each_view_is_one_batched_pass() {
        let sentences = strings(&["cat sat", "dog ran", "a mat", "the park"]);
        let mut embedder = VocabEmbedder::default();
        build_index(
            &sentences,
            &[],
            &[],
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap();

        // full, split_normal, split_fine, noun_phrases, verb_phrases,
        // keyphrases; definition_matches is empty for every sentence.
        assert_eq!(embedder.calls, 6);
    }

    #[test]
    fn small_batches_give_identical_index() {
        let sentences =
            strings(&["The tenant shall pay rent.", "Rent is due monthly."]);
        let annotator = crate::annotator::HeuristicAnnotator::default();
        let build = |batch_size| {
            let mut embedder = HashingEmbedder::new(64);
            build_index(
                &sentences,
                &[],
                &[],
                &mut embedder,
                &annotator,
                &IndexOptions {
                    batch_size,
                    show_progress: false,
                },
            )
            .unwrap()
        };

        assert_eq!(build(1), build(64));
    }

    #[test]
    fn empty_document_has_no_lines() {
        let mut embedder = VocabEmbedder::default();
        let index = build_index(
            &[],
            &[],
            &[],
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn json_round_trip_preserves_index() {
        let sentences = strings(&["cat sat", "dog ran in park"]);
        let mut embedder = VocabEmbedder::default();
        let index = build_index(
            &sentences,
            &strings(&["Heading"]),
            &[],
            &mut embedder,
            &KeywordAnnotator,
            &IndexOptions::default(),
        )
        .unwrap();

        let json = serde_json::to_string(&index).unwrap();
        let back: DocumentIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
        assert_eq!(back.titles(), &["Heading".to_string()]);
    }

    #[test]
    fn mismatched_dimension_is_rejected() {
        let line = Line::from_views(
            0,
            std::array::from_fn(|_| ViewMatrix::zeros(3)),
        );
        let err =
            DocumentIndex::new(4, "x".to_string(), vec![], vec![line]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn out_of_order_lines_are_rejected() {
        let line = Line::from_views(
            1,
            std::array::from_fn(|_| ViewMatrix::zeros(3)),
        );
        assert!(DocumentIndex::new(3, "x".to_string(), vec![], vec![line]).is_err());
    }
}
