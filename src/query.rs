use serde::Serialize;

use crate::{
    annotator::Annotator,
    embedding::{DEFAULT_BATCH_SIZE, Embedder, ViewMatrix, embed_groups},
    error::{Error, Result},
    text_util::content_words,
};

/// The four ways a query is decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryView {
    Full,
    NounChunks,
    VerbPhrases,
    ContentWords,
}

impl QueryView {
    pub const ALL: [QueryView; 4] = [
        Self::Full,
        Self::NounChunks,
        Self::VerbPhrases,
        Self::ContentWords,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::NounChunks => "noun_chunks",
            Self::VerbPhrases => "verb_phrases",
            Self::ContentWords => "content_words",
        }
    }
}

/// An encoded query. Built per request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub full: ViewMatrix,
    pub noun_chunks: ViewMatrix,
    pub verb_phrases: ViewMatrix,
    pub content_words: ViewMatrix,
}

impl Query {
    pub fn view(&self, view: QueryView) -> &ViewMatrix {
        match view {
            QueryView::Full => &self.full,
            QueryView::NounChunks => &self.noun_chunks,
            QueryView::VerbPhrases => &self.verb_phrases,
            QueryView::ContentWords => &self.content_words,
        }
    }

    pub fn dimension(&self) -> usize {
        self.full.dimension()
    }
}

/// Encode a query string into its four views.
///
/// The annotator is called once. Content words are the lower-cased
/// whitespace tokens that are not stop words; a query made only of stop
/// words gets the zero placeholder for that view.
pub fn encode(
    query: &str,
    embedder: &mut dyn Embedder,
    annotator: &dyn Annotator,
) -> Result<Query> {
    let annotation = annotator.annotate(query)?;
    let groups = [
        vec![query.to_string()],
        annotation.noun_phrases,
        annotation.verb_phrases,
        content_words(query),
    ];

    let [full, noun_chunks, verb_phrases, content_words]: [ViewMatrix; 4] =
        embed_groups(embedder, &groups, DEFAULT_BATCH_SIZE, "query", false)?
            .try_into()
            .map_err(|_| Error::ShapeMismatch {
                source_name: "query encoder",
                expected: "4 views".to_string(),
                actual: "a different number of views".to_string(),
            })?;

    tracing::debug!(query, "encoded query");
    Ok(Query {
        full,
        noun_chunks,
        verb_phrases,
        content_words,
    })
}
