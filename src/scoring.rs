//! The weighted view-pair similarity between one indexed line and a query.
//!
//! Every term compares one query view with one line view through the
//! similarity matrix `M = line · queryᵀ` (line vectors by query vectors) and
//! reduces it with an [`Aggregation`]. The line score is the weighted sum of
//! all terms of a [`ScoreTable`].

use candle_core::Tensor;
use serde::Serialize;

use crate::{
    document::{Line, LineView},
    error::Result,
    query::{Query, QueryView},
};

/// How a similarity matrix is reduced to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Best single pair, floored at zero.
    MaxOverAll,
    /// For every query vector its best line vector (floored at zero), averaged.
    MeanOfPerQueryMax,
    /// Mean of the whole matrix, no floor.
    MeanOverAll,
    /// For every line vector its mean over query vectors; the best of those,
    /// floored at zero.
    MaxOfPerLineMean,
}

impl Aggregation {
    /// Reduce `line · queryᵀ`. Both tensors are `[rows, dim]`.
    pub fn apply(self, line: &Tensor, query: &Tensor) -> Result<f32> {
        let sim = line.matmul(&query.t()?)?;
        let value = match self {
            Self::MaxOverAll => sim
                .flatten_all()?
                .max(0)?
                .to_scalar::<f32>()?
                .max(0.0),
            Self::MeanOfPerQueryMax => {
                sim.max(0)?.relu()?.mean(0)?.to_scalar::<f32>()?
            }
            Self::MeanOverAll => sim.mean_all()?.to_scalar::<f32>()?,
            Self::MaxOfPerLineMean => sim
                .mean(1)?
                .max(0)?
                .to_scalar::<f32>()?
                .max(0.0),
        };
        Ok(value)
    }
}

/// One cell of the score table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreTerm {
    pub query_view: QueryView,
    pub line_view: LineView,
    pub aggregation: Aggregation,
    pub weight: f32,
}

/// A term together with its unweighted value for one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TermScore {
    #[serde(flatten)]
    pub term: ScoreTerm,
    pub value: f32,
}

impl TermScore {
    pub fn weighted(&self) -> f32 {
        self.term.weight * self.value
    }
}

/// Query views loaded as tensors, built once per search.
#[derive(Debug, Clone)]
pub struct QueryTensors {
    views: [Tensor; 4],
}

impl QueryTensors {
    pub fn new(query: &Query) -> Result<Self> {
        Ok(Self {
            views: [
                query.full.to_tensor()?,
                query.noun_chunks.to_tensor()?,
                query.verb_phrases.to_tensor()?,
                query.content_words.to_tensor()?,
            ],
        })
    }

    fn view(&self, view: QueryView) -> &Tensor {
        &self.views[view as usize]
    }
}

struct LineTensors {
    views: [Tensor; 7],
}

impl LineTensors {
    fn new(line: &Line) -> Result<Self> {
        Ok(Self {
            views: [
                line.full.to_tensor()?,
                line.split_normal.to_tensor()?,
                line.split_fine.to_tensor()?,
                line.noun_phrases.to_tensor()?,
                line.verb_phrases.to_tensor()?,
                line.definition_matches.to_tensor()?,
                line.keyphrases.to_tensor()?,
            ],
        })
    }

    fn view(&self, view: LineView) -> &Tensor {
        &self.views[view as usize]
    }
}

const fn term(
    query_view: QueryView,
    line_view: LineView,
    aggregation: Aggregation,
    weight: f32,
) -> ScoreTerm {
    ScoreTerm {
        query_view,
        line_view,
        aggregation,
        weight,
    }
}

/// The tuned table: one term per (query view, line view) pair.
const TUNED_TERMS: [ScoreTerm; 28] = {
    use Aggregation::*;
    use LineView as L;
    use QueryView as Q;
    [
        term(Q::Full, L::Full, MeanOverAll, 17.0),
        term(Q::Full, L::SplitNormal, MaxOverAll, 1.0),
        term(Q::Full, L::SplitFine, MaxOverAll, 1.0),
        term(Q::Full, L::NounPhrases, MaxOverAll, 2.0),
        term(Q::Full, L::VerbPhrases, MaxOverAll, 5.0),
        term(Q::Full, L::DefinitionMatches, MaxOverAll, 1.0),
        term(Q::Full, L::Keyphrases, MaxOverAll, 6.0),
        term(Q::NounChunks, L::Full, MeanOverAll, 1.0),
        term(Q::NounChunks, L::SplitNormal, MeanOfPerQueryMax, 3.0),
        term(Q::NounChunks, L::SplitFine, MeanOfPerQueryMax, 1.0),
        term(Q::NounChunks, L::NounPhrases, MeanOfPerQueryMax, 7.0),
        term(Q::NounChunks, L::VerbPhrases, MeanOfPerQueryMax, 1.0),
        term(Q::NounChunks, L::DefinitionMatches, MaxOverAll, 1.0),
        term(Q::NounChunks, L::Keyphrases, MaxOverAll, 8.0),
        term(Q::VerbPhrases, L::Full, MeanOverAll, 1.0),
        term(Q::VerbPhrases, L::SplitNormal, MeanOfPerQueryMax, 1.0),
        term(Q::VerbPhrases, L::SplitFine, MeanOfPerQueryMax, 1.0),
        term(Q::VerbPhrases, L::NounPhrases, MeanOfPerQueryMax, 1.0),
        term(Q::VerbPhrases, L::VerbPhrases, MeanOfPerQueryMax, 6.0),
        term(Q::VerbPhrases, L::DefinitionMatches, MaxOverAll, 1.0),
        term(Q::VerbPhrases, L::Keyphrases, MaxOverAll, 4.0),
        term(Q::ContentWords, L::Full, MeanOverAll, 1.0),
        term(Q::ContentWords, L::SplitNormal, MaxOfPerLineMean, 10.0),
        term(Q::ContentWords, L::SplitFine, MaxOfPerLineMean, 1.0),
        term(Q::ContentWords, L::NounPhrases, MaxOfPerLineMean, 6.0),
        term(Q::ContentWords, L::VerbPhrases, MaxOfPerLineMean, 1.0),
        term(Q::ContentWords, L::DefinitionMatches, MaxOfPerLineMean, 1.0),
        term(Q::ContentWords, L::Keyphrases, MaxOfPerLineMean, 1.0),
    ]
};

/// A set of weighted terms summed into a line score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    terms: Vec<ScoreTerm>,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self::tuned()
    }
}

impl ScoreTable {
    /// The 28-term table used for ranking.
    pub fn tuned() -> Self {
        Self::new(TUNED_TERMS.to_vec())
    }

    pub fn new(terms: Vec<ScoreTerm>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[ScoreTerm] {
        &self.terms
    }

    /// Every term's unweighted value for `line`, in table order.
    pub fn breakdown(
        &self,
        line: &Line,
        query: &QueryTensors,
    ) -> Result<Vec<TermScore>> {
        let line = LineTensors::new(line)?;
        self.terms
            .iter()
            .map(|term| -> Result<TermScore> {
                let value = term.aggregation.apply(
                    line.view(term.line_view),
                    query.view(term.query_view),
                )?;
                Ok(TermScore { term: *term, value })
            })
            .collect()
    }

    /// Weighted sum of all terms.
    pub fn score(&self, line: &Line, query: &QueryTensors) -> Result<f32> {
        Ok(self
            .breakdown(line, query)?
            .iter()
            .map(TermScore::weighted)
            .sum())
    }
}

/// Score one line against a query with the tuned table.
pub fn score(line: &Line, query: &Query) -> Result<f32> {
    ScoreTable::tuned().score(line, &QueryTensors::new(query)?)
}
