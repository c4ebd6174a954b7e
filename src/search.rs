use std::time::Instant;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;

use crate::{
    annotator::Annotator,
    config_db::{ConfigDb, StoredDocument},
    document::DocumentIndex,
    embedding::Embedder,
    error::{Error, Result},
    index_db::IndexDb,
    query::encode,
    ranker::{RankedSentence, score_eligible},
    scoring::{QueryTensors, ScoreTable, TermScore},
    text_util::is_definition,
};

/// What to search for and where.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    /// Glob patterns over document names; empty means every document.
    pub documents: Vec<String>,
    pub count: usize,
    pub min_score: f32,
    /// Attach the per-term breakdown to every hit.
    pub explain: bool,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            documents: Vec::new(),
            count: 10,
            min_score: f32::NEG_INFINITY,
            explain: false,
        }
    }
}

/// One ranked sentence from one document.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub score: f32,
    pub document: String,
    /// Zero-based line within the document.
    pub line: usize,
    pub sentence: String,
    /// The sentence looks like it defines one of the document's terms.
    pub definition: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<Vec<TermScore>>,
}

fn glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            Error::Config(format!("invalid glob pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob patterns: {e}")))
}

/// Stored documents whose names match any of `patterns`.
pub fn select_documents(
    config_db: &ConfigDb,
    patterns: &[String],
) -> Result<Vec<StoredDocument>> {
    let documents = config_db.list_documents()?;
    if patterns.is_empty() {
        return Ok(documents);
    }

    let set = glob_set(patterns)?;
    let selected: Vec<StoredDocument> = documents
        .into_iter()
        .filter(|d| set.is_match(&d.name))
        .collect();

    if selected.is_empty() {
        return Err(Error::NotFound {
            kind: "document",
            name: patterns.join(", "),
        });
    }
    Ok(selected)
}

fn load_checked(
    index_db: &IndexDb,
    document: &StoredDocument,
    fingerprint: &str,
) -> Result<DocumentIndex> {
    let index = index_db.load(&document.name)?.ok_or_else(|| Error::NotFound {
        kind: "index",
        name: document.name.clone(),
    })?;

    if index.embedder() != fingerprint {
        return Err(Error::EmbedderMismatch {
            document: document.name.clone(),
            indexed: index.embedder().to_string(),
            active: fingerprint.to_string(),
        });
    }
    Ok(index)
}

/// Rank sentences across the selected documents.
///
/// The query is encoded once. Hits from all documents are merged in
/// document order and stably sorted by score, then filtered by
/// `min_score` and cut to `count`.
pub fn execute_search(
    params: &SearchParams,
    config_db: &ConfigDb,
    index_db: &IndexDb,
    embedder: &mut dyn Embedder,
    annotator: &dyn Annotator,
) -> Result<Vec<SearchHit>> {
    let start = Instant::now();
    let documents = select_documents(config_db, &params.documents)?;
    let fingerprint = embedder.fingerprint();

    let indices = documents
        .iter()
        .map(|d| load_checked(index_db, d, &fingerprint))
        .collect::<Result<Vec<_>>>()?;

    let query = encode(&params.query, embedder, annotator)?;
    let table = ScoreTable::tuned();

    let mut hits: Vec<(usize, RankedSentence)> = Vec::new();
    for (position, (document, index)) in
        documents.iter().zip(&indices).enumerate()
    {
        let scored = score_eligible(
            &table,
            index,
            &document.sentences,
            &query,
            index.titles(),
        )?;
        hits.extend(scored.into_iter().map(|r| (position, r)));
    }

    hits.sort_by(|a, b| {
        b.1.score
            .partial_cmp(&a.1.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let tensors = if params.explain {
        Some(QueryTensors::new(&query)?)
    } else {
        None
    };

    let results = hits
        .into_iter()
        .filter(|(_, r)| r.score >= params.min_score)
        .take(params.count)
        .enumerate()
        .map(|(i, (position, r))| -> Result<SearchHit> {
            let document = &documents[position];
            let terms = match &tensors {
                Some(tensors) => Some(
                    table.breakdown(&indices[position].lines()[r.line], tensors)?,
                ),
                None => None,
            };
            Ok(SearchHit {
                rank: i + 1,
                score: r.score,
                document: document.name.clone(),
                line: r.line,
                definition: is_definition(&r.sentence, &document.definitions),
                sentence: r.sentence,
                terms,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        documents = documents.len(),
        results = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "search finished"
    );
    Ok(results)
}

/// A line of a document together with its neighbours.
#[derive(Debug, Clone, Serialize)]
pub struct ContextWindow {
    pub document: String,
    /// Zero-based line the window is centred on.
    pub line: usize,
    /// Zero-based number of the first line in `lines`.
    pub start: usize,
    pub lines: Vec<String>,
}

/// Lines `line - radius ..= line + radius` of a stored document, clamped to
/// the document.
pub fn context_window(
    config_db: &ConfigDb,
    document: &str,
    line: usize,
    radius: usize,
) -> Result<ContextWindow> {
    let stored =
        config_db
            .get_document(document)?
            .ok_or_else(|| Error::NotFound {
                kind: "document",
                name: document.to_string(),
            })?;

    if line >= stored.sentences.len() {
        return Err(Error::NotFound {
            kind: "line",
            name: format!("{document}:{}", line + 1),
        });
    }

    let start = line.saturating_sub(radius);
    let end = line
        .saturating_add(radius)
        .saturating_add(1)
        .min(stored.sentences.len());
    Ok(ContextWindow {
        document: document.to_string(),
        line,
        start,
        lines: stored.sentences[start..end].to_vec(),
    })
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &[SearchHit]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for r in results {
        let marker = if r.definition { " (definition)" } else { "" };
        println!(
            "{:>3}. [{:.3}] {}:{}{marker}",
            r.rank,
            r.score,
            r.document,
            r.line + 1
        );
        println!("     {}", r.sentence);

        if let Some(terms) = &r.terms {
            for t in terms.iter().filter(|t| t.value != 0.0) {
                println!(
                    "       {:<13} x {:<18} {:>7.3} x {:>2} = {:.3}",
                    t.term.query_view.name(),
                    t.term.line_view.name(),
                    t.value,
                    t.term.weight,
                    t.weighted()
                );
            }
        }
    }
    println!("\n{} result(s)", results.len());
}

/// Format results as JSON output.
pub fn format_json(results: &[SearchHit], query: &str) -> Result<()> {
    let out = serde_json::json!({
        "query": query,
        "result_count": results.len(),
        "results": results,
    });
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
