use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use rayon::prelude::*;

use crate::{
    annotator::Annotator,
    config_db::{ConfigDb, StoredDocument},
    document::{IndexOptions, build_index},
    embedding::Embedder,
    error::{Error, Result},
    index_db::IndexDb,
    walker::discover,
};

/// Sentences of a text: its non-empty lines, trimmed.
pub fn read_sentences(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a titles or definitions file: one entry per non-empty line.
pub fn read_list_file(path: &Path) -> Result<Vec<String>> {
    Ok(read_sentences(&std::fs::read_to_string(path)?))
}

/// The text of a markdown heading line, or `None` for any other line.
fn heading_text(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches('#');
    if rest.len() == line.len() {
        return None;
    }
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    Some(rest.trim())
}

/// Sentences plus the headings found in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedText {
    pub sentences: Vec<String>,
    pub headings: Vec<String>,
}

/// Split a document into sentences.
///
/// For markdown, heading markers are stripped, the heading text stays a
/// sentence and is also reported as a heading; empty headings are dropped.
pub fn parse_text(text: &str, markdown: bool) -> ParsedText {
    if !markdown {
        return ParsedText {
            sentences: read_sentences(text),
            headings: Vec::new(),
        };
    }

    let mut parsed = ParsedText::default();
    for line in read_sentences(text) {
        match heading_text(&line) {
            Some("") => {}
            Some(heading) => {
                parsed.headings.push(heading.to_string());
                parsed.sentences.push(heading.to_string());
            }
            None => parsed.sentences.push(line),
        }
    }
    parsed
}

/// A document ready to be indexed.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub name: String,
    pub source: Option<PathBuf>,
    pub text: String,
    pub markdown: bool,
}

/// Collect documents from a file or directory.
///
/// A single file may be renamed with `name`; for a directory `name`
/// prefixes every document name.
pub fn inputs_from_path(
    path: &Path,
    name: Option<&str>,
) -> Result<Vec<DocumentInput>> {
    let single = path.is_file();
    let files = discover(path)?;

    files
        .par_iter()
        .map(|file| -> Result<DocumentInput> {
            let text = std::fs::read_to_string(&file.absolute_path)?;
            let discovered = file.document_name();
            let name = match name {
                Some(n) if single => n.to_string(),
                Some(prefix) => format!("{prefix}/{discovered}"),
                None => discovered,
            };
            Ok(DocumentInput {
                name,
                source: Some(file.absolute_path.clone()),
                text,
                markdown: file.is_markdown(),
            })
        })
        .collect()
}

/// Per-ingest settings.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Titles added to the document's own headings.
    pub titles: Vec<String>,
    pub definitions: Vec<String>,
    /// Rebuild a document that already exists.
    pub replace: bool,
    pub index: IndexOptions,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Index one document and store it with its metadata.
pub fn ingest_document(
    input: &DocumentInput,
    options: &IngestOptions,
    config_db: &ConfigDb,
    index_db: &IndexDb,
    embedder: &mut dyn Embedder,
    annotator: &dyn Annotator,
) -> Result<StoredDocument> {
    if !options.replace && config_db.get_document(&input.name)?.is_some() {
        return Err(Error::DocumentExists(input.name.clone()));
    }

    let parsed = parse_text(&input.text, input.markdown);
    if parsed.sentences.is_empty() {
        tracing::warn!(document = %input.name, "document has no sentences");
    }

    let mut titles = parsed.headings;
    for title in &options.titles {
        if !titles.contains(title) {
            titles.push(title.clone());
        }
    }

    let guard = index_db.begin_build(&input.name)?;
    let index = build_index(
        &parsed.sentences,
        &titles,
        &options.definitions,
        embedder,
        annotator,
        &options.index,
    )?;

    let document = StoredDocument {
        name: input.name.clone(),
        source: input
            .source
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        sentences: parsed.sentences,
        titles,
        definitions: options.definitions.clone(),
        embedder: index.embedder().to_string(),
        ingested_at: now_secs(),
    };

    guard.finish(&index)?;
    config_db.set_document(&document)?;

    tracing::info!(
        document = %document.name,
        sentences = document.sentences.len(),
        "ingested document"
    );
    Ok(document)
}

/// Remove a document and its index. Returns whether anything was removed.
pub fn remove_document(
    name: &str,
    config_db: &ConfigDb,
    index_db: &IndexDb,
) -> Result<bool> {
    let had_index = index_db.remove(name)?;
    let had_document = config_db.remove_document(name)?;
    Ok(had_index || had_document)
}
