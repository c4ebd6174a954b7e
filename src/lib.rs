//! clauseseek - find the sentences in a document that answer a query.
//!
//! Every line of a document is embedded under seven views (the whole line,
//! two clause splits, its noun phrases, verb phrases, the defined terms it
//! mentions and the document's keyphrases). A query is embedded under four
//! views, and a line's score is a weighted sum of 28 similarity terms, one
//! per query view and line view pair. Titles and very short lines never rank.
//!
//! # Quick start
//!
//! ```no_run
//! use clauseseek::{ConfigDb, DataDir, IndexDb};
//! use clauseseek::annotator::HeuristicAnnotator;
//! use clauseseek::embedding::HashingEmbedder;
//! use clauseseek::search::{self, SearchParams};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config_db = ConfigDb::open(&data_dir.config_db()).unwrap();
//! let index_db = IndexDb::open(&data_dir.indices_db()).unwrap();
//! let mut embedder = HashingEmbedder::default();
//!
//! let params = SearchParams::new("who pays for repairs");
//! let results = search::execute_search(
//!     &params,
//!     &config_db,
//!     &index_db,
//!     &mut embedder,
//!     &HeuristicAnnotator::default(),
//! )
//! .unwrap();
//! for r in &results {
//!     println!("{}:{} (score: {:.3}) {}", r.document, r.line + 1, r.score, r.sentence);
//! }
//! ```

pub mod annotator;
pub mod codec;
pub mod config_db;
pub mod data_dir;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index_db;
pub mod ingestion;
pub mod mcp;
pub mod model_manager;
pub mod query;
pub mod ranker;
pub mod scoring;
pub mod search;
pub mod splitter;
pub mod text_util;
pub mod walker;

#[cfg(test)]
mod testing;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use document::{DocumentIndex, build_index};
pub use error::{Error, Result};
pub use index_db::IndexDb;
pub use query::{Query, encode};
pub use ranker::{final_results, rank};
pub use scoring::{ScoreTable, score};
