use std::sync::{Arc, Mutex};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    annotator::HeuristicAnnotator,
    config_db::ConfigDb,
    embedding::Embedder,
    error,
    index_db::IndexDb,
    search::{self, SearchHit},
    text_util::add_line_numbers,
};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_CONTEXT_RADIUS: usize = 2;

struct ClauseseekState {
    config_db: ConfigDb,
    index_db: IndexDb,
    embedder: Mutex<Box<dyn Embedder>>,
    annotator: HeuristicAnnotator,
}

#[derive(Clone)]
pub struct ClauseseekMcpServer {
    state: Arc<ClauseseekState>,
    tool_router: ToolRouter<Self>,
}

impl ClauseseekMcpServer {
    fn new(state: ClauseseekState) -> Self {
        Self {
            state: Arc::new(state),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl ClauseseekMcpServer {
    /// Rank sentences of the ingested documents against a query.
    #[tool(
        name = "clauseseek_search",
        description = "Find the sentences that best answer a query. Supports document name globs, score thresholds and a per-term score breakdown."
    )]
    pub async fn clauseseek_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let query = params.query.clone();

        let mut search_params = search::SearchParams::new(params.query);
        search_params.documents = params.documents.unwrap_or_default();
        search_params.count = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        search_params.explain = params.explain.unwrap_or(false);
        if let Some(min_score) = params.min_score {
            search_params.min_score = min_score;
        }

        let mut embedder = self.state.embedder.lock().map_err(|_| {
            rmcp::ErrorData::internal_error("embedder lock poisoned", None)
        })?;

        let results = search::execute_search(
            &search_params,
            &self.state.config_db,
            &self.state.index_db,
            embedder.as_mut(),
            &self.state.annotator,
        )
        .map_err(|e| mcp_error("search failed", e))?;

        let summary = format_search_summary(&results, &query);
        let structured = serde_json::to_value(SearchResponse {
            query,
            result_count: results.len(),
            results,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        Ok(CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }

    /// Show a document line with the lines around it.
    #[tool(
        name = "clauseseek_context",
        description = "Show a line of a document with its neighbouring lines. Lines are 1-based, as returned by clauseseek_search."
    )]
    pub async fn clauseseek_context(
        &self,
        params: Parameters<ContextParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let Some(line) = params.line.checked_sub(1) else {
            return Err(rmcp::ErrorData::invalid_params(
                "line numbers start at 1",
                None,
            ));
        };

        let window = search::context_window(
            &self.state.config_db,
            &params.document,
            line,
            params.radius.unwrap_or(DEFAULT_CONTEXT_RADIUS),
        )
        .map_err(|e| mcp_error("context lookup failed", e))?;

        let text = add_line_numbers(&window.lines.join("\n"), window.start + 1);
        let structured = serde_json::to_value(&window)
            .map_err(|e| mcp_error("failed to serialize context", e))?;

        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }

    /// List ingested documents.
    #[tool(
        name = "clauseseek_documents",
        description = "List the ingested documents with their sentence counts."
    )]
    pub async fn clauseseek_documents(
        &self,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let documents = self
            .state
            .config_db
            .list_documents()
            .map_err(|e| mcp_error("failed to list documents", e))?;

        let items: Vec<DocumentItem> = documents
            .into_iter()
            .map(|d| DocumentItem {
                sentences: d.sentences.len(),
                titles: d.titles,
                definitions: d.definitions,
                name: d.name,
            })
            .collect();

        let summary = if items.is_empty() {
            "No documents ingested.".to_string()
        } else {
            items
                .iter()
                .map(|d| format!("{} ({} sentences)", d.name, d.sentences))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let structured = json!({
            "documentCount": items.len(),
            "documents": items,
        });

        Ok(CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for ClauseseekMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "clauseseek".to_string(),
                title: Some("clauseseek MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use clauseseek_search to find the sentences that answer a question, then clauseseek_context to read around a hit."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Search query string.
    pub query: String,
    /// Glob patterns over document names (default: all documents).
    pub documents: Option<Vec<String>>,
    /// Maximum number of results (default: 10).
    pub limit: Option<usize>,
    /// Minimum score threshold.
    pub min_score: Option<f32>,
    /// Include the per-term score breakdown.
    pub explain: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContextParams {
    /// Document name.
    pub document: String,
    /// 1-based line number.
    pub line: usize,
    /// Lines on each side (default: 2).
    pub radius: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    result_count: usize,
    results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
struct DocumentItem {
    name: String,
    sentences: usize,
    titles: Vec<String>,
    definitions: Vec<String>,
}

fn format_search_summary(results: &[SearchHit], query: &str) -> String {
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\":",
        results.len(),
        suffix
    ));

    for hit in results {
        lines.push(format!(
            "{:.3} {}:{} {}",
            hit.score,
            hit.document,
            hit.line + 1,
            hit.sentence
        ));
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

/// Serve the tools over stdio until the client disconnects.
pub fn run_mcp(
    config_db: ConfigDb,
    index_db: IndexDb,
    embedder: Box<dyn Embedder>,
) -> error::Result<()> {
    let state = ClauseseekState {
        config_db,
        index_db,
        embedder: Mutex::new(embedder),
        annotator: HeuristicAnnotator::default(),
    };

    let server = ClauseseekMcpServer::new(state);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
