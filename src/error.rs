pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("tensor computation error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// An embedding provider or annotator could not be brought up.
    #[error("capability unavailable: {0}")]
    Capability(String),

    /// A capability answered with a result whose shape differs from the request.
    #[error("{source_name} returned {actual} for a request of {expected}")]
    ShapeMismatch {
        source_name: &'static str,
        expected: String,
        actual: String,
    },

    #[error("index has {lines} lines for {sentences} sentences")]
    IndexCountMismatch { lines: usize, sentences: usize },

    #[error(
        "document '{document}' was indexed with {indexed}, but the active embedder is {active}"
    )]
    EmbedderMismatch {
        document: String,
        indexed: String,
        active: String,
    },

    #[error("corrupt index record: {0}")]
    Codec(String),

    #[error("an index build for '{0}' is already in progress")]
    BuildInProgress(String),

    #[error("document '{0}' already exists (use --replace to rebuild it)")]
    DocumentExists(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(std::path::PathBuf),
}
