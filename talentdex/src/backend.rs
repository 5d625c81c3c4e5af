//! Search backend abstraction
//!
//! One interface for every index store: ensure the index, write documents,
//! delete them, run a compiled query. The query builder and the normalizer are
//! backend-neutral and exist once; a backend only translates and executes.

use crate::interface::SearchPage;
use crate::models::IndexDocument;
use crate::query::BoolQuery;
use thiserror::Error;

/// Error type for index operations
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),
    #[error("Directory error: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),
    #[error("Index read error: {0}")]
    OpenRead(#[from] tantivy::directory::error::OpenReadError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index '{index}' exists with an incompatible schema: missing field {field}")]
    SchemaMismatch { index: String, field: String },
    #[error("Index '{0}' has not been ensured yet")]
    NotReady(String),
    #[error("Unsupported clause for field {field}: {reason}")]
    UnsupportedClause { field: String, reason: String },
    #[error("Corrupt stored document {id}: {source}")]
    CorruptDocument {
        id: String,
        source: serde_json::Error,
    },
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Outcome of ensuring the index exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Created,
    AlreadyExists,
}

/// A search store holding one document per candidate id.
///
/// Writes are full-document replacements keyed by candidate id and visible to
/// the next search once they return.
pub trait SearchBackend: Send + Sync {
    /// Create the index with its mapping and analyzers if absent. Idempotent.
    fn ensure_index(&self) -> IndexResult<IndexStatus>;

    /// Whether `ensure_index` has completed successfully
    fn is_ready(&self) -> bool;

    /// Replace (or create) the document for `document.candidate_id`
    fn index_document(&self, document: &IndexDocument) -> IndexResult<()>;

    /// Replace a batch of documents. Backends may make the whole batch visible at once.
    fn index_documents(&self, documents: &[IndexDocument]) -> IndexResult<()> {
        documents.iter().try_for_each(|doc| self.index_document(doc))
    }

    /// Remove the document for a candidate id; absent ids are not an error
    fn delete_document(&self, candidate_id: &str) -> IndexResult<()>;

    /// Run a compiled query, returning the window `[offset, offset + limit)` and the total hit count
    fn search(&self, query: &BoolQuery, offset: usize, limit: usize) -> IndexResult<SearchPage>;

    /// Number of documents in the index
    fn count(&self) -> IndexResult<u64>;
}
