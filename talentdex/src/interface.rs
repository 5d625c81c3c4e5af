//! talentdex public interface
//!
//! Shared result types, the error type surfaced to callers, and the
//! `TalentApi` trait implemented by `TalentStore`.

use serde::Serialize;
use thiserror::Error;

use crate::indexer::ReindexReport;
use crate::models::{CandidateRecord, IndexDocument, StoredCandidate};
use crate::query::{CompiledQuery, SearchParams};
use crate::worker::IndexingStats;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// A ranked search hit: candidate id, relevance score and the indexed source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub source: IndexDocument,
}

/// One page of hits plus the total number of matching documents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Search response handed to the request layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub total: u64,
    pub page: usize,
    pub size: usize,
    pub results: Vec<SearchHit>,
}

/// Error type for talentdex operations
#[derive(Debug, Error)]
pub enum TalentError {
    #[error("Database error: {0}")]
    Database(#[from] crate::database::DatabaseError),
    #[error("Index error: {0}")]
    Index(#[from] crate::backend::IndexError),
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Candidate not found: {0}")]
    NotFound(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<crate::query::FilterError> for TalentError {
    fn from(e: crate::query::FilterError) -> Self {
        TalentError::InvalidFilter(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The operations the request-handling layer uses.
#[async_trait::async_trait]
pub trait TalentApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Hybrid search. A request with no term, keywords or filters returns an
    /// empty page without touching the index.
    async fn search(&self, params: SearchParams) -> Result<SearchResponse, TalentError>;

    /// Validate and compile a request without executing it
    fn explain(&self, params: &SearchParams) -> Result<CompiledQuery, TalentError>;

    /// Fetch a candidate from the primary store
    fn get_candidate(&self, candidate_id: &str) -> Result<Option<StoredCandidate>, TalentError>;

    /// Background indexing counters
    fn indexing_stats(&self) -> IndexingStats;

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Create or update a candidate. The index write is dispatched in the
    /// background; its failure never fails this call.
    fn save_candidate(&self, record: CandidateRecord) -> Result<StoredCandidate, TalentError>;

    /// Store extracted resume text, derive its keywords, and re-index
    fn attach_resume(&self, candidate_id: &str, resume_text: String) -> Result<StoredCandidate, TalentError>;

    /// Delete a candidate from the primary store and its document from the index
    fn delete_candidate(&self, candidate_id: &str) -> Result<bool, TalentError>;

    /// Rebuild the index from the primary store
    async fn reindex(&self) -> Result<ReindexReport, TalentError>;
}
