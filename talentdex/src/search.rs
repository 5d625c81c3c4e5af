//! Query Executor
//!
//! Runs a compiled query against the backend with window pagination. An empty
//! query never reaches the backend. Backend errors propagate unchanged.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::backend::{IndexResult, SearchBackend};
use crate::interface::SearchPage;
use crate::query::CompiledQuery;

pub struct QueryExecutor {
    backend: Arc<dyn SearchBackend>,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Hits `[offset, offset + size)` ordered by score, then by the candidate's
    /// tie-break key, plus the total number of matches.
    pub fn execute(&self, query: &CompiledQuery, offset: usize, size: usize) -> IndexResult<SearchPage> {
        let CompiledQuery::Search(query) = query else {
            return Ok(SearchPage::empty());
        };

        let started = Instant::now();
        let page = self.backend.search(query, offset, size)?;
        debug!(
            offset,
            size,
            total = page.total,
            returned = page.hits.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Search executed"
        );
        Ok(page)
    }
}
