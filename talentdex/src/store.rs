//! TalentStore - the service handle the request layer talks to
//!
//! Owns the SQLite primary store, the search backend, the query builder and
//! executor, and the background index worker. Nothing here is global: every
//! component is constructed in `open` and shared through this handle.
//!
//! Write path: the primary store is written synchronously, the index write is
//! dispatched to the worker and never awaited. Read path: filters are validated
//! and compiled on the caller's task, the search itself runs on the blocking pool.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::backend::SearchBackend;
use crate::config::Config;
use crate::database::Database;
use crate::indexer::{Indexer, ReindexReport};
use crate::interface::{SearchResponse, TalentApi, TalentError};
use crate::keywords::extract_keywords;
use crate::models::{CandidateRecord, ListField, StoredCandidate};
use crate::normalizer::normalize;
use crate::query::{CompiledQuery, QueryBuilder, SearchParams};
use crate::search::QueryExecutor;
use crate::tantivy_backend::TantivyBackend;
use crate::worker::{IndexWorker, IndexingStats};

/// Runtime for background work when the store is used outside any tokio runtime.
/// Shared across all stores and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name("talentdex-bg")
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Current runtime if there is one, otherwise the shared fallback
fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// Candidate store with SQLite as the system of record and a derived search index
pub struct TalentStore {
    config: Config,
    db: Arc<Database>,
    backend: Arc<dyn SearchBackend>,
    indexer: Arc<Indexer>,
    executor: Arc<QueryExecutor>,
    builder: QueryBuilder,
    worker: IndexWorker,
}

impl TalentStore {
    /// Open the on-disk store described by `config`.
    ///
    /// Returns once the index exists and, if it drifted from the primary
    /// store, has been rebuilt. Index creation errors are fatal.
    pub fn open(config: &Config) -> Result<Self, TalentError> {
        config.validate()?;
        let db = Database::open(config.database_path())?;
        let backend = TantivyBackend::on_disk(config.index_path(), &config.index);
        Self::with_backend(config, db, Arc::new(backend))
    }

    /// Store with an in-memory database and index
    pub fn open_in_memory(config: &Config) -> Result<Self, TalentError> {
        config.validate()?;
        let db = Database::open_in_memory()?;
        let backend = TantivyBackend::in_memory(&config.index);
        Self::with_backend(config, db, Arc::new(backend))
    }

    /// Assemble a store around any search backend
    pub fn with_backend(config: &Config, db: Database, backend: Arc<dyn SearchBackend>) -> Result<Self, TalentError> {
        let status = backend.ensure_index()?;
        info!(index = %config.index.name, ?status, "Search index ensured");

        let indexer = Arc::new(Indexer::new(Arc::clone(&backend)));
        let worker = IndexWorker::spawn(Arc::clone(&indexer), config.worker.queue_capacity, &runtime_handle());

        let store = Self {
            config: config.clone(),
            db: Arc::new(db),
            executor: Arc::new(QueryExecutor::new(Arc::clone(&backend))),
            builder: QueryBuilder::new(config.weights.clone(), config.fuzzy.clone()),
            backend,
            indexer,
            worker,
        };

        if config.index.reindex_when_drifted {
            store.rebuild_index_if_needed()?;
        }
        Ok(store)
    }

    /// Whether the index is ready for search traffic
    pub fn is_ready(&self) -> bool {
        self.backend.is_ready()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Documents currently in the index
    pub fn index_count(&self) -> Result<u64, TalentError> {
        Ok(self.backend.count()?)
    }

    /// Candidates in the primary store
    pub fn candidate_count(&self) -> Result<u64, TalentError> {
        Ok(self.db.count_candidates()?)
    }

    /// Rebuild the index when its document count disagrees with the primary store
    fn rebuild_index_if_needed(&self) -> Result<Option<ReindexReport>, TalentError> {
        let db_count = self.db.count_candidates()?;
        let index_count = self.backend.count()?;
        if db_count == index_count {
            return Ok(None);
        }

        warn!(db_count, index_count, "Search index drifted from primary store, reindexing");
        let report = self.indexer.reindex_all(&self.db, self.config.reindex.page_size)?;
        Ok(Some(report))
    }

    /// Wait until every index job dispatched so far has been applied
    pub async fn flush_indexing(&self) {
        self.worker.flush().await;
    }

    /// Finish queued index jobs and stop the worker
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}

#[async_trait::async_trait]
impl TalentApi for TalentStore {
    async fn search(&self, params: SearchParams) -> Result<SearchResponse, TalentError> {
        let (filters, page) = params.validate(&self.config.search)?;
        let compiled = self.builder.build(&filters);

        let executor = Arc::clone(&self.executor);
        let offset = page
            .offset()
            .ok_or_else(|| TalentError::InvalidFilter("page out of range".into()))?;
        let size = page.size;
        let handle = runtime_handle().spawn_blocking(move || executor.execute(&compiled, offset, size));

        match handle.await {
            Ok(Ok(found)) => Ok(SearchResponse {
                total: found.total,
                page: page.page,
                size: page.size,
                results: found.hits,
            }),
            Ok(Err(e)) => Err(e.into()),
            // JoinError: the task panicked or the runtime is shutting down
            Err(_) => Err(TalentError::Cancelled),
        }
    }

    fn explain(&self, params: &SearchParams) -> Result<CompiledQuery, TalentError> {
        let (filters, _) = params.validate(&self.config.search)?;
        Ok(self.builder.build(&filters))
    }

    fn get_candidate(&self, candidate_id: &str) -> Result<Option<StoredCandidate>, TalentError> {
        Ok(self.db.get_candidate(candidate_id)?)
    }

    fn indexing_stats(&self) -> IndexingStats {
        self.worker.stats()
    }

    fn save_candidate(&self, record: CandidateRecord) -> Result<StoredCandidate, TalentError> {
        if record.id.trim().is_empty() {
            return Err(TalentError::InvalidInput("candidate id must not be empty".into()));
        }
        let stored = self.db.upsert_candidate(&record)?;
        self.worker.dispatch_upsert(normalize(&stored.record));
        Ok(stored)
    }

    fn attach_resume(&self, candidate_id: &str, resume_text: String) -> Result<StoredCandidate, TalentError> {
        let mut record = self
            .db
            .get_candidate(candidate_id)?
            .ok_or_else(|| TalentError::NotFound(candidate_id.to_string()))?
            .record;
        record.resume_keywords = Some(ListField::many(extract_keywords(&resume_text)));
        record.resume_text = Some(resume_text);
        self.save_candidate(record)
    }

    fn delete_candidate(&self, candidate_id: &str) -> Result<bool, TalentError> {
        let removed = self.db.delete_candidate(candidate_id)?;
        // Also clears an index document left behind without a primary row
        self.worker.dispatch_delete(candidate_id.to_string());
        Ok(removed)
    }

    async fn reindex(&self) -> Result<ReindexReport, TalentError> {
        let indexer = Arc::clone(&self.indexer);
        let db = Arc::clone(&self.db);
        let page_size = self.config.reindex.page_size;
        match runtime_handle()
            .spawn_blocking(move || indexer.reindex_all(&db, page_size))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(TalentError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scalar;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn store() -> TalentStore {
        TalentStore::open_in_memory(&Config::default()).unwrap()
    }

    fn candidate(id: &str, name: &str) -> CandidateRecord {
        let mut record = CandidateRecord::new(id);
        record.name = Some(name.to_string());
        record
    }

    fn term(q: &str) -> SearchParams {
        SearchParams {
            q: Some(q.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_store_is_ready_after_open() {
        let store = store();
        assert!(store.is_ready());
        assert_eq!(store.index_count().unwrap(), 0);
    }

    #[test]
    fn test_save_then_search() {
        let rt = runtime();
        let store = store();
        let mut record = candidate("c-1", "Rahul Singh");
        record.skills = Some(ListField::many(["Java", "AWS"]));
        record.experience = Some(Scalar::from("3 years"));
        store.save_candidate(record).unwrap();
        rt.block_on(store.flush_indexing());

        let response = rt.block_on(store.search(term("rahul"))).unwrap();
        assert_eq!(response.total, 1);
        let hit = &response.results[0];
        assert_eq!(hit.id, "c-1");
        assert_eq!(hit.source.skills, vec!["Java", "AWS"]);
        assert_eq!(hit.source.experience, 3.0);
        assert_eq!(store.indexing_stats().completed, 1);
    }

    #[test]
    fn test_empty_request_returns_nothing() {
        let rt = runtime();
        let store = store();
        store.save_candidate(candidate("c-1", "Asha")).unwrap();
        rt.block_on(store.flush_indexing());

        let response = rt.block_on(store.search(SearchParams::default())).unwrap();
        assert_eq!(response.total, 0);
        assert!(response.results.is_empty());
        assert_eq!(response.page, 1);
        assert_eq!(response.size, 20);
    }

    #[test]
    fn test_invalid_filter_is_client_error() {
        let rt = runtime();
        let store = store();
        let err = rt
            .block_on(store.search(SearchParams {
                min_exp: Some("five".into()),
                ..Default::default()
            }))
            .unwrap_err();
        assert!(matches!(err, TalentError::InvalidFilter(_)));
    }

    #[test]
    fn test_blank_id_rejected() {
        let store = store();
        let err = store.save_candidate(candidate("  ", "Nobody")).unwrap_err();
        assert!(matches!(err, TalentError::InvalidInput(_)));
    }

    #[test]
    fn test_attach_resume_makes_keywords_searchable() {
        let rt = runtime();
        let store = store();
        store.save_candidate(candidate("c-1", "Meera Nair")).unwrap();
        store
            .attach_resume("c-1", "Kubernetes operator work. Kubernetes and Terraform.".into())
            .unwrap();
        rt.block_on(store.flush_indexing());

        let stored = store.get_candidate("c-1").unwrap().unwrap();
        assert!(stored.record.resume_text.is_some());

        let response = rt
            .block_on(store.search(SearchParams {
                keywords: vec!["Terraform".into()],
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].source.resume_keywords[0], "kubernetes");

        let missing = store.attach_resume("nope", "text".into()).unwrap_err();
        assert!(matches!(missing, TalentError::NotFound(_)));
    }

    #[test]
    fn test_delete_removes_index_document() {
        let rt = runtime();
        let store = store();
        store.save_candidate(candidate("c-1", "Asha")).unwrap();
        rt.block_on(store.flush_indexing());
        assert_eq!(store.index_count().unwrap(), 1);

        assert!(store.delete_candidate("c-1").unwrap());
        rt.block_on(store.flush_indexing());
        assert_eq!(store.index_count().unwrap(), 0);
        assert!(store.get_candidate("c-1").unwrap().is_none());
    }

    #[test]
    fn test_reindex_reports_corpus() {
        let rt = runtime();
        let store = store();
        for i in 0..5 {
            store.save_candidate(candidate(&format!("c-{i}"), "Same")).unwrap();
        }
        rt.block_on(store.flush_indexing());

        let first = rt.block_on(store.reindex()).unwrap();
        let second = rt.block_on(store.reindex()).unwrap();
        assert_eq!(first.indexed, 5);
        assert_eq!(second.indexed, 5);
        assert_eq!(store.index_count().unwrap(), 5);
    }
}
