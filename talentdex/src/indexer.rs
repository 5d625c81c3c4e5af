//! Indexer
//!
//! Writes normalized candidate documents through a `SearchBackend`. The index
//! is derived from the primary store, so a failed write is logged and absorbed:
//! the document catches up on the next successful write or the next reindex.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{IndexResult, SearchBackend};
use crate::database::{Database, DatabaseResult};
use crate::models::IndexDocument;
use crate::normalizer::normalize;

/// Outcome of a full-corpus reindex
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    /// Primary-store rows read
    pub scanned: u64,
    pub indexed: u64,
    pub failed: u64,
    /// Rowid of the last row read; pass it back to resume an interrupted run
    pub last_row_id: i64,
}

pub struct Indexer {
    backend: Arc<dyn SearchBackend>,
}

impl Indexer {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Replace the document for its candidate id, reporting the error
    pub fn try_upsert(&self, document: &IndexDocument) -> IndexResult<()> {
        self.backend.index_document(document)
    }

    /// Replace the document for its candidate id. Failures are logged, not
    /// returned; the result only says whether the write landed.
    pub fn upsert(&self, document: &IndexDocument) -> bool {
        match self.try_upsert(document) {
            Ok(()) => true,
            Err(e) => {
                warn!(candidate_id = %document.candidate_id, error = %e, "Index write failed");
                false
            }
        }
    }

    pub fn try_remove(&self, candidate_id: &str) -> IndexResult<()> {
        self.backend.delete_document(candidate_id)
    }

    /// Remove the document for a candidate id, logging failures
    pub fn remove(&self, candidate_id: &str) -> bool {
        match self.try_remove(candidate_id) {
            Ok(()) => true,
            Err(e) => {
                warn!(candidate_id, error = %e, "Index delete failed");
                false
            }
        }
    }

    /// Rebuild the index from the primary store, one page at a time in rowid
    /// order, starting after `from_row_id` (0 for the whole corpus).
    ///
    /// Every write is an idempotent replacement, so an interrupted run can be
    /// restarted from its last reported rowid, or from scratch, without
    /// duplicating documents. Index failures are counted; primary-store
    /// failures end the run.
    pub fn reindex_from(&self, db: &Database, page_size: usize, from_row_id: i64) -> DatabaseResult<ReindexReport> {
        let mut report = ReindexReport {
            last_row_id: from_row_id,
            ..ReindexReport::default()
        };
        let page_size = page_size.max(1);

        loop {
            let page = db.fetch_page(report.last_row_id, page_size)?;
            let Some(last) = page.last() else {
                break;
            };
            report.last_row_id = last.row_id;
            report.scanned += page.len() as u64;

            let documents: Vec<IndexDocument> = page.iter().map(|row| normalize(&row.record)).collect();
            match self.backend.index_documents(&documents) {
                Ok(()) => report.indexed += documents.len() as u64,
                Err(e) => {
                    warn!(error = %e, after_row_id = report.last_row_id, "Batch index write failed, retrying one by one");
                    for doc in &documents {
                        if self.upsert(doc) {
                            report.indexed += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                }
            }

            info!(
                scanned = report.scanned,
                indexed = report.indexed,
                failed = report.failed,
                "Reindex progress"
            );

            if page.len() < page_size {
                break;
            }
        }

        info!(
            scanned = report.scanned,
            indexed = report.indexed,
            failed = report.failed,
            "Reindex complete"
        );
        Ok(report)
    }

    /// Rebuild the whole index from the primary store
    pub fn reindex_all(&self, db: &Database, page_size: usize) -> DatabaseResult<ReindexReport> {
        self.reindex_from(db, page_size, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{IndexError, IndexStatus};
    use crate::interface::SearchPage;
    use crate::models::CandidateRecord;
    use crate::query::BoolQuery;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// Backend double keeping documents in a map; ids in `reject` fail to index
    #[derive(Default)]
    struct MapBackend {
        docs: Mutex<BTreeMap<String, IndexDocument>>,
        reject: Vec<String>,
        batches: Mutex<usize>,
    }

    impl SearchBackend for MapBackend {
        fn ensure_index(&self) -> IndexResult<IndexStatus> {
            Ok(IndexStatus::AlreadyExists)
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn index_document(&self, document: &IndexDocument) -> IndexResult<()> {
            if self.reject.contains(&document.candidate_id) {
                return Err(IndexError::NotReady(document.candidate_id.clone()));
            }
            self.docs.lock().insert(document.candidate_id.clone(), document.clone());
            Ok(())
        }

        fn index_documents(&self, documents: &[IndexDocument]) -> IndexResult<()> {
            *self.batches.lock() += 1;
            if documents.iter().any(|d| self.reject.contains(&d.candidate_id)) {
                return Err(IndexError::NotReady("batch".into()));
            }
            documents.iter().try_for_each(|d| self.index_document(d))
        }

        fn delete_document(&self, candidate_id: &str) -> IndexResult<()> {
            self.docs.lock().remove(candidate_id);
            Ok(())
        }

        fn search(&self, _query: &BoolQuery, _offset: usize, _limit: usize) -> IndexResult<SearchPage> {
            Ok(SearchPage::empty())
        }

        fn count(&self) -> IndexResult<u64> {
            Ok(self.docs.lock().len() as u64)
        }
    }

    fn seeded_db(n: usize) -> Database {
        let db = Database::open_in_memory().unwrap();
        for i in 0..n {
            let mut record = CandidateRecord::new(format!("c-{i}"));
            record.name = Some(format!("Candidate {i}"));
            db.upsert_candidate(&record).unwrap();
        }
        db
    }

    #[test]
    fn test_reindex_pages_through_everything() {
        let backend = Arc::new(MapBackend::default());
        let indexer = Indexer::new(backend.clone());
        let db = seeded_db(7);

        let report = indexer.reindex_all(&db, 3).unwrap();
        assert_eq!(report.scanned, 7);
        assert_eq!(report.indexed, 7);
        assert_eq!(report.failed, 0);
        assert_eq!(*backend.batches.lock(), 3);
        assert_eq!(backend.count().unwrap(), 7);
    }

    #[test]
    fn test_reindex_twice_is_idempotent() {
        let backend = Arc::new(MapBackend::default());
        let indexer = Indexer::new(backend.clone());
        let db = seeded_db(5);

        indexer.reindex_all(&db, 2).unwrap();
        let first = backend.count().unwrap();
        indexer.reindex_all(&db, 2).unwrap();
        assert_eq!(backend.count().unwrap(), first);
        assert_eq!(first, 5);
    }

    #[test]
    fn test_reindex_resumes_from_checkpoint() {
        let backend = Arc::new(MapBackend::default());
        let indexer = Indexer::new(backend.clone());
        let db = seeded_db(6);

        let third_row = db.fetch_page(0, 3).unwrap()[2].row_id;
        let report = indexer.reindex_from(&db, 10, third_row).unwrap();
        assert_eq!(report.scanned, 3);
        let docs = backend.docs.lock();
        assert!(docs.contains_key("c-5"));
        assert!(!docs.contains_key("c-0"));
    }

    #[test]
    fn test_failed_documents_are_counted_not_fatal() {
        let backend = Arc::new(MapBackend {
            reject: vec!["c-1".to_string()],
            ..MapBackend::default()
        });
        let indexer = Indexer::new(backend.clone());
        let db = seeded_db(4);

        let report = indexer.reindex_all(&db, 10).unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.indexed, 3);
        assert_eq!(report.failed, 1);
        assert!(!indexer.upsert(&normalize(&CandidateRecord::new("c-1"))));
    }
}
