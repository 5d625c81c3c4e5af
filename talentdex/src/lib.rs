//! talentdex - hybrid candidate search
//!
//! Candidates live in SQLite, the system of record. A Tantivy index derived
//! from it serves ranked search: exact, phrase and fuzzy matches on names,
//! designations, skills, companies and resume keywords, combined with
//! structured filters on location, designation, skills and experience.

pub mod backend;
pub mod config;
pub mod database;
pub mod indexer;
pub mod interface;
pub mod keywords;
pub mod models;
pub mod normalizer;
pub mod query;
pub mod ranking;
pub mod schema;
pub mod search;
mod store;
pub mod tantivy_backend;
pub mod worker;

pub use backend::{IndexError, IndexStatus, SearchBackend};
pub use config::Config;
pub use indexer::ReindexReport;
pub use interface::*;
pub use models::{CandidateRecord, IndexDocument, ListField, Scalar, StoredCandidate};
pub use query::{CompiledQuery, SearchParams};
pub use store::TalentStore;
pub use worker::IndexingStats;
