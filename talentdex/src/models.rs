//! Core data models for talentdex
//!
//! `CandidateRecord` is what the record-management side hands us: loosely typed,
//! with several spellings for the same thing. `IndexDocument` is the strict, fully
//! defaulted shape that goes into the search index. `StoredCandidate` is a row of
//! the primary store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// LOOSE INPUT VALUES
// ─────────────────────────────────────────────────────────────────────────────

/// A loosely typed scalar as found in imported candidate data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl Scalar {
    /// Whether the value counts as "not provided" (empty text, zero, false)
    pub fn is_falsy(&self) -> bool {
        match self {
            Scalar::Number(n) => *n == 0.0 || n.is_nan(),
            Scalar::Text(s) => s.trim().is_empty(),
            Scalar::Flag(b) => !b,
        }
    }

    /// Textual form; integral numbers render without a fractional part
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

/// A list-valued field that may arrive as a sequence or as a single scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListField {
    Many(Vec<Option<Scalar>>),
    One(Scalar),
}

impl ListField {
    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ListField::Many(
            values
                .into_iter()
                .map(|v| Some(Scalar::Text(v.into())))
                .collect(),
        )
    }

    /// Whether the field carries nothing worth indexing
    pub fn is_falsy(&self) -> bool {
        match self {
            ListField::Many(_) => false,
            ListField::One(scalar) => scalar.is_falsy(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CANDIDATE RECORD (external, read-only to the index side)
// ─────────────────────────────────────────────────────────────────────────────

/// Candidate record as produced by the record-management subsystem.
///
/// Every field except `id` is optional; the normalizer decides what a missing
/// value means for the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateRecord {
    #[serde(alias = "unique_id", alias = "uniqueId")]
    pub id: String,
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub candidate_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub designation: Option<String>,
    pub skills: Option<ListField>,
    pub skills_all: Option<ListField>,
    pub top_skills: Option<ListField>,
    pub company_names_all: Option<ListField>,
    pub recent_company: Option<String>,
    pub location: Option<String>,
    pub experience: Option<Scalar>,
    #[serde(rename = "currCTC")]
    pub curr_ctc: Option<Scalar>,
    #[serde(rename = "expCTC")]
    pub exp_ctc: Option<Scalar>,
    pub resume_text: Option<String>,
    pub resume_keywords: Option<ListField>,
    pub portal: Option<String>,
    pub portal_date: Option<String>,
    pub apply_date: Option<String>,
}

impl CandidateRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// A candidate row from the primary store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCandidate {
    /// SQLite rowid, monotonically increasing; used as the reindex cursor
    pub row_id: i64,
    pub record: CandidateRecord,
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// INDEX DOCUMENT
// ─────────────────────────────────────────────────────────────────────────────

/// The normalized document written to the search index, one per candidate id.
///
/// Strings are never null (empty instead), lists are never null (empty instead),
/// numbers default to 0. `name` is the one optional text field: a candidate
/// without a usable name has no name in the index at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    pub candidate_id: String,
    pub name: Option<String>,
    pub designation: String,
    pub skills: Vec<String>,
    pub top_skills: Vec<String>,
    pub recent_company: String,
    pub company_names_all: Vec<String>,
    pub resume_text: String,
    pub resume_keywords: Vec<String>,
    pub location: String,
    pub experience: f64,
    pub ctc_current: f64,
    pub ctc_expected: f64,
    pub portal: String,
    pub portal_date: Option<DateTime<Utc>>,
    pub apply_date: Option<DateTime<Utc>>,
}
