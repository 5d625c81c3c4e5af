//! Candidate record → index document
//!
//! Pure and infallible: every malformed or missing input coerces to a safe
//! default so that a bad record can always be indexed.

use crate::models::{CandidateRecord, IndexDocument, ListField, Scalar};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder some importers write when no name was known
pub const UNKNOWN_NAME_PLACEHOLDER: &str = "Unknown";

/// First run of digits with an optional fractional part
static NUMERIC_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("static regex"));

/// Normalize a candidate record into the document written to the index
pub fn normalize(record: &CandidateRecord) -> IndexDocument {
    let skills = match &record.skills {
        Some(list) if !list.is_falsy() => Some(list),
        _ => record.skills_all.as_ref(),
    };

    IndexDocument {
        candidate_id: record.id.clone(),
        name: resolve_name(record),
        designation: text_or_empty(record.designation.as_deref()),
        skills: to_list(skills),
        top_skills: to_list(record.top_skills.as_ref()),
        recent_company: text_or_empty(record.recent_company.as_deref()),
        company_names_all: to_list(record.company_names_all.as_ref()),
        resume_text: record.resume_text.clone().unwrap_or_default(),
        resume_keywords: to_list(record.resume_keywords.as_ref()),
        location: text_or_empty(record.location.as_deref()),
        experience: parse_experience(record.experience.as_ref()),
        ctc_current: parse_amount(record.curr_ctc.as_ref()),
        ctc_expected: parse_amount(record.exp_ctc.as_ref()),
        portal: text_or_empty(record.portal.as_deref()),
        portal_date: parse_date(record.portal_date.as_deref()),
        apply_date: parse_date(record.apply_date.as_deref()),
    }
}

/// Resolve the display name: full name, then generic name, then the alternate
/// candidate-name field, then first + last. The "Unknown" placeholder is
/// treated as no name at all so it never becomes searchable.
pub fn resolve_name(record: &CandidateRecord) -> Option<String> {
    let joined = format!(
        "{} {}",
        record.first_name.as_deref().unwrap_or("").trim(),
        record.last_name.as_deref().unwrap_or("").trim()
    );

    let resolved = [
        record.full_name.as_deref(),
        record.name.as_deref(),
        record.candidate_name.as_deref(),
        Some(joined.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|candidate| !candidate.is_empty())
    .filter(|resolved| *resolved != UNKNOWN_NAME_PLACEHOLDER)
    .map(str::to_string);
    resolved
}

/// Parse free-text or numeric experience into years.
///
/// Only the leading numeric run counts: "3 years" → 3, "3-5 yrs" → 3,
/// "2.5+" → 2.5. Values without any digit parse to 0.
pub fn parse_experience(value: Option<&Scalar>) -> f64 {
    match value {
        Some(Scalar::Number(n)) if n.is_finite() && *n >= 0.0 => *n,
        Some(Scalar::Text(text)) => leading_number(text).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn leading_number(text: &str) -> Option<f64> {
    NUMERIC_RUN
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Compensation figures: numbers pass through, numeric strings are parsed,
/// everything else is 0.
fn parse_amount(value: Option<&Scalar>) -> f64 {
    match value {
        Some(Scalar::Number(n)) if n.is_finite() => *n,
        Some(Scalar::Text(text)) => text
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Coerce a list-valued field: sequences pass through (minus blank entries),
/// a scalar becomes a one-element list, absent or falsy becomes empty.
pub fn to_list(value: Option<&ListField>) -> Vec<String> {
    match value {
        Some(ListField::Many(values)) => values
            .iter()
            .flatten()
            .map(|v| v.to_text().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
        Some(ListField::One(scalar)) if !scalar.is_falsy() => {
            vec![scalar.to_text().trim().to_string()]
        }
        _ => Vec::new(),
    }
}

fn text_or_empty(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Parse a date the way importers tend to send them; unparseable → absent
fn parse_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| Utc.from_utc_datetime(&dt))
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Utc.from_utc_datetime(&dt))
        })
}
