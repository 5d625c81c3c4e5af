//! Relevance knobs for the hybrid query.
//!
//! Within each field group the weights are ordered exact > phrase > fuzzy/partial,
//! so a stronger match on a field always outscores a weaker one on the same field.
//! All of it is configuration; the defaults are the tuned production values.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Boost weight per clause of the hybrid query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryWeights {
    pub name_exact: f32,
    pub name_phrase: f32,
    pub name_fuzzy: f32,
    pub designation_phrase: f32,
    pub designation_all_terms: f32,
    pub designation_partial: f32,
    pub skill_exact: f32,
    pub skill_fuzzy: f32,
    pub company_phrase: f32,
    pub company_fuzzy: f32,
    pub company_history_exact: f32,
    pub company_history_fuzzy: f32,
    pub resume_keyword_exact: f32,
    pub resume_text: f32,
}

impl Default for QueryWeights {
    fn default() -> Self {
        Self {
            name_exact: 25.0,
            name_phrase: 15.0,
            name_fuzzy: 8.0,
            designation_phrase: 15.0,
            designation_all_terms: 8.0,
            designation_partial: 4.0,
            skill_exact: 15.0,
            skill_fuzzy: 7.0,
            company_phrase: 12.0,
            company_fuzzy: 6.0,
            company_history_exact: 10.0,
            company_history_fuzzy: 5.0,
            resume_keyword_exact: 20.0,
            resume_text: 10.0,
        }
    }
}

impl QueryWeights {
    /// Check the exact > phrase > fuzzy ordering inside every field group.
    /// Returns the name of the first group that violates it.
    pub fn ordering_violation(&self) -> Option<&'static str> {
        let groups: [(&'static str, Vec<f32>); 4] = [
            ("name", vec![self.name_exact, self.name_phrase, self.name_fuzzy]),
            (
                "designation",
                vec![self.designation_phrase, self.designation_all_terms, self.designation_partial],
            ),
            ("skills", vec![self.skill_exact, self.skill_fuzzy]),
            ("company", vec![self.company_phrase, self.company_fuzzy]),
        ];
        groups
            .into_iter()
            .find(|(_, weights)| weights.windows(2).any(|w| w[0] <= w[1]) || weights.iter().any(|w| *w <= 0.0))
            .map(|(group, _)| group)
            .or_else(|| (self.company_history_exact <= self.company_history_fuzzy).then_some("company history"))
    }
}

/// Bounds on fuzzy name matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyPolicy {
    /// Maximum edits for a fuzzy name match
    pub name_distance: u8,
    /// Leading characters that must match exactly before any edit is allowed
    pub name_prefix_length: usize,
    /// Cap on distinct index terms a fuzzy name token may expand to
    pub name_max_expansions: usize,
    /// Maximum edits for a fuzzy match on the most recent company
    pub company_distance: u8,
    /// Cap on index terms a fuzzy company token may expand to
    pub company_max_expansions: usize,
}

impl Default for FuzzyPolicy {
    fn default() -> Self {
        Self {
            name_distance: 1,
            name_prefix_length: 2,
            name_max_expansions: 8,
            company_distance: 1,
            company_max_expansions: 50,
        }
    }
}

/// Edit distance for "AUTO" fuzziness: none for very short terms, one edit for
/// short words, two beyond that.
pub fn auto_edit_distance(term_len: usize) -> u8 {
    if term_len <= 2 {
        0
    } else if term_len <= 5 {
        1
    } else {
        2
    }
}

/// Stable 64-bit key for a candidate id, used to order equal-score hits.
pub fn tie_break_key(candidate_id: &str) -> u64 {
    let digest = Sha256::digest(candidate_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
