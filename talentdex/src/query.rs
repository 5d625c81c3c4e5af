//! Query Builder
//!
//! Turns validated search filters into a backend-neutral boolean query.
//! Scoring clauses go in `should` with per-clause boosts; structured filters go
//! in `filter` and never contribute to the score. Nothing here touches an index.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::config::SearchConfig;
use crate::ranking::{FuzzyPolicy, QueryWeights};
use crate::schema::IndexField;

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY AST
// ═══════════════════════════════════════════════════════════════════════════════

/// How the tokens of a `Match` clause combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Or,
    And,
}

/// Edit tolerance per token of a `Match` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Fuzziness {
    Exact,
    /// Distance derived from token length
    Auto,
    /// Bounded edits: the first `prefix_length` characters must match and a
    /// token expands to at most `max_expansions` index terms
    Edits {
        distance: u8,
        prefix_length: usize,
        max_expansions: usize,
    },
}

/// Wildcard shapes over a keyword field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum WildcardPattern {
    /// `value *`
    Leading(String),
    /// `* value`
    Trailing(String),
    /// `*value*`
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Clause {
    /// The value, normalized by the field's analyzer, must equal an index term
    Term { field: IndexField, value: String, boost: f32 },
    /// Analyzed tokens must appear adjacent and in order
    Phrase { field: IndexField, text: String, boost: f32 },
    /// Analyzed tokens combined with `operator`, each matched with `fuzziness`
    Match {
        field: IndexField,
        text: String,
        operator: Operator,
        fuzziness: Fuzziness,
        boost: f32,
    },
    /// Inclusive numeric range; an absent bound is open
    Range {
        field: IndexField,
        gte: Option<f64>,
        lte: Option<f64>,
    },
    /// Documents with no value in a numeric field
    Missing { field: IndexField },
    Wildcard { field: IndexField, pattern: WildcardPattern },
    Bool(BoolQuery),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    pub must: Vec<Clause>,
    pub should: Vec<Clause>,
    /// Required, non-scoring
    pub filter: Vec<Clause>,
    pub minimum_should_match: usize,
}

impl BoolQuery {
    /// At least one of `clauses` must match
    pub fn any_of(clauses: Vec<Clause>) -> Self {
        Self {
            should: clauses,
            minimum_should_match: 1,
            ..Self::default()
        }
    }

    /// Every one of `clauses` must match
    pub fn all_of(clauses: Vec<Clause>) -> Self {
        Self {
            must: clauses,
            ..Self::default()
        }
    }
}

/// Output of the builder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompiledQuery {
    /// Nothing to search for; the caller answers with zero hits
    Empty,
    Search(BoolQuery),
}

impl CompiledQuery {
    pub fn is_empty(&self) -> bool {
        matches!(self, CompiledQuery::Empty)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILTERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("{param} must be {expected}, got {value:?}")]
    Malformed {
        param: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{0}")]
    Invalid(String),
}

impl From<ValidationErrors> for FilterError {
    fn from(errors: ValidationErrors) -> Self {
        FilterError::Invalid(errors.to_string())
    }
}

/// Raw search request parameters as the request layer receives them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub keywords: Vec<String>,
    pub location: Option<String>,
    pub designation: Option<String>,
    pub skills: Vec<String>,
    pub min_exp: Option<String>,
    pub max_exp: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

/// Validated, normalized search filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
#[validate(schema(function = "validate_experience_bounds", skip_on_field_errors = true))]
pub struct SearchFilters {
    pub term: Option<String>,
    pub keywords: Vec<String>,
    /// Lowercased
    pub location: Option<String>,
    pub designation: Option<String>,
    /// Lowercased
    pub skills: Vec<String>,
    #[validate(range(min = 0.0))]
    pub min_experience: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_experience: Option<f64>,
}

fn validate_experience_bounds(filters: &SearchFilters) -> Result<(), ValidationError> {
    match (filters.min_experience, filters.max_experience) {
        (Some(min), Some(max)) if min > max => {
            let mut err = ValidationError::new("experience_bounds");
            err.message = Some(format!("minExp ({min}) must not exceed maxExp ({max})").into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl SearchFilters {
    pub fn has_structured_filters(&self) -> bool {
        self.location.is_some()
            || self.designation.is_some()
            || !self.skills.is_empty()
            || self.min_experience.is_some()
            || self.max_experience.is_some()
    }

    /// No term, no keywords, no structured filter
    pub fn is_empty(&self) -> bool {
        self.term.is_none() && self.keywords.is_empty() && !self.has_structured_filters()
    }
}

/// 1-based page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct Pagination {
    #[validate(range(min = 1))]
    pub page: usize,
    #[validate(range(min = 1))]
    pub size: usize,
}

impl Pagination {
    /// Hits skipped before this page; `None` on overflow
    pub fn offset(&self) -> Option<usize> {
        self.page.checked_sub(1)?.checked_mul(self.size)
    }

    /// One past the last hit this page asks for
    pub fn window_end(&self) -> Option<usize> {
        self.offset()?.checked_add(self.size)
    }
}

impl SearchParams {
    /// Parse and check every parameter. Malformed numbers are rejected, never
    /// coerced; blank values count as absent.
    pub fn validate(&self, limits: &SearchConfig) -> Result<(SearchFilters, Pagination), FilterError> {
        let filters = SearchFilters {
            term: non_blank(self.q.as_deref()).map(str::to_string),
            keywords: self
                .keywords
                .iter()
                .filter_map(|k| non_blank(Some(k)))
                .map(str::to_string)
                .collect(),
            location: non_blank(self.location.as_deref()).map(str::to_lowercase),
            designation: non_blank(self.designation.as_deref()).map(str::to_string),
            skills: self
                .skills
                .iter()
                .filter_map(|s| non_blank(Some(s)))
                .map(str::to_lowercase)
                .collect(),
            min_experience: parse_bound("minExp", self.min_exp.as_deref())?,
            max_experience: parse_bound("maxExp", self.max_exp.as_deref())?,
        };
        filters.validate()?;

        let pagination = Pagination {
            page: parse_count("page", self.page.as_deref())?.unwrap_or(1),
            size: parse_count("size", self.size.as_deref())?.unwrap_or(limits.default_page_size),
        };
        pagination.validate()?;
        if pagination.size > limits.max_page_size {
            return Err(FilterError::Invalid(format!(
                "size must not exceed {}",
                limits.max_page_size
            )));
        }
        match pagination.window_end() {
            Some(end) if end <= limits.max_result_window => {}
            _ => {
                return Err(FilterError::Invalid(format!(
                    "page * size must not exceed {}",
                    limits.max_result_window
                )))
            }
        }

        Ok((filters, pagination))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bound(param: &'static str, raw: Option<&str>) -> Result<Option<f64>, FilterError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(FilterError::Malformed {
            param,
            expected: "a finite number",
            value: raw.to_string(),
        }),
    }
}

fn parse_count(param: &'static str, raw: Option<&str>) -> Result<Option<usize>, FilterError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    raw.parse::<usize>().map(Some).map_err(|_| FilterError::Malformed {
        param,
        expected: "a positive integer",
        value: raw.to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    weights: QueryWeights,
    fuzzy: FuzzyPolicy,
}

impl QueryBuilder {
    pub fn new(weights: QueryWeights, fuzzy: FuzzyPolicy) -> Self {
        Self { weights, fuzzy }
    }

    pub fn build(&self, filters: &SearchFilters) -> CompiledQuery {
        if filters.is_empty() {
            return CompiledQuery::Empty;
        }

        let mut should = Vec::new();
        if let Some(term) = &filters.term {
            should.extend(self.name_clauses(term));
            should.extend(self.designation_clauses(term));
            should.extend(self.skill_clauses(term));
            should.extend(self.company_clauses(term));
        }
        should.extend(self.resume_keyword_clauses(&filters.keywords));

        let minimum_should_match = usize::from(!should.is_empty());
        CompiledQuery::Search(BoolQuery {
            must: Vec::new(),
            should,
            filter: self.filter_clauses(filters),
            minimum_should_match,
        })
    }

    fn name_clauses(&self, term: &str) -> Vec<Clause> {
        let w = &self.weights;
        vec![
            Clause::Term {
                field: IndexField::NameKeyword,
                value: term.to_string(),
                boost: w.name_exact,
            },
            Clause::Phrase {
                field: IndexField::Name,
                text: term.to_string(),
                boost: w.name_phrase,
            },
            Clause::Match {
                field: IndexField::Name,
                text: term.to_string(),
                operator: Operator::Or,
                fuzziness: Fuzziness::Edits {
                    distance: self.fuzzy.name_distance,
                    prefix_length: self.fuzzy.name_prefix_length,
                    max_expansions: self.fuzzy.name_max_expansions,
                },
                boost: w.name_fuzzy,
            },
        ]
    }

    fn designation_clauses(&self, term: &str) -> Vec<Clause> {
        let w = &self.weights;
        vec![
            Clause::Phrase {
                field: IndexField::Designation,
                text: term.to_string(),
                boost: w.designation_phrase,
            },
            Clause::Match {
                field: IndexField::Designation,
                text: term.to_string(),
                operator: Operator::And,
                fuzziness: Fuzziness::Exact,
                boost: w.designation_all_terms,
            },
            Clause::Match {
                field: IndexField::DesignationNgram,
                text: term.to_string(),
                operator: Operator::Or,
                fuzziness: Fuzziness::Exact,
                boost: w.designation_partial,
            },
        ]
    }

    fn skill_clauses(&self, term: &str) -> Vec<Clause> {
        let w = &self.weights;
        let exact = [IndexField::SkillsKeyword, IndexField::TopSkillsKeyword]
            .into_iter()
            .map(|field| Clause::Term {
                field,
                value: term.to_string(),
                boost: w.skill_exact,
            });
        let fuzzy = [IndexField::Skills, IndexField::TopSkills]
            .into_iter()
            .map(|field| Clause::Match {
                field,
                text: term.to_string(),
                operator: Operator::Or,
                fuzziness: Fuzziness::Auto,
                boost: w.skill_fuzzy,
            });
        exact.chain(fuzzy).collect()
    }

    fn company_clauses(&self, term: &str) -> Vec<Clause> {
        let w = &self.weights;
        vec![
            Clause::Phrase {
                field: IndexField::RecentCompany,
                text: term.to_string(),
                boost: w.company_phrase,
            },
            Clause::Match {
                field: IndexField::RecentCompany,
                text: term.to_string(),
                operator: Operator::Or,
                fuzziness: Fuzziness::Edits {
                    distance: self.fuzzy.company_distance,
                    prefix_length: 0,
                    max_expansions: self.fuzzy.company_max_expansions,
                },
                boost: w.company_fuzzy,
            },
            Clause::Term {
                field: IndexField::CompanyNamesAll,
                value: term.to_string(),
                boost: w.company_history_exact,
            },
            Clause::Match {
                field: IndexField::CompanyNamesAll,
                text: term.to_string(),
                operator: Operator::Or,
                fuzziness: Fuzziness::Auto,
                boost: w.company_history_fuzzy,
            },
        ]
    }

    fn resume_keyword_clauses(&self, keywords: &[String]) -> Vec<Clause> {
        let w = &self.weights;
        keywords
            .iter()
            .flat_map(|k| {
                k.to_lowercase()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .flat_map(|token| {
                [
                    Clause::Term {
                        field: IndexField::ResumeKeywords,
                        value: token.clone(),
                        boost: w.resume_keyword_exact,
                    },
                    Clause::Match {
                        field: IndexField::ResumeText,
                        text: token,
                        operator: Operator::Or,
                        fuzziness: Fuzziness::Exact,
                        boost: w.resume_text,
                    },
                ]
            })
            .collect()
    }

    fn filter_clauses(&self, filters: &SearchFilters) -> Vec<Clause> {
        let mut filter = Vec::new();

        if let Some(location) = &filters.location {
            filter.push(Clause::Bool(BoolQuery::any_of(vec![
                Clause::Term {
                    field: IndexField::LocationKeyword,
                    value: location.clone(),
                    boost: 1.0,
                },
                Clause::Phrase {
                    field: IndexField::Location,
                    text: location.clone(),
                    boost: 1.0,
                },
                Clause::Wildcard {
                    field: IndexField::LocationKeyword,
                    pattern: WildcardPattern::Trailing(location.clone()),
                },
                Clause::Wildcard {
                    field: IndexField::LocationKeyword,
                    pattern: WildcardPattern::Leading(location.clone()),
                },
                Clause::Wildcard {
                    field: IndexField::LocationKeyword,
                    pattern: WildcardPattern::Contains(location.clone()),
                },
            ])));
        }

        if let Some(designation) = &filters.designation {
            filter.push(Clause::Phrase {
                field: IndexField::Designation,
                text: designation.clone(),
                boost: 1.0,
            });
        }

        if !filters.skills.is_empty() {
            let each_skill = filters
                .skills
                .iter()
                .map(|skill| {
                    Clause::Bool(BoolQuery::any_of(vec![
                        Clause::Phrase {
                            field: IndexField::Skills,
                            text: skill.clone(),
                            boost: 1.0,
                        },
                        Clause::Phrase {
                            field: IndexField::TopSkills,
                            text: skill.clone(),
                            boost: 1.0,
                        },
                    ]))
                })
                .collect();
            filter.push(Clause::Bool(BoolQuery::all_of(each_skill)));
        }

        match (filters.min_experience, filters.max_experience) {
            (None, None) => {}
            (None, Some(lte)) => {
                filter.push(Clause::Bool(BoolQuery::any_of(vec![
                    Clause::Range {
                        field: IndexField::Experience,
                        gte: None,
                        lte: Some(lte),
                    },
                    Clause::Missing {
                        field: IndexField::Experience,
                    },
                ])));
            }
            (gte, lte) => filter.push(Clause::Range {
                field: IndexField::Experience,
                gte,
                lte,
            }),
        }

        filter
    }
}
