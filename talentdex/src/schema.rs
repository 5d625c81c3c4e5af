//! Index Schema Manager
//!
//! Owns the field layout of the candidate index and the analyzers it depends on.
//! Every searchable string exists in up to three flavours:
//!
//! - `<field>`          analyzed text (standard tokenizer, lowercased, positions)
//! - `<field>_keyword`  the whole value lowercased as a single token (exact match)
//! - `<field>_ngram`    2-3 character grams of every alphanumeric run (partial match)
//!
//! `ensure` is idempotent: an existing index is opened and verified, a missing
//! one is created, and losing a creation race to another process is success.

use std::collections::HashMap;

use tantivy::directory::Directory;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RawTokenizer, TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::{Index, IndexSettings, TantivyError};
use tracing::{debug, info};

use crate::backend::{IndexError, IndexResult, IndexStatus};

/// Standard word analyzer (tantivy's built-in "default": simple tokenizer, long-token removal, lowercase)
pub const TEXT_ANALYZER: &str = "default";
/// Whole value as one lowercased token
pub const KEYWORD_ANALYZER: &str = "keyword_lowercase";
/// Character n-grams over alphanumeric runs, lowercased
pub const NGRAM_ANALYZER: &str = "word_ngram";

/// How a field is indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Raw identifier, indexed and stored
    Id,
    /// u64 fast field used to order equal-score hits
    SortKey,
    /// Stored only: the serialized index document
    Source,
    Text,
    Keyword,
    Ngram,
    Float,
    Date,
}

/// Every field of the candidate index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(into = "&'static str")]
pub enum IndexField {
    CandidateId,
    IdKey,
    Source,
    Name,
    NameKeyword,
    NameNgram,
    Designation,
    DesignationNgram,
    Skills,
    SkillsKeyword,
    SkillsNgram,
    TopSkills,
    TopSkillsKeyword,
    TopSkillsNgram,
    RecentCompany,
    CompanyNamesAll,
    ResumeText,
    ResumeKeywords,
    Location,
    LocationKeyword,
    LocationNgram,
    Experience,
    CtcCurrent,
    CtcExpected,
    Portal,
    PortalDate,
    ApplyDate,
}

impl IndexField {
    pub const ALL: [IndexField; 27] = [
        IndexField::CandidateId,
        IndexField::IdKey,
        IndexField::Source,
        IndexField::Name,
        IndexField::NameKeyword,
        IndexField::NameNgram,
        IndexField::Designation,
        IndexField::DesignationNgram,
        IndexField::Skills,
        IndexField::SkillsKeyword,
        IndexField::SkillsNgram,
        IndexField::TopSkills,
        IndexField::TopSkillsKeyword,
        IndexField::TopSkillsNgram,
        IndexField::RecentCompany,
        IndexField::CompanyNamesAll,
        IndexField::ResumeText,
        IndexField::ResumeKeywords,
        IndexField::Location,
        IndexField::LocationKeyword,
        IndexField::LocationNgram,
        IndexField::Experience,
        IndexField::CtcCurrent,
        IndexField::CtcExpected,
        IndexField::Portal,
        IndexField::PortalDate,
        IndexField::ApplyDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndexField::CandidateId => "candidate_id",
            IndexField::IdKey => "id_key",
            IndexField::Source => "source",
            IndexField::Name => "name",
            IndexField::NameKeyword => "name_keyword",
            IndexField::NameNgram => "name_ngram",
            IndexField::Designation => "designation",
            IndexField::DesignationNgram => "designation_ngram",
            IndexField::Skills => "skills",
            IndexField::SkillsKeyword => "skills_keyword",
            IndexField::SkillsNgram => "skills_ngram",
            IndexField::TopSkills => "top_skills",
            IndexField::TopSkillsKeyword => "top_skills_keyword",
            IndexField::TopSkillsNgram => "top_skills_ngram",
            IndexField::RecentCompany => "recent_company",
            IndexField::CompanyNamesAll => "company_names_all",
            IndexField::ResumeText => "resume_text",
            IndexField::ResumeKeywords => "resume_keywords",
            IndexField::Location => "location",
            IndexField::LocationKeyword => "location_keyword",
            IndexField::LocationNgram => "location_ngram",
            IndexField::Experience => "experience",
            IndexField::CtcCurrent => "ctc_current",
            IndexField::CtcExpected => "ctc_expected",
            IndexField::Portal => "portal",
            IndexField::PortalDate => "portal_date",
            IndexField::ApplyDate => "apply_date",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            IndexField::CandidateId => FieldKind::Id,
            IndexField::IdKey => FieldKind::SortKey,
            IndexField::Source => FieldKind::Source,
            IndexField::Name
            | IndexField::Designation
            | IndexField::Skills
            | IndexField::TopSkills
            | IndexField::RecentCompany
            | IndexField::ResumeText
            | IndexField::Location => FieldKind::Text,
            IndexField::NameKeyword
            | IndexField::SkillsKeyword
            | IndexField::TopSkillsKeyword
            | IndexField::CompanyNamesAll
            | IndexField::ResumeKeywords
            | IndexField::LocationKeyword
            | IndexField::Portal => FieldKind::Keyword,
            IndexField::NameNgram
            | IndexField::DesignationNgram
            | IndexField::SkillsNgram
            | IndexField::TopSkillsNgram
            | IndexField::LocationNgram => FieldKind::Ngram,
            IndexField::Experience | IndexField::CtcCurrent | IndexField::CtcExpected => FieldKind::Float,
            IndexField::PortalDate | IndexField::ApplyDate => FieldKind::Date,
        }
    }

    /// Analyzer used for text-like fields, `None` for the rest
    pub fn analyzer(self) -> Option<&'static str> {
        match self.kind() {
            FieldKind::Text => Some(TEXT_ANALYZER),
            FieldKind::Keyword => Some(KEYWORD_ANALYZER),
            FieldKind::Ngram => Some(NGRAM_ANALYZER),
            FieldKind::Id => Some("raw"),
            _ => None,
        }
    }
}

impl From<IndexField> for &'static str {
    fn from(field: IndexField) -> Self {
        field.name()
    }
}

impl std::fmt::Display for IndexField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the candidate index schema
pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    for field in IndexField::ALL {
        let name = field.name();
        match field.kind() {
            FieldKind::Id => {
                builder.add_text_field(name, STRING | STORED);
            }
            FieldKind::SortKey => {
                builder.add_u64_field(name, FAST);
            }
            FieldKind::Source => {
                builder.add_text_field(name, STORED);
            }
            FieldKind::Text => {
                builder.add_text_field(
                    name,
                    analyzed(TEXT_ANALYZER, IndexRecordOption::WithFreqsAndPositions),
                );
            }
            FieldKind::Keyword => {
                builder.add_text_field(name, analyzed(KEYWORD_ANALYZER, IndexRecordOption::WithFreqs));
            }
            FieldKind::Ngram => {
                builder.add_text_field(name, analyzed(NGRAM_ANALYZER, IndexRecordOption::WithFreqs));
            }
            FieldKind::Float => {
                builder.add_f64_field(name, INDEXED | FAST);
            }
            FieldKind::Date => {
                builder.add_date_field(name, INDEXED | FAST);
            }
        }
    }
    builder.build()
}

fn analyzed(tokenizer: &str, record: IndexRecordOption) -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(tokenizer)
            .set_index_option(record),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// ANALYZERS
// ─────────────────────────────────────────────────────────────────────────────

/// Emits `min..=max` character grams for every alphanumeric run of the input.
///
/// Separators never appear inside a gram, so "New Delhi" yields "ne", "new",
/// "ew", "de", "del", ... but not "w d". Positions increase by one per gram.
#[derive(Clone)]
pub struct WordNgramTokenizer {
    min_gram: usize,
    max_gram: usize,
}

impl WordNgramTokenizer {
    pub fn new(min_gram: usize, max_gram: usize) -> Self {
        let min_gram = min_gram.max(1);
        Self {
            min_gram,
            max_gram: max_gram.max(min_gram),
        }
    }

    fn grams(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut run: Vec<(usize, char)> = Vec::new();
        for (offset, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
            if c.is_alphanumeric() && offset < text.len() {
                run.push((offset, c));
                continue;
            }
            for start in 0..run.len() {
                for len in self.min_gram..=self.max_gram {
                    let end = start + len;
                    if end > run.len() {
                        break;
                    }
                    let offset_from = run[start].0;
                    let offset_to = run
                        .get(end)
                        .map(|(o, _)| *o)
                        .unwrap_or_else(|| run[end - 1].0 + run[end - 1].1.len_utf8());
                    tokens.push(Token {
                        offset_from,
                        offset_to,
                        position: tokens.len(),
                        text: text[offset_from..offset_to].to_string(),
                        position_length: 1,
                    });
                }
            }
            run.clear();
        }
        tokens
    }
}

impl Tokenizer for WordNgramTokenizer {
    type TokenStream<'a> = GramTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        GramTokenStream {
            tokens: self.grams(text),
            cursor: 0,
        }
    }
}

pub struct GramTokenStream {
    tokens: Vec<Token>,
    cursor: usize,
}

impl TokenStream for GramTokenStream {
    fn advance(&mut self) -> bool {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.cursor - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.cursor - 1]
    }
}

/// Register the custom analyzers on an index. Must run after every open,
/// analyzers are not persisted with the index.
pub fn register_analyzers(index: &Index, ngram_min: usize, ngram_max: usize) {
    let keyword = TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(KEYWORD_ANALYZER, keyword);

    let ngram = TextAnalyzer::builder(WordNgramTokenizer::new(ngram_min, ngram_max))
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(NGRAM_ANALYZER, ngram);
}

// ─────────────────────────────────────────────────────────────────────────────
// FIELD HANDLES
// ─────────────────────────────────────────────────────────────────────────────

/// Resolved tantivy field handles for every `IndexField`
#[derive(Debug, Clone)]
pub struct Fields {
    handles: HashMap<IndexField, Field>,
}

impl Fields {
    /// Resolve every field, failing on the first one the schema lacks
    pub fn resolve(index_name: &str, schema: &Schema) -> IndexResult<Self> {
        let mut handles = HashMap::with_capacity(IndexField::ALL.len());
        for field in IndexField::ALL {
            let handle = schema.get_field(field.name()).map_err(|_| IndexError::SchemaMismatch {
                index: index_name.to_string(),
                field: field.name().to_string(),
            })?;
            handles.insert(field, handle);
        }
        Ok(Self { handles })
    }

    pub fn get(&self, field: IndexField) -> Field {
        self.handles[&field]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ENSURE
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the candidate index when absent and prepares it for use
#[derive(Debug, Clone)]
pub struct SchemaManager {
    schema: Schema,
    ngram_min: usize,
    ngram_max: usize,
}

/// An index ready for reading and writing
pub struct EnsuredIndex {
    pub index: Index,
    pub fields: Fields,
    pub status: IndexStatus,
}

impl SchemaManager {
    pub fn new(ngram_min: usize, ngram_max: usize) -> Self {
        Self {
            schema: build_schema(),
            ngram_min,
            ngram_max,
        }
    }

    /// Open the index named `index_name` in `directory`, creating it first if needed.
    pub fn ensure(&self, index_name: &str, directory: Box<dyn Directory>) -> IndexResult<EnsuredIndex> {
        let (index, status) = if Index::exists(&*directory)? {
            (Index::open(directory)?, IndexStatus::AlreadyExists)
        } else {
            match Index::create(directory.box_clone(), self.schema.clone(), IndexSettings::default()) {
                Ok(index) => {
                    info!(index = index_name, "Created search index");
                    (index, IndexStatus::Created)
                }
                Err(TantivyError::IndexAlreadyExists) => {
                    debug!(index = index_name, "Index created concurrently, opening it");
                    (Index::open(directory)?, IndexStatus::AlreadyExists)
                }
                Err(e) => return Err(e.into()),
            }
        };

        let fields = Fields::resolve(index_name, &index.schema())?;
        register_analyzers(&index, self.ngram_min, self.ngram_max);
        Ok(EnsuredIndex { index, fields, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::directory::RamDirectory;

    fn analyze(index: &Index, analyzer: &str, text: &str) -> Vec<String> {
        let mut analyzer = index.tokenizers().get(analyzer).unwrap();
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    #[test]
    fn test_word_ngrams_stay_inside_runs() {
        let mut tokenizer = WordNgramTokenizer::new(2, 3);
        let mut stream = tokenizer.token_stream("ab-cd");
        let mut grams = Vec::new();
        while stream.advance() {
            grams.push(stream.token().text.clone());
        }
        assert_eq!(grams, vec!["ab", "cd"]);
    }

    #[test]
    fn test_word_ngrams_offsets_and_positions() {
        let mut tokenizer = WordNgramTokenizer::new(2, 3);
        let mut stream = tokenizer.token_stream("é java");
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().clone());
        }
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["ja", "jav", "av", "ava", "va"]);
        assert_eq!(tokens[0].offset_from, 3);
        assert_eq!(tokens[1].offset_to, 6);
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_ensure_creates_then_reuses() {
        let manager = SchemaManager::new(2, 3);
        let dir = RamDirectory::create();

        let first = manager.ensure("candidates", Box::new(dir.clone())).unwrap();
        assert_eq!(first.status, IndexStatus::Created);

        let second = manager.ensure("candidates", Box::new(dir)).unwrap();
        assert_eq!(second.status, IndexStatus::AlreadyExists);
        assert_eq!(
            second.index.schema().get_field("location_keyword").unwrap(),
            second.fields.get(IndexField::LocationKeyword)
        );
    }

    #[test]
    fn test_ensure_rejects_foreign_schema() {
        let dir = RamDirectory::create();
        let mut builder = Schema::builder();
        builder.add_text_field("content", STORED);
        Index::create(dir.clone(), builder.build(), IndexSettings::default()).unwrap();

        let err = SchemaManager::new(2, 3)
            .ensure("candidates", Box::new(dir))
            .err()
            .unwrap();
        assert!(matches!(err, IndexError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_registered_analyzers() {
        let manager = SchemaManager::new(2, 3);
        let ensured = manager.ensure("candidates", Box::new(RamDirectory::create())).unwrap();
        let index = &ensured.index;

        assert_eq!(analyze(index, KEYWORD_ANALYZER, "New Delhi"), vec!["new delhi"]);
        assert_eq!(analyze(index, TEXT_ANALYZER, "Senior Java Developer"), vec!["senior", "java", "developer"]);
        let grams = analyze(index, NGRAM_ANALYZER, "Pune");
        assert!(grams.contains(&"pu".to_string()));
        assert!(grams.contains(&"une".to_string()));
    }

    #[test]
    fn test_every_field_has_a_unique_name() {
        let names: std::collections::HashSet<&str> = IndexField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), IndexField::ALL.len());
        let schema = build_schema();
        assert_eq!(schema.fields().count(), IndexField::ALL.len());
    }
}
