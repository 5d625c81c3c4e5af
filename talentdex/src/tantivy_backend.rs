//! Tantivy implementation of `SearchBackend`
//!
//! Every write is a delete-by-id plus add, committed and followed by a reader
//! reload so the next search sees it. The writer lock is held across the whole
//! delete/add/commit sequence, so concurrent upserts of the same id serialize
//! and the last one wins.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::{Directory, MmapDirectory, RamDirectory};
use tantivy::query::{
    AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, FuzzyTermQuery, Occur, PhraseQuery, Query,
    RangeQuery, RegexQuery, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{DocId, Index, IndexReader, IndexWriter, ReloadPolicy, Score, Searcher, SegmentReader, TantivyDocument, Term};
use tracing::{debug, warn};

use crate::backend::{IndexError, IndexResult, IndexStatus, SearchBackend};
use crate::config::IndexConfig;
use crate::interface::{SearchHit, SearchPage};
use crate::models::IndexDocument;
use crate::query::{BoolQuery, Clause, Fuzziness, Operator, WildcardPattern};
use crate::ranking::{auto_edit_distance, tie_break_key};
use crate::schema::{FieldKind, Fields, IndexField, SchemaManager};

enum Storage {
    Disk(PathBuf),
    Memory(RamDirectory),
}

struct OpenIndex {
    index: Index,
    fields: Fields,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
}

pub struct TantivyBackend {
    index_name: String,
    storage: Storage,
    schema: SchemaManager,
    writer_memory_bytes: usize,
    state: RwLock<Option<Arc<OpenIndex>>>,
}

impl TantivyBackend {
    /// Backend for an index stored under `path`
    pub fn on_disk(path: impl Into<PathBuf>, config: &IndexConfig) -> Self {
        Self::with_storage(Storage::Disk(path.into()), config)
    }

    /// Backend for an index held in RAM
    pub fn in_memory(config: &IndexConfig) -> Self {
        Self::with_storage(Storage::Memory(RamDirectory::create()), config)
    }

    fn with_storage(storage: Storage, config: &IndexConfig) -> Self {
        Self {
            index_name: config.name.clone(),
            storage,
            schema: SchemaManager::new(config.ngram_min, config.ngram_max),
            writer_memory_bytes: config.writer_memory_bytes,
            state: RwLock::new(None),
        }
    }

    fn open_index(&self) -> IndexResult<Arc<OpenIndex>> {
        self.state
            .read()
            .clone()
            .ok_or_else(|| IndexError::NotReady(self.index_name.clone()))
    }

    fn directory(&self) -> IndexResult<Box<dyn Directory>> {
        Ok(match &self.storage {
            Storage::Disk(path) => {
                std::fs::create_dir_all(path)?;
                Box::new(MmapDirectory::open(path)?)
            }
            Storage::Memory(dir) => Box::new(dir.clone()),
        })
    }

    /// Apply writer operations and commit them, rolling back on failure
    fn commit_with<F>(&self, open: &OpenIndex, ops: F) -> IndexResult<()>
    where
        F: FnOnce(&IndexWriter, &Fields) -> IndexResult<()>,
    {
        let mut writer = open.writer.lock();
        let applied = match ops(&*writer, &open.fields) {
            Ok(()) => writer.commit().map(|_| ()).map_err(IndexError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = applied {
            if let Err(rollback) = writer.rollback() {
                warn!(index = %self.index_name, error = %rollback, "Index rollback failed");
            }
            return Err(e);
        }
        drop(writer);
        open.reader.reload()?;
        Ok(())
    }
}

fn to_tantivy(fields: &Fields, doc: &IndexDocument) -> IndexResult<TantivyDocument> {
    let source = serde_json::to_string(doc).map_err(|source| IndexError::CorruptDocument {
        id: doc.candidate_id.clone(),
        source,
    })?;

    let mut out = TantivyDocument::default();
    out.add_text(fields.get(IndexField::CandidateId), &doc.candidate_id);
    out.add_u64(fields.get(IndexField::IdKey), tie_break_key(&doc.candidate_id));
    out.add_text(fields.get(IndexField::Source), &source);

    let mut add_all = |targets: &[IndexField], value: &str| {
        if !value.is_empty() {
            for field in targets {
                out.add_text(fields.get(*field), value);
            }
        }
    };

    if let Some(name) = &doc.name {
        add_all(&[IndexField::Name, IndexField::NameKeyword, IndexField::NameNgram], name);
    }
    add_all(&[IndexField::Designation, IndexField::DesignationNgram], &doc.designation);
    for skill in &doc.skills {
        add_all(
            &[IndexField::Skills, IndexField::SkillsKeyword, IndexField::SkillsNgram],
            skill,
        );
    }
    for skill in &doc.top_skills {
        add_all(
            &[
                IndexField::TopSkills,
                IndexField::TopSkillsKeyword,
                IndexField::TopSkillsNgram,
            ],
            skill,
        );
    }
    add_all(&[IndexField::RecentCompany], &doc.recent_company);
    for company in &doc.company_names_all {
        add_all(&[IndexField::CompanyNamesAll], company);
    }
    add_all(&[IndexField::ResumeText], &doc.resume_text);
    for keyword in &doc.resume_keywords {
        add_all(&[IndexField::ResumeKeywords], keyword);
    }
    add_all(
        &[IndexField::Location, IndexField::LocationKeyword, IndexField::LocationNgram],
        &doc.location,
    );
    add_all(&[IndexField::Portal], &doc.portal);

    out.add_f64(fields.get(IndexField::Experience), doc.experience);
    out.add_f64(fields.get(IndexField::CtcCurrent), doc.ctc_current);
    out.add_f64(fields.get(IndexField::CtcExpected), doc.ctc_expected);
    if let Some(date) = doc.portal_date {
        out.add_date(
            fields.get(IndexField::PortalDate),
            tantivy::DateTime::from_timestamp_secs(date.timestamp()),
        );
    }
    if let Some(date) = doc.apply_date {
        out.add_date(
            fields.get(IndexField::ApplyDate),
            tantivy::DateTime::from_timestamp_secs(date.timestamp()),
        );
    }
    Ok(out)
}

impl SearchBackend for TantivyBackend {
    fn ensure_index(&self) -> IndexResult<IndexStatus> {
        let mut state = self.state.write();
        if state.is_some() {
            return Ok(IndexStatus::AlreadyExists);
        }

        let ensured = self.schema.ensure(&self.index_name, self.directory()?)?;
        let writer = ensured.index.writer_with_num_threads(1, self.writer_memory_bytes)?;
        let reader = ensured
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        *state = Some(Arc::new(OpenIndex {
            index: ensured.index,
            fields: ensured.fields,
            writer: Mutex::new(writer),
            reader,
        }));
        Ok(ensured.status)
    }

    fn is_ready(&self) -> bool {
        self.state.read().is_some()
    }

    fn index_document(&self, document: &IndexDocument) -> IndexResult<()> {
        self.index_documents(std::slice::from_ref(document))
    }

    fn index_documents(&self, documents: &[IndexDocument]) -> IndexResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let open = self.open_index()?;
        let converted = documents
            .iter()
            .map(|doc| to_tantivy(&open.fields, doc))
            .collect::<IndexResult<Vec<_>>>()?;

        self.commit_with(&open, |writer, fields| {
            let id_field = fields.get(IndexField::CandidateId);
            for (doc, converted) in documents.iter().zip(converted) {
                writer.delete_term(Term::from_field_text(id_field, &doc.candidate_id));
                writer.add_document(converted)?;
            }
            Ok(())
        })?;
        debug!(index = %self.index_name, count = documents.len(), "Indexed documents");
        Ok(())
    }

    fn delete_document(&self, candidate_id: &str) -> IndexResult<()> {
        let open = self.open_index()?;
        self.commit_with(&open, |writer, fields| {
            writer.delete_term(Term::from_field_text(fields.get(IndexField::CandidateId), candidate_id));
            Ok(())
        })
    }

    fn search(&self, query: &BoolQuery, offset: usize, limit: usize) -> IndexResult<SearchPage> {
        let open = self.open_index()?;
        let searcher = open.reader.searcher();
        let translated = Translator {
            index: &open.index,
            fields: &open.fields,
            searcher: &searcher,
        }
        .bool_query(query)?;

        if limit == 0 {
            let total = searcher.search(translated.as_ref(), &Count)?;
            return Ok(SearchPage {
                hits: Vec::new(),
                total: total as u64,
            });
        }

        // Equal scores fall back to the id key, lowest first
        let id_key = IndexField::IdKey.name();
        let top = TopDocs::with_limit(limit)
            .and_offset(offset)
            .tweak_score(move |segment_reader: &SegmentReader| {
                let keys = segment_reader.fast_fields().u64(id_key).ok();
                move |doc: DocId, score: Score| {
                    let key = keys.as_ref().and_then(|c| c.first(doc)).unwrap_or(u64::MAX);
                    (score, Reverse(key))
                }
            });

        let (top_docs, total) = searcher.search(translated.as_ref(), &(top, Count))?;

        let source_field = open.fields.get(IndexField::Source);
        let id_field = open.fields.get(IndexField::CandidateId);
        let mut hits = Vec::with_capacity(top_docs.len());
        for ((score, _), address) in top_docs {
            let stored: TantivyDocument = searcher.doc(address)?;
            let id = stored
                .get_first(id_field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let raw = stored.get_first(source_field).and_then(|v| v.as_str()).unwrap_or("{}");
            let source: IndexDocument =
                serde_json::from_str(raw).map_err(|source| IndexError::CorruptDocument { id: id.clone(), source })?;
            hits.push(SearchHit { id, score, source });
        }

        Ok(SearchPage {
            hits,
            total: total as u64,
        })
    }

    fn count(&self) -> IndexResult<u64> {
        Ok(self.open_index()?.reader.searcher().num_docs())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CLAUSE TRANSLATION
// ─────────────────────────────────────────────────────────────────────────────

struct Translator<'a> {
    index: &'a Index,
    fields: &'a Fields,
    searcher: &'a Searcher,
}

impl Translator<'_> {
    fn bool_query(&self, query: &BoolQuery) -> IndexResult<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for clause in &query.must {
            clauses.push((Occur::Must, self.clause(clause)?));
        }
        for clause in &query.filter {
            clauses.push((Occur::Must, Box::new(ConstScoreQuery::new(self.clause(clause)?, 0.0))));
        }
        for clause in &query.should {
            clauses.push((Occur::Should, self.clause(clause)?));
        }

        let mut bool_query = BooleanQuery::new(clauses);
        if query.minimum_should_match > 0 && !query.should.is_empty() {
            bool_query.set_minimum_number_should_match(query.minimum_should_match);
        }
        Ok(Box::new(bool_query))
    }

    fn clause(&self, clause: &Clause) -> IndexResult<Box<dyn Query>> {
        match clause {
            Clause::Term { field, value, boost } => {
                let terms = self.analyze(*field, value)?;
                Ok(boosted(all_of(terms.into_iter().map(term_query).collect()), *boost))
            }
            Clause::Phrase { field, text, boost } => {
                let mut terms = self.analyze(*field, text)?;
                let query: Box<dyn Query> = match terms.len() {
                    0 => Box::new(EmptyQuery),
                    1 => term_query(terms.remove(0)),
                    _ => Box::new(PhraseQuery::new(terms)),
                };
                Ok(boosted(query, *boost))
            }
            Clause::Match {
                field,
                text,
                operator,
                fuzziness,
                boost,
            } => {
                let per_token = self
                    .tokens(*field, text)?
                    .iter()
                    .map(|token| self.fuzzy_token(*field, token, *fuzziness))
                    .collect::<IndexResult<Vec<_>>>()?;
                let query = match operator {
                    Operator::And => all_of(per_token),
                    Operator::Or => any_of(per_token),
                };
                Ok(boosted(query, *boost))
            }
            Clause::Range { field, gte, lte } => {
                let handle = self.numeric(*field)?;
                let term = |v: f64| Term::from_field_f64(handle, v);
                let (lower, upper) = match (gte, lte) {
                    (None, None) => (Bound::Included(term(f64::MIN)), Bound::Included(term(f64::MAX))),
                    (gte, lte) => (
                        gte.map_or(Bound::Unbounded, |v| Bound::Included(term(v))),
                        lte.map_or(Bound::Unbounded, |v| Bound::Included(term(v))),
                    ),
                };
                Ok(Box::new(RangeQuery::new(lower, upper)))
            }
            Clause::Missing { field } => {
                let handle = self.numeric(*field)?;
                let exists = RangeQuery::new(
                    Bound::Included(Term::from_field_f64(handle, f64::MIN)),
                    Bound::Included(Term::from_field_f64(handle, f64::MAX)),
                );
                Ok(Box::new(BooleanQuery::new(vec![
                    (Occur::Must, Box::new(AllQuery) as Box<dyn Query>),
                    (Occur::MustNot, Box::new(exists)),
                ])))
            }
            Clause::Wildcard { field, pattern } => {
                if field.kind() != FieldKind::Keyword {
                    return Err(IndexError::UnsupportedClause {
                        field: field.to_string(),
                        reason: "wildcards apply to keyword fields only".into(),
                    });
                }
                let regex = match pattern {
                    WildcardPattern::Leading(v) => format!("{} .*", regex::escape(&v.to_lowercase())),
                    WildcardPattern::Trailing(v) => format!(".* {}", regex::escape(&v.to_lowercase())),
                    WildcardPattern::Contains(v) => format!(".*{}.*", regex::escape(&v.to_lowercase())),
                };
                Ok(Box::new(RegexQuery::from_pattern(&regex, self.fields.get(*field))?))
            }
            Clause::Bool(inner) => self.bool_query(inner),
        }
    }

    fn numeric(&self, field: IndexField) -> IndexResult<Field> {
        if field.kind() != FieldKind::Float {
            return Err(IndexError::UnsupportedClause {
                field: field.to_string(),
                reason: "range and missing checks apply to numeric fields only".into(),
            });
        }
        Ok(self.fields.get(field))
    }

    /// Run `text` through the analyzer registered for `field`
    fn tokens(&self, field: IndexField, text: &str) -> IndexResult<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.get(field))?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        Ok(tokens)
    }

    fn analyze(&self, field: IndexField, text: &str) -> IndexResult<Vec<Term>> {
        let handle = self.fields.get(field);
        Ok(self
            .tokens(field, text)?
            .iter()
            .map(|token| Term::from_field_text(handle, token))
            .collect())
    }

    fn fuzzy_token(&self, field: IndexField, token: &str, fuzziness: Fuzziness) -> IndexResult<Box<dyn Query>> {
        let term = Term::from_field_text(self.fields.get(field), token);
        match fuzziness {
            Fuzziness::Exact => Ok(term_query(term)),
            Fuzziness::Auto => match auto_edit_distance(token.chars().count()) {
                0 => Ok(term_query(term)),
                distance => Ok(Box::new(FuzzyTermQuery::new(term, distance, true))),
            },
            Fuzziness::Edits { distance: 0, .. } => Ok(term_query(term)),
            Fuzziness::Edits {
                distance,
                prefix_length,
                max_expansions,
            } => {
                let expanded = self.expand(field, token, distance, prefix_length, max_expansions)?;
                Ok(any_of(expanded.into_iter().map(term_query).collect()))
            }
        }
    }

    /// Index terms within `distance` edits of `token` that share its first
    /// `prefix_length` characters, closest first, at most `max_expansions`.
    fn expand(
        &self,
        field: IndexField,
        token: &str,
        distance: u8,
        prefix_length: usize,
        max_expansions: usize,
    ) -> IndexResult<Vec<Term>> {
        let handle = self.fields.get(field);
        let prefix: String = token.chars().take(prefix_length).collect();
        let token_len = token.chars().count();
        let max = usize::from(distance);

        let mut matches: BTreeSet<(usize, String)> = BTreeSet::new();
        for segment in self.searcher.segment_readers() {
            let inverted = segment.inverted_index(handle)?;
            let mut stream = inverted.terms().range().ge(prefix.as_bytes()).into_stream()?;
            while stream.advance() {
                let key = stream.key();
                if !key.starts_with(prefix.as_bytes()) {
                    break;
                }
                let Ok(candidate) = std::str::from_utf8(key) else {
                    continue;
                };
                if candidate.chars().count().abs_diff(token_len) > max {
                    continue;
                }
                let edits = strsim::osa_distance(token, candidate);
                if edits <= max {
                    matches.insert((edits, candidate.to_string()));
                }
            }
        }

        Ok(matches
            .into_iter()
            .take(max_expansions)
            .map(|(_, text)| Term::from_field_text(handle, &text))
            .collect())
    }
}

fn term_query(term: Term) -> Box<dyn Query> {
    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
}

fn boosted(query: Box<dyn Query>, boost: f32) -> Box<dyn Query> {
    if (boost - 1.0).abs() < f32::EPSILON {
        query
    } else {
        Box::new(BoostQuery::new(query, boost))
    }
}

fn any_of(mut queries: Vec<Box<dyn Query>>) -> Box<dyn Query> {
    match queries.len() {
        0 => Box::new(EmptyQuery),
        1 => queries.remove(0),
        _ => Box::new(BooleanQuery::new(
            queries.into_iter().map(|q| (Occur::Should, q)).collect(),
        )),
    }
}

fn all_of(mut queries: Vec<Box<dyn Query>>) -> Box<dyn Query> {
    match queries.len() {
        0 => Box::new(EmptyQuery),
        1 => queries.remove(0),
        _ => Box::new(BooleanQuery::new(
            queries.into_iter().map(|q| (Occur::Must, q)).collect(),
        )),
    }
}
