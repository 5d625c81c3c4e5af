//! End-to-end search behavior through `TalentStore`: ranking, fuzzy matching,
//! filters and pagination against a real in-memory index.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use talentdex::backend::IndexResult;
use talentdex::database::Database;
use talentdex::query::BoolQuery;
use talentdex::{
    CandidateRecord, Config, IndexDocument, IndexStatus, ListField, Scalar, SearchBackend, SearchPage, SearchParams,
    TalentApi, TalentStore,
};

fn candidate(id: &str, name: &str) -> CandidateRecord {
    let mut record = CandidateRecord::new(id);
    record.name = Some(name.to_string());
    record
}

async fn store_with(records: Vec<CandidateRecord>) -> TalentStore {
    let store = TalentStore::open_in_memory(&Config::default()).unwrap();
    for record in records {
        store.save_candidate(record).unwrap();
    }
    store.flush_indexing().await;
    store
}

fn term(q: &str) -> SearchParams {
    SearchParams {
        q: Some(q.to_string()),
        ..Default::default()
    }
}

async fn result_ids(store: &TalentStore, params: SearchParams) -> Vec<String> {
    let response = store.search(params).await.unwrap();
    response.results.into_iter().map(|hit| hit.id).collect()
}

// ============================================================
// Name matching
// ============================================================

#[tokio::test]
async fn exact_name_ranks_above_fuzzy_only_match() {
    let store = store_with(vec![candidate("c-fuzzy", "Rahil Singh"), candidate("c-exact", "Rahul Singh")]).await;

    let response = store.search(term("rahul")).await.unwrap();
    assert_eq!(response.total, 2);
    assert_eq!(response.results[0].id, "c-exact");
    assert_eq!(response.results[1].id, "c-fuzzy");
    assert!(response.results[0].score > response.results[1].score);
}

#[tokio::test]
async fn full_name_match_is_case_insensitive() {
    let store = store_with(vec![candidate("c-1", "Priya Sharma"), candidate("c-2", "Priya Nair")]).await;

    let ids = result_ids(&store, term("PRIYA SHARMA")).await;
    assert_eq!(ids.first().map(String::as_str), Some("c-1"));
}

#[tokio::test]
async fn fuzzy_name_requires_matching_prefix() {
    let store = store_with(vec![candidate("c-1", "Rahul Singh")]).await;

    assert_eq!(result_ids(&store, term("rahol")).await, vec!["c-1"]);
    // First two characters must match exactly
    assert!(result_ids(&store, term("sahul")).await.is_empty());
}

#[tokio::test]
async fn placeholder_name_is_not_searchable() {
    let store = store_with(vec![candidate("c-1", "Unknown")]).await;

    assert!(result_ids(&store, term("unknown")).await.is_empty());
    let stored = store.get_candidate("c-1").unwrap().unwrap();
    assert_eq!(stored.record.name.as_deref(), Some("Unknown"));
}

// ============================================================
// Other fields
// ============================================================

#[tokio::test]
async fn skills_fall_back_to_skills_all() {
    let mut record = candidate("c-1", "Asha Rao");
    record.skills_all = Some(ListField::many(["Kubernetes", "Go"]));
    let store = store_with(vec![record]).await;

    let response = store.search(term("kubernetes")).await.unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].source.skills, vec!["Kubernetes", "Go"]);
}

#[tokio::test]
async fn partial_designation_matches() {
    let mut record = candidate("c-1", "Asha Rao");
    record.designation = Some("Java Developer".to_string());
    let store = store_with(vec![record, candidate("c-2", "Meera Nair")]).await;

    assert_eq!(result_ids(&store, term("develop")).await, vec!["c-1"]);
}

#[tokio::test]
async fn company_history_is_searchable() {
    let mut record = candidate("c-1", "Asha Rao");
    record.recent_company = Some("Freshworks".to_string());
    record.company_names_all = Some(ListField::many(["Freshworks", "Infosys"]));
    let store = store_with(vec![record, candidate("c-2", "Meera Nair")]).await;

    assert_eq!(result_ids(&store, term("infosys")).await, vec!["c-1"]);
    // One edit away from the recent company
    assert_eq!(result_ids(&store, term("freshwork")).await, vec!["c-1"]);
}

// ============================================================
// Filters
// ============================================================

fn experienced(id: &str, years: Option<f64>) -> CandidateRecord {
    let mut record = candidate(id, "Same Name");
    record.experience = years.map(Scalar::from);
    record
}

#[tokio::test]
async fn max_experience_alone_includes_candidates_without_experience() {
    let store = store_with(vec![
        experienced("junior", Some(3.0)),
        experienced("senior", Some(8.0)),
        experienced("unknown", None),
    ])
    .await;

    let ids: HashSet<String> = result_ids(
        &store,
        SearchParams {
            max_exp: Some("5".into()),
            ..Default::default()
        },
    )
    .await
    .into_iter()
    .collect();
    assert_eq!(ids, HashSet::from(["junior".to_string(), "unknown".to_string()]));
}

#[tokio::test]
async fn experience_range_is_inclusive() {
    let store = store_with(vec![
        experienced("two", Some(2.0)),
        experienced("five", Some(5.0)),
        experienced("nine", Some(9.0)),
    ])
    .await;

    let mut ids = result_ids(
        &store,
        SearchParams {
            q: Some("same".into()),
            min_exp: Some("2".into()),
            max_exp: Some("5".into()),
            ..Default::default()
        },
    )
    .await;
    ids.sort();
    assert_eq!(ids, vec!["five", "two"]);
}

#[tokio::test]
async fn experience_text_is_parsed() {
    let mut record = experienced("c-1", None);
    record.experience = Some(Scalar::from("7.5 yrs"));
    let store = store_with(vec![record]).await;

    let response = store.search(term("same")).await.unwrap();
    assert_eq!(response.results[0].source.experience, 7.5);
}

#[tokio::test]
async fn location_filter_matches_inside_longer_values() {
    let mut records = Vec::new();
    for (id, location) in [("exact", "Pune"), ("suffix", "Hinjewadi, Pune"), ("other", "Bengaluru")] {
        let mut record = candidate(id, "Same Name");
        record.location = Some(location.to_string());
        records.push(record);
    }
    let store = store_with(records).await;

    let mut ids = result_ids(
        &store,
        SearchParams {
            location: Some("pune".into()),
            ..Default::default()
        },
    )
    .await;
    ids.sort();
    assert_eq!(ids, vec!["exact", "suffix"]);
}

#[tokio::test]
async fn every_skill_filter_must_match() {
    let mut both = candidate("both", "Same Name");
    both.skills = Some(ListField::many(["Java", "AWS"]));
    let mut top_only = candidate("top-only", "Same Name");
    top_only.skills = Some(ListField::many(["Java"]));
    top_only.top_skills = Some(ListField::many(["AWS"]));
    let mut one = candidate("one", "Same Name");
    one.skills = Some(ListField::many(["Java"]));
    let store = store_with(vec![both, top_only, one]).await;

    let mut ids = result_ids(
        &store,
        SearchParams {
            skills: vec!["java".into(), "aws".into()],
            ..Default::default()
        },
    )
    .await;
    ids.sort();
    assert_eq!(ids, vec!["both", "top-only"]);
}

#[tokio::test]
async fn filters_narrow_scored_results_without_changing_scores() {
    let mut dev = candidate("dev", "Rahul Singh");
    dev.designation = Some("Java Developer".to_string());
    let mut qa = candidate("qa", "Rahul Singh");
    qa.designation = Some("QA Engineer".to_string());
    let store = store_with(vec![dev, qa]).await;

    let unfiltered = store.search(term("rahul")).await.unwrap();
    let filtered = store
        .search(SearchParams {
            q: Some("rahul".into()),
            designation: Some("java developer".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.results[0].id, "dev");
    let before = unfiltered.results.iter().find(|h| h.id == "dev").unwrap().score;
    assert!((filtered.results[0].score - before).abs() < 1e-4);
}

// ============================================================
// Pagination
// ============================================================

#[tokio::test]
async fn pages_partition_equal_scores() {
    let records = (0..5).map(|i| candidate(&format!("c-{i}"), "Same Name")).collect();
    let store = store_with(records).await;

    let mut seen = Vec::new();
    for page in 1..=3 {
        let response = store
            .search(SearchParams {
                q: Some("same".into()),
                page: Some(page.to_string()),
                size: Some("2".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.total, 5);
        assert_eq!(response.page, page);
        seen.extend(response.results.into_iter().map(|h| h.id));
    }
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 5);

    // Stable across repeated requests
    let again = result_ids(
        &store,
        SearchParams {
            q: Some("same".into()),
            size: Some("5".into()),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(again, seen);
}

#[tokio::test]
async fn oversized_page_is_rejected() {
    let store = store_with(Vec::new()).await;
    let err = store
        .search(SearchParams {
            q: Some("x".into()),
            size: Some("1000".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, talentdex::TalentError::InvalidFilter(_)));
}

#[tokio::test]
async fn page_beyond_result_window_is_rejected() {
    let store = store_with(vec![candidate("c-1", "Rahul Singh")]).await;
    let deep = |page: &str| SearchParams {
        q: Some("rahul".into()),
        page: Some(page.into()),
        size: Some("100".into()),
        ..Default::default()
    };

    for page in ["101", "100000000000", &usize::MAX.to_string()] {
        let err = store.search(deep(page)).await.unwrap_err();
        assert!(matches!(err, talentdex::TalentError::InvalidFilter(_)), "page={page}");
    }

    // The last page inside the window is still served
    let response = store.search(deep("100")).await.unwrap();
    assert_eq!(response.total, 1);
    assert!(response.results.is_empty());
}

// ============================================================
// Empty requests
// ============================================================

/// Counts searches; holds no documents
#[derive(Default)]
struct CountingBackend {
    searches: AtomicUsize,
}

impl SearchBackend for CountingBackend {
    fn ensure_index(&self) -> IndexResult<IndexStatus> {
        Ok(IndexStatus::Created)
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn index_document(&self, _document: &IndexDocument) -> IndexResult<()> {
        Ok(())
    }

    fn delete_document(&self, _candidate_id: &str) -> IndexResult<()> {
        Ok(())
    }

    fn search(&self, _query: &BoolQuery, _offset: usize, _limit: usize) -> IndexResult<SearchPage> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(SearchPage::empty())
    }

    fn count(&self) -> IndexResult<u64> {
        Ok(0)
    }
}

#[tokio::test]
async fn empty_request_never_reaches_the_index() {
    let backend = Arc::new(CountingBackend::default());
    let store = TalentStore::with_backend(
        &Config::default(),
        Database::open_in_memory().unwrap(),
        backend.clone(),
    )
    .unwrap();

    let blank = SearchParams {
        q: Some("   ".into()),
        location: Some("".into()),
        ..Default::default()
    };
    let response = store.search(blank).await.unwrap();
    assert_eq!(response.total, 0);
    assert!(response.results.is_empty());
    assert!(store.explain(&SearchParams::default()).unwrap().is_empty());
    assert_eq!(backend.searches.load(Ordering::SeqCst), 0);

    store.search(term("anyone")).await.unwrap();
    assert_eq!(backend.searches.load(Ordering::SeqCst), 1);
}
