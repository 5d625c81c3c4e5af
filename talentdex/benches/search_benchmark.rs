use criterion::{criterion_group, criterion_main, Criterion};
use talentdex::{CandidateRecord, Config, ListField, Scalar, SearchParams, TalentApi, TalentStore};

const NAMES: &[&str] = &["Rahul Singh", "Rahil Kumar", "Priya Sharma", "Anand Iyer", "Meera Nair", "Arjun Rao"];
const DESIGNATIONS: &[&str] = &["Java Developer", "Software Engineer", "Data Analyst", "DevOps Engineer"];
const SKILLS: &[&str] = &["Java", "Python", "AWS", "Kubernetes", "React", "SQL", "Kafka"];
const LOCATIONS: &[&str] = &["Bengaluru", "Pune", "New Delhi", "Panipat"];

fn setup_store(rt: &tokio::runtime::Runtime, count: usize) -> TalentStore {
    let store = TalentStore::open_in_memory(&Config::default()).expect("Failed to open store");
    for i in 0..count {
        let mut record = CandidateRecord::new(format!("c-{i}"));
        record.name = Some(NAMES[i % NAMES.len()].to_string());
        record.designation = Some(DESIGNATIONS[i % DESIGNATIONS.len()].to_string());
        record.skills = Some(ListField::many([SKILLS[i % SKILLS.len()], SKILLS[(i / 3) % SKILLS.len()]]));
        record.location = Some(LOCATIONS[i % LOCATIONS.len()].to_string());
        record.experience = Some(Scalar::from((i % 15) as f64));
        store.save_candidate(record).unwrap();
        if i % 500 == 499 {
            rt.block_on(store.flush_indexing());
        }
    }
    rt.block_on(store.flush_indexing());
    store
}

fn bench_search(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = setup_store(&rt, 5_000);

    let term = |q: &str| SearchParams {
        q: Some(q.to_string()),
        ..Default::default()
    };
    let queries = vec![
        ("exact_name", term("rahul singh")),
        ("fuzzy_name", term("rahol")),
        ("skill_term", term("kubernetes")),
        ("partial_designation", term("devel")),
        (
            "filters_only",
            SearchParams {
                location: Some("pune".into()),
                skills: vec!["java".into()],
                max_exp: Some("5".into()),
                ..Default::default()
            },
        ),
        (
            "term_and_filters",
            SearchParams {
                q: Some("java developer".into()),
                min_exp: Some("2".into()),
                max_exp: Some("10".into()),
                ..Default::default()
            },
        ),
    ];

    let mut group = c.benchmark_group("search");
    group.sample_size(20);

    for (name, params) in queries {
        group.bench_function(name, |b| {
            b.iter(|| rt.block_on(async { store.search(params.clone()).await.unwrap() }));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
