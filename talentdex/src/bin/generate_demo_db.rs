//! Generate a synthetic candidate corpus for demos and load testing.
//!
//! Writes through `TalentStore`, so the primary store and the index are both
//! populated exactly as the service would populate them.
//!
//! Usage:
//!     cargo run --release --bin generate-demo-db -- --count 5000 --data-dir demo-data

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use talentdex::{CandidateRecord, Config, ListField, Scalar, TalentApi, TalentStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of candidates to generate
    #[arg(short, long, default_value_t = 1000)]
    count: usize,

    /// Directory for the database and index (replaced if it exists)
    #[arg(short, long, default_value = "demo-data")]
    data_dir: PathBuf,

    /// Seed for reproducible output
    #[arg(short, long, default_value_t = 7)]
    seed: u64,
}

const FIRST_NAMES: &[&str] = &[
    "Rahul", "Rahil", "Priya", "Anand", "Anant", "Meera", "Arjun", "Kavya", "Rohan", "Sneha", "Vikram", "Asha",
    "Nikhil", "Pooja", "Sanjay", "Divya", "Karan", "Neha", "Aditya", "Isha",
];

const LAST_NAMES: &[&str] = &[
    "Singh", "Sharma", "Kumar", "Nair", "Iyer", "Patel", "Reddy", "Gupta", "Mehta", "Das", "Rao", "Joshi",
];

const DESIGNATIONS: &[&str] = &[
    "Software Engineer",
    "Senior Software Engineer",
    "Java Developer",
    "Frontend Developer",
    "Data Analyst",
    "DevOps Engineer",
    "Engineering Manager",
    "QA Engineer",
    "Product Manager",
    "Business Analyst",
];

const SKILLS: &[&str] = &[
    "Java", "Spring Boot", "Python", "Django", "React", "Angular", "Node.js", "AWS", "Azure", "Docker",
    "Kubernetes", "Terraform", "SQL", "PostgreSQL", "Kafka", "Go", "Rust", "Selenium", "Tableau", "Excel",
];

const COMPANIES: &[&str] = &[
    "Infosys", "Wipro", "Tata Consultancy Services", "HCL Technologies", "Accenture", "Flipkart", "Zomato",
    "Freshworks", "Mindtree", "Tech Mahindra",
];

const LOCATIONS: &[&str] = &[
    "Bengaluru", "Pune", "Hyderabad", "Chennai", "New Delhi", "Gurgaon", "Noida", "Mumbai", "Panipat", "Kochi",
];

const PORTALS: &[&str] = &["naukri", "linkedin", "indeed", "referral"];

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values[rng.gen_range(0..values.len())]
}

fn pick_many(rng: &mut StdRng, values: &[&str], max: usize) -> Vec<String> {
    let n = rng.gen_range(1..=max);
    let mut picked: Vec<String> = Vec::with_capacity(n);
    while picked.len() < n {
        let value = pick(rng, values);
        if !picked.iter().any(|p| p == value) {
            picked.push(value.to_string());
        }
    }
    picked
}

fn generate_candidate(rng: &mut StdRng, i: usize) -> CandidateRecord {
    let mut record = CandidateRecord::new(format!("cand-{i:06}"));

    // Vary which name field is filled, as real imports do
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    match rng.gen_range(0..4) {
        0 => record.full_name = Some(format!("{first} {last}")),
        1 => record.name = Some(format!("{first} {last}")),
        2 => {
            record.first_name = Some(first.to_string());
            record.last_name = Some(last.to_string());
        }
        _ => record.candidate_name = Some(format!("{first} {last}")),
    }

    record.designation = Some(pick(rng, DESIGNATIONS).to_string());

    let skills = pick_many(rng, SKILLS, 6);
    record.top_skills = Some(ListField::many(skills.iter().take(2).cloned()));
    record.skills = Some(ListField::many(skills));

    let companies = pick_many(rng, COMPANIES, 3);
    record.recent_company = companies.first().cloned();
    record.company_names_all = Some(ListField::many(companies));

    record.location = Some(pick(rng, LOCATIONS).to_string());

    // Some candidates have no experience recorded at all
    if rng.gen_bool(0.85) {
        let years: u32 = rng.gen_range(0..=20);
        record.experience = Some(if rng.gen_bool(0.5) {
            Scalar::from(format!("{years} years").as_str())
        } else {
            Scalar::from(f64::from(years))
        });
    }
    record.curr_ctc = Some(Scalar::from(f64::from(rng.gen_range(3..=60u32)) * 100_000.0));
    record.exp_ctc = Some(Scalar::from(f64::from(rng.gen_range(4..=80u32)) * 100_000.0));

    record.portal = Some(pick(rng, PORTALS).to_string());
    record.portal_date = Some(format!("2024-{:02}-{:02}", rng.gen_range(1..=12), rng.gen_range(1..=28)));
    record
}

fn resume_for(rng: &mut StdRng, record: &CandidateRecord) -> String {
    let designation = record.designation.as_deref().unwrap_or("Engineer");
    let company = record.recent_company.as_deref().unwrap_or("a product company");
    let skills = pick_many(rng, SKILLS, 5).join(", ");
    format!(
        "{designation} at {company}. Worked with {skills}. \
         Delivered production systems using {skills} and mentored junior engineers."
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn,talentdex=info"))
        .with_target(false)
        .init();

    if args.data_dir.exists() {
        std::fs::remove_dir_all(&args.data_dir)
            .with_context(|| format!("removing {}", args.data_dir.display()))?;
    }
    std::fs::create_dir_all(&args.data_dir)?;

    let config = Config::with_data_dir(&args.data_dir);
    let store = TalentStore::open(&config).context("opening store")?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    println!("Generating {} candidates into {}", args.count, args.data_dir.display());
    for i in 0..args.count {
        let record = generate_candidate(&mut rng, i);
        let id = record.id.clone();
        let with_resume = rng.gen_bool(0.6);
        let resume = with_resume.then(|| resume_for(&mut rng, &record));

        store.save_candidate(record)?;
        if let Some(text) = resume {
            store.attach_resume(&id, text)?;
        }

        if (i + 1) % 500 == 0 {
            // Keep the background queue from overflowing
            store.flush_indexing().await;
            println!("  Generated {}/{} candidates...", i + 1, args.count);
        }
    }
    store.flush_indexing().await;

    let stats = store.indexing_stats();
    if stats.dropped > 0 || stats.failed > 0 {
        store.reindex().await?;
    }

    println!();
    println!("Candidates: {}", store.candidate_count()?);
    println!("Indexed:    {}", store.index_count()?);
    store.shutdown().await;
    Ok(())
}
