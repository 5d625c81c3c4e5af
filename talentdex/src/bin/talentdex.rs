//! talentdex command-line interface
//!
//! ```bash
//! talentdex ensure-index
//! talentdex import candidates.jsonl
//! talentdex search -q "rahul" --skill java --max-exp 5
//! talentdex search -q "rahul" --explain
//! talentdex reindex
//! ```

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use talentdex::{CandidateRecord, Config, SearchParams, TalentApi, TalentStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "talentdex", version, about)]
struct Cli {
    /// Config file (default: $TALENTDEX_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the search index if it does not exist
    EnsureIndex,
    /// Import candidates from a JSON-lines file
    Import {
        path: PathBuf,
        /// File containing extracted resume text per candidate, as JSON lines
        /// of `{"unique_id": .., "text": ..}`
        #[arg(long)]
        resumes: Option<PathBuf>,
    },
    /// Search candidates
    Search {
        #[arg(short, long)]
        q: Option<String>,
        /// Resume keyword; repeatable
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        designation: Option<String>,
        /// Required skill; repeatable
        #[arg(short, long = "skill")]
        skills: Vec<String>,
        #[arg(long)]
        min_exp: Option<String>,
        #[arg(long)]
        max_exp: Option<String>,
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        size: Option<String>,
        /// Print the compiled query instead of running it
        #[arg(long)]
        explain: bool,
    },
    /// Rebuild the index from the primary store
    Reindex,
    /// Fetch one candidate from the primary store
    Get { id: String },
    /// Delete a candidate
    Delete { id: String },
    /// Show store, index and worker counters
    Stats,
}

#[derive(serde::Deserialize)]
struct ResumeLine {
    unique_id: String,
    text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info,talentdex=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,talentdex=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }
    std::fs::create_dir_all(&config.store.data_dir)
        .with_context(|| format!("creating {}", config.store.data_dir.display()))?;

    let store = TalentStore::open(&config).context("opening store")?;

    match cli.command {
        Command::EnsureIndex => {
            println!("index {} ready ({} documents)", config.index.name, store.index_count()?);
        }
        Command::Import { path, resumes } => {
            let imported = import_candidates(&store, &path)?;
            let attached = match resumes {
                Some(path) => import_resumes(&store, &path)?,
                None => 0,
            };
            store.flush_indexing().await;
            let stats = store.indexing_stats();
            if stats.dropped > 0 || stats.failed > 0 {
                warn!(dropped = stats.dropped, failed = stats.failed, "Index behind after import, reindexing");
                store.reindex().await?;
            }
            println!(
                "imported {imported} candidates, {attached} resumes; indexed {} (failed {}, dropped {})",
                stats.completed, stats.failed, stats.dropped
            );
        }
        Command::Search {
            q,
            keywords,
            location,
            designation,
            skills,
            min_exp,
            max_exp,
            page,
            size,
            explain,
        } => {
            let params = SearchParams {
                q,
                keywords,
                location,
                designation,
                skills,
                min_exp,
                max_exp,
                page,
                size,
            };
            if explain {
                let compiled = store.explain(&params)?;
                println!("{}", serde_json::to_string_pretty(&compiled)?);
            } else {
                let response = store.search(params).await?;
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
        }
        Command::Reindex => {
            let report = store.reindex().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Get { id } => match store.get_candidate(&id)? {
            Some(stored) => println!("{}", serde_json::to_string_pretty(&stored.record)?),
            None => {
                eprintln!("candidate {id} not found");
                std::process::exit(1);
            }
        },
        Command::Delete { id } => {
            let removed = store.delete_candidate(&id)?;
            store.flush_indexing().await;
            println!("{}", if removed { "deleted" } else { "not found" });
        }
        Command::Stats => {
            let stats = serde_json::json!({
                "candidates": store.candidate_count()?,
                "indexed": store.index_count()?,
                "worker": store.indexing_stats(),
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    store.shutdown().await;
    Ok(())
}

fn import_candidates(store: &TalentStore, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut imported = 0;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CandidateRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping malformed candidate");
                continue;
            }
        };
        store.save_candidate(record)?;
        imported += 1;
    }
    info!(imported, path = %path.display(), "Import finished");
    Ok(imported)
}

fn import_resumes(store: &TalentStore, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut attached = 0;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let resume: ResumeLine = serde_json::from_str(&line).context("parsing resume line")?;
        match store.attach_resume(&resume.unique_id, resume.text) {
            Ok(_) => attached += 1,
            Err(e) => warn!(candidate_id = %resume.unique_id, error = %e, "Resume not attached"),
        }
    }
    Ok(attached)
}
