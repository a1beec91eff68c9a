//! Offline catalog maintenance: report likely duplicate names at one
//! catalog level, ranked by similarity.

use anyhow::Result;
use clap::Parser;
use musicmuse_query::matching::{duplicate_pairs, Candidate};
use musicmuse_query::{EntityLevel, HistoryStore, SqliteHistoryStore};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite history database file.
    pub history_db: PathBuf,

    /// Catalog level to scan: artist, album or track.
    #[clap(long, default_value = "artist")]
    pub level: String,

    /// Minimum similarity for a pair to be reported.
    #[clap(long, default_value_t = 0.8)]
    pub threshold: f64,
}

fn parse_level(s: &str) -> Result<EntityLevel> {
    match s {
        "artist" => Ok(EntityLevel::Artist),
        "album" => Ok(EntityLevel::Album),
        "track" => Ok(EntityLevel::Track),
        other => anyhow::bail!("Unknown catalog level: {}", other),
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let level = parse_level(&cli_args.level)?;
    let store = SqliteHistoryStore::open(&cli_args.history_db)?;
    let candidates: Vec<Candidate> = store
        .catalog_names(level)?
        .into_iter()
        .map(|n| Candidate {
            id: n.id,
            name: n.name,
        })
        .collect();
    info!(
        "Scanning {} {} names for duplicates (threshold {})",
        candidates.len(),
        cli_args.level,
        cli_args.threshold
    );

    let pairs = duplicate_pairs(&candidates, cli_args.threshold);
    if pairs.is_empty() {
        println!("No likely duplicates found.");
        return Ok(());
    }
    for (a, b, score) in pairs {
        println!(
            "{:.2}  \"{}\" ({})  <->  \"{}\" ({})",
            score, candidates[a].name, candidates[a].id, candidates[b].name, candidates[b].id
        );
    }
    Ok(())
}
