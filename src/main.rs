use anyhow::{Context, Result};
use clap::Parser;
use musicmuse_query::query::SUGGESTED_QUERIES;
use musicmuse_query::{
    answer_query, FileConfig, PipelineConfig, SqliteHistoryStore, TimeUnit, UserContext,
};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

fn parse_time_unit(s: &str) -> Result<TimeUnit> {
    match s {
        "minutes" => Ok(TimeUnit::Minutes),
        "hours" => Ok(TimeUnit::Hours),
        other => anyhow::bail!("Unknown time unit: {} (use minutes or hours)", other),
    }
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite history database file.
    #[clap(value_parser = parse_path)]
    pub history_db: PathBuf,

    /// The question to answer. Omit with --suggest to list examples.
    pub question: Option<String>,

    /// Path to an optional TOML config file with pipeline tunables.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// User whose history to query.
    #[clap(long, default_value_t = 1)]
    pub user_id: i64,

    /// Offset of the user's timezone from UTC, in minutes.
    #[clap(long, default_value_t = 0)]
    pub tz_offset_minutes: i32,

    /// Unit for listening time in the answer: minutes or hours.
    #[clap(long, default_value = "hours")]
    pub time_unit: String,

    /// Print the full response as JSON instead of narrative text.
    #[clap(long)]
    pub json: bool,

    /// List example questions and exit.
    #[clap(long)]
    pub suggest: bool,
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

    if cli_args.suggest {
        for suggestion in SUGGESTED_QUERIES {
            println!("[{}] {}", suggestion.category, suggestion.text);
        }
        return Ok(());
    }

    let question = cli_args
        .question
        .context("No question given (or pass --suggest for examples)")?;
    let time_unit = parse_time_unit(&cli_args.time_unit)?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = PipelineConfig::resolve(file_config);

    info!("Opening SQLite history database at {:?}...", cli_args.history_db);
    let store = SqliteHistoryStore::open(&cli_args.history_db)?;

    let ctx = UserContext::new(cli_args.tz_offset_minutes, time_unit);
    let response = answer_query(&store, cli_args.user_id, &question, &ctx, None, &config);

    if cli_args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.text);
    }
    Ok(())
}
