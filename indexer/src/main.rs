use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use feed::{FeedConfig, HttpSource};
use search_core::{DataSource, DocType, DocumentStore, Filters, Indexer, SearchConfig, SearchEngine, TermMatch};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

mod files;

use files::FileSource;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, refresh and query the player/team search index", long_about = None)]
struct Cli {
    /// Index directory (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Query term matching: exact or prefix
    #[arg(long, global = true)]
    term_match: Option<TermMatch>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FeedArgs {
    /// Base URL of the NFL data API (key read from FEED_API_KEY)
    #[arg(long, default_value = "http://localhost:8000/api/v1")]
    api_base: String,
    #[arg(long, default_value_t = 100)]
    page_size: usize,
    /// Stop a players listing after this many pages
    #[arg(long, default_value_t = 500)]
    max_pages: usize,
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// Minimum delay between API requests
    #[arg(long, default_value_t = 100)]
    min_interval_ms: u64,
}

impl FeedArgs {
    fn source(&self) -> Result<HttpSource> {
        let mut config = FeedConfig::new(&self.api_base)?;
        config.api_key = std::env::var("FEED_API_KEY").ok();
        config.page_size = self.page_size;
        config.max_pages = self.max_pages;
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.min_interval = Duration::from_millis(self.min_interval_ms);
        HttpSource::new(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the index and re-index from the API
    Rebuild {
        #[arg(long)]
        doc_type: Option<DocType>,
        #[command(flatten)]
        feed: FeedArgs,
    },
    /// Re-fetch and re-index a single player
    UpdatePlayer {
        player_id: String,
        #[command(flatten)]
        feed: FeedArgs,
    },
    /// Index players/teams from JSON or JSONL files (or directories of them)
    Import {
        #[arg(long)]
        players: Option<PathBuf>,
        #[arg(long)]
        teams: Option<PathBuf>,
        /// Clear the imported types first
        #[arg(long, default_value_t = false)]
        rebuild: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Remove documents of one type, or everything
    Clear {
        #[arg(long)]
        doc_type: Option<DocType>,
    },
    Stats,
    Search {
        query: String,
        #[arg(long)]
        doc_type: Option<DocType>,
        /// Metadata filter, key=value; repeatable
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Autocomplete {
        prefix: String,
        #[arg(long)]
        doc_type: Option<DocType>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Most frequent queries
    Popular {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}

fn load_config(cli: &Cli) -> Result<SearchConfig> {
    let mut config = match &cli.config {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(mode) = cli.term_match {
        config.term_match = mode;
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = DocumentStore::open(&config)?;
    let engine = SearchEngine::new(store.clone(), config.clone());

    match cli.command {
        Commands::Rebuild { doc_type, feed } => {
            let indexer = Indexer::new(store.clone(), feed.source()?).with_flush_every(config.flush_every);
            print_json(&indexer.rebuild_index(doc_type).await)?;
        }
        Commands::UpdatePlayer { player_id, feed } => {
            let indexer = Indexer::new(store.clone(), feed.source()?);
            let updated = indexer.update_player_index(&player_id).await;
            print_json(&serde_json::json!({ "player_id": player_id, "updated": updated }))?;
        }
        Commands::Import { players, teams, rebuild, limit } => {
            let source = FileSource::load(players.as_deref(), teams.as_deref())?;
            let indexer = Indexer::new(store.clone(), source).with_flush_every(config.flush_every);
            import(&indexer, players.is_some(), teams.is_some(), rebuild, limit).await?;
        }
        Commands::Clear { doc_type } => {
            let cleared = store.clear_index(doc_type);
            print_json(&serde_json::json!({ "cleared": cleared, "doc_type": doc_type }))?;
        }
        Commands::Stats => print_json(&engine.get_index_stats())?,
        Commands::Search { query, doc_type, filters, limit } => {
            let filters: Filters = filters.into_iter().collect();
            let filters = (!filters.is_empty()).then_some(&filters);
            print_json(&engine.search(&query, doc_type, filters, limit))?;
        }
        Commands::Autocomplete { prefix, doc_type, limit } => print_json(&engine.autocomplete(&prefix, doc_type, limit))?,
        Commands::Popular { limit } => print_json(&engine.get_popular_searches(limit))?,
    }

    store.flush()?;
    Ok(())
}

async fn import<S: DataSource>(indexer: &Indexer<S>, players: bool, teams: bool, rebuild: bool, limit: Option<usize>) -> Result<()> {
    if rebuild && players && teams {
        print_json(&indexer.rebuild_index(None).await)?;
        return Ok(());
    }
    if rebuild && players {
        print_json(&indexer.rebuild_index(Some(DocType::Player)).await)?;
        return Ok(());
    }
    if rebuild && teams {
        print_json(&indexer.rebuild_index(Some(DocType::Team)).await)?;
        return Ok(());
    }
    let players_indexed = if players { indexer.index_all_players(limit).await } else { 0 };
    let teams_indexed = if teams { indexer.index_all_teams().await } else { 0 };
    tracing::info!(players_indexed, teams_indexed, "import complete");
    print_json(&serde_json::json!({ "players_indexed": players_indexed, "teams_indexed": teams_indexed }))
}
