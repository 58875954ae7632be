use anyhow::Result;
use axum::Router;
use clap::Parser;
use feed::{FeedConfig, HttpSource};
use search_core::{DocumentStore, Indexer, SearchConfig, SearchEngine};
use server::{build_app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Base URL of the NFL data API used by the admin endpoints (key read from FEED_API_KEY)
    #[arg(long, default_value = "http://localhost:8000/api/v1")]
    api_base: String,
    #[arg(long, default_value_t = 12)]
    feed_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::default(),
    };
    if let Some(db) = args.db {
        config.db_path = db;
    }
    let store = DocumentStore::open(&config)?;
    let engine = SearchEngine::new(store.clone(), config.clone());

    let mut feed = FeedConfig::new(&args.api_base)?;
    feed.api_key = std::env::var("FEED_API_KEY").ok();
    feed.timeout = Duration::from_secs(args.feed_timeout_secs);
    let indexer = Indexer::new(store, HttpSource::new(feed)?).with_flush_every(config.flush_every);

    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    if admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin endpoints will reject every request");
    }
    let app: Router = build_app(AppState::new(engine, indexer, admin_token));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, db = %config.db_path.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
