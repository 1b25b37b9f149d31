use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::cache::PostCache;
use gator::commands::{self, Command};
use gator::config::Config;
use gator::db::Database;
use gator::fetcher::Fetcher;
use gator::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "gator", version, about = "A multi-user RSS aggregator")]
struct Cli {
    /// Config file (defaults to ~/.gatorconfig.toml)
    #[arg(long, env = "GATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Where `browse` remembers its results for `openpost`
    #[arg(long, env = "GATOR_POST_CACHE")]
    post_cache: Option<PathBuf>,

    /// Command to run; `help` lists them
    command: String,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.db_url = url;
    }
    debug!("Using config {}", config_path.display());

    let db = Database::new(&config.db_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_url))?;
    db.initialize().await?;
    info!("Database ready");

    let fetcher = Fetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
    let cache = PostCache::new(cli.post_cache.unwrap_or_else(PostCache::default_path));

    let state = AppState::new(db, config, config_path, fetcher).with_cache(cache);
    let registry = commands::registry();

    registry
        .dispatch(&state, &Command::new(cli.command, cli.args))
        .await?;

    Ok(())
}
