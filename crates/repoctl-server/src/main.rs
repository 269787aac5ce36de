use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use repoctl_config::Config;
use repoctl_db::DbConfig;
use repoctl_server::{AppState, build_app};

#[derive(Parser, Debug)]
#[command(name = "repoctl-server", version, about = "repoctl HTTP service")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Path to the repoctl.toml configuration file.
    #[arg(long, default_value = "repoctl.toml")]
    config: PathBuf,

    /// Postgres connection string (overrides `[database]` in the config file).
    #[arg(long, env = "REPOCTL_DATABASE_URL")]
    database_url: Option<String>,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("repoctl=debug,tower_http=debug")
    } else {
        EnvFilter::new("repoctl=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = if args.config.is_file() {
        Config::load(&args.config).with_context(|| format!("loading config from {}", args.config.display()))?
    } else {
        Config::default()
    };

    let database_url = args
        .database_url
        .context("database URL required: pass --database-url or set REPOCTL_DATABASE_URL")?;
    let pool = repoctl_db::connect(&DbConfig { url: database_url, max_connections: 10 })
        .await
        .context("connecting to database")?;

    let state = Arc::new(AppState::new(pool, config)?);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!(bind = %args.bind, "repoctl-server listening");

    axum::serve(listener, app).await.context("serve")
}
