//! Batch loader CLI (§4.1, §6 "Exit codes"): walks one tenant's
//! `loadtab`, guarded by the process-wide advisory lock that keeps two
//! concurrent loader runs for the same tenant from racing (§5
//! "Database concurrency").

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use repoctl_config::Config;
use repoctl_db::DbConfig;
use repoctl_loader::{ConsoleReporter, Reporter, reload_tenant};
use repoctl_types::manifest::parse_loadtab;

#[derive(Parser, Debug)]
#[command(name = "repoctl-load", version, about = "repoctl repository loader")]
struct Args {
    /// Tenant to reload (empty string for single-tenant mode).
    #[arg(long, default_value = "")]
    tenant: String,

    /// Path to the tenant's loadtab file.
    #[arg(long)]
    loadtab: PathBuf,

    /// Path to the repoctl.toml configuration file.
    #[arg(long, default_value = "repoctl.toml")]
    config: PathBuf,

    /// Postgres connection string.
    #[arg(long, env = "REPOCTL_DATABASE_URL")]
    database_url: Option<String>,

    /// Fetch tool to invoke for repositories that need re-fetching.
    #[arg(long, default_value = "git")]
    fetch_tool: String,

    /// Force a reload of every repository regardless of change detection.
    #[arg(long)]
    forced: bool,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_defaults_to_single_tenant_mode() {
        let args = Args::parse_from(["repoctl-load", "--loadtab", "tenant.loadtab"]);
        assert_eq!(args.tenant, "");
        assert_eq!(args.fetch_tool, "git");
        assert!(!args.forced);
    }

    #[test]
    fn loadtab_is_required() {
        let result = Args::try_parse_from(["repoctl-load"]);
        assert!(result.is_err());
    }

    #[test]
    fn explicit_tenant_and_flags_are_parsed() {
        let args = Args::parse_from([
            "repoctl-load",
            "--tenant",
            "acme",
            "--loadtab",
            "acme.loadtab",
            "--forced",
            "--fetch-tool",
            "hg",
        ]);
        assert_eq!(args.tenant, "acme");
        assert_eq!(args.fetch_tool, "hg");
        assert!(args.forced);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<i32> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("repoctl=debug")
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
    let pool = repoctl_db::connect(&DbConfig { url: database_url, max_connections: 5 })
        .await
        .context("connecting to database")?;

    let lock_acquired = repoctl_db::try_advisory_lock(&pool, &args.tenant)
        .await
        .context("acquiring advisory lock")?;
    if !lock_acquired {
        eprintln!("error: another loader is already running for tenant {:?}", args.tenant);
        return Ok(2);
    }

    let loadtab_text = std::fs::read_to_string(&args.loadtab)
        .with_context(|| format!("reading loadtab {}", args.loadtab.display()))?;
    let loadtab = parse_loadtab(&loadtab_text).with_context(|| format!("parsing loadtab {}", args.loadtab.display()))?;

    let mut reporter = ConsoleReporter;
    let result = reload_tenant(
        &pool,
        &args.tenant,
        &loadtab,
        &args.fetch_tool,
        config.loader.fetch_retry_attempts,
        args.forced,
        config.loader.ignore_unresolved,
        &mut reporter,
    )
    .await;

    repoctl_db::release_advisory_lock(&pool, &args.tenant)
        .await
        .context("releasing advisory lock")?;

    match &result {
        Ok(outcome) => reporter.info(&format!(
            "reloaded {} repositories ({} skipped), {} packages loaded",
            outcome.reloaded_repositories.len(),
            outcome.skipped_repositories.len(),
            outcome.loaded_packages
        )),
        Err(err) => reporter.error(&format!("reload failed: {err}")),
    }

    Ok(repoctl_loader::exit_code(lock_acquired, &result))
}
