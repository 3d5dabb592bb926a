use anyhow::{Context, Result};
use clap::Parser;
use rolegate_cache::FileBackend;
use rolegate_permissions::{FailurePolicy, PermissionConfigLoader, PermissionService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod policy;

use commands::Commands;
use policy::PolicyFile;

#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "Layered, cache-backed permission resolution", long_about = None)]
#[command(version)]
struct Cli {
    /// Policy file with role defaults, templates and user roles
    #[arg(long, global = true, env = "ROLEGATE_POLICY")]
    policy: Option<PathBuf>,

    /// Directory holding cached permission records
    #[arg(long, global = true, env = "ROLEGATE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// What gated checks do when the store fails (fail-closed, stale-cache)
    #[arg(long, global = true)]
    failure_policy: Option<FailurePolicy>,

    /// Only accept permissions listed in the catalog
    #[arg(long, global = true)]
    strict_catalog: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn build_service(cli: &Cli) -> Result<PermissionService> {
    let config = PermissionConfigLoader::load().context("failed to load configuration")?;
    let config =
        PermissionConfigLoader::apply_cli_args(config, cli.failure_policy, cli.strict_catalog)?;

    let policy = match &cli.policy {
        Some(path) => PolicyFile::load(path)?,
        None => PolicyFile::default(),
    };

    let backend = match &cli.cache_dir {
        Some(dir) => FileBackend::new(dir, rolegate_core::SystemClock::shared()),
        None => FileBackend::in_user_cache_dir()?,
    };
    tracing::debug!(root = %backend.root().display(), source = ?config.source, "using file cache");

    let service = PermissionService::builder()
        .with_backend(Arc::new(backend))
        .with_role_lookup(Arc::new(policy.directory()))
        .with_role_defaults(policy.role_defaults())
        .with_templates(policy.templates())
        .with_config(config)
        .build()?;
    Ok(service)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let service = build_service(&cli)?;
    cli.command.execute(&service).await
}
