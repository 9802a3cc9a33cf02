//! fieldreg server entry point

use anyhow::Context;
use clap::Parser;
use fieldreg::cli::serve::ServeArgs;
use fieldreg::cli::{Cli, Commands};
use fieldreg::config::{get_database_url, ReviewConfig};
use fieldreg::db::migrations::initialize_database;
use fieldreg::db::scope::SqliteScopeResolver;
use fieldreg::{logging, server, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::VerifyChain(args)) => {
            let guard = logging::init()?;
            let valid = fieldreg::cli::verify::execute(&args).await?;
            drop(guard);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Serve(args)) => run_server(args).await,
        None => run_server(ServeArgs::default()).await,
    }
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let _guard = logging::init()?;
    let config = ReviewConfig::from_env();

    info!(
        default_cluster_radius_m = config.default_cluster_radius_m,
        busy_timeout_ms = config.busy_timeout.as_millis() as u64,
        "Starting fieldreg"
    );

    let database_url = get_database_url();
    let pool = initialize_database(&database_url, config.busy_timeout)
        .await
        .with_context(|| format!("failed to initialize database at {}", database_url))?;

    let scope_resolver = Arc::new(SqliteScopeResolver::new(pool.clone()));
    let state = AppState::new(pool, config, scope_resolver);

    server::run(state, &args.bind_addr()).await
}
