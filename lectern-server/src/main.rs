//! # Lectern Server
//!
//! Device session admission and signed media token gate for the Lectern
//! learning platform.
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for device records, accounts, enrollments and course videos
//! - Redis (optional) for caching active device counts
//! - An RSA private JWK for signing playback tokens

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use lectern_config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use lectern_server::infra::startup::{build_state, connect_pool, postgres_collaborators};
use lectern_server::routes::create_app;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "lectern-server")]
#[command(about = "Device session admission and signed media token gate")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "LECTERN_CONFIG")]
    config: Option<PathBuf>,

    /// Env file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Check database connectivity and exit
    Preflight,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.serve)?;

    if let Some(Command::Db(command)) = cli.command {
        let pool = connect_pool(&config).await?;
        match command {
            DbCommand::Preflight => {
                sqlx::query("SELECT 1")
                    .execute(&pool)
                    .await
                    .context("database preflight failed")?;
                info!("Database preflight passed");
            }
            DbCommand::Migrate => {
                lectern_core::MIGRATOR
                    .run(&pool)
                    .await
                    .context("database migration failed")?;
                info!("Database migrations applied successfully");
            }
        }
        return Ok(());
    }

    run_server(config).await
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Config> {
    let loader = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
        skip_env_file: false,
    });
    let load = loader.load();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lectern_core=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ConfigLoad {
        mut config,
        warnings,
    } = load.context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file in use");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    Ok(config)
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = connect_pool(&config).await?;
    info!("Successfully connected to PostgreSQL");

    lectern_core::MIGRATOR
        .run(&pool)
        .await
        .context("database migration failed")?;

    let collaborators = postgres_collaborators(&config, pool).await;
    let state = build_state(&config, collaborators).map_err(|err| {
        error!(error = %err, "refusing to start with an unusable signing key");
        anyhow::anyhow!(err)
    })?;

    let app = create_app(state);
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "lectern server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
