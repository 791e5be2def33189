//! plus-db-agent entry point.
//!
//! `serve` (the default) initializes the database, starts the HTTP and
//! WebSocket server and closes the pool on shutdown.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plus_db_agent::api;
use plus_db_agent::app_state::AppState;
use plus_db_agent::config::AgentConfig;
use plus_db_agent::manager;

#[derive(Parser, Debug)]
#[command(
    name = "plus-db-agent",
    version,
    about = "Database agent for the Plus clinic applications"
)]
struct Cli {
    /// Use the test database (`db_test` with the `*_TEST` credentials)
    #[arg(long, global = true)]
    test_mode: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Initialize the database and serve the REST and WebSocket API
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Create the default superuser (and Manager profile) if missing
    CreateSuperuser,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AgentConfig::from_env().context("failed to load configuration")?;
    init_tracing(config.log_json);
    config.database.test_mode |= cli.test_mode;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let db = manager::connect(&config.database)
                .await
                .context("failed to connect to database")?;
            let result = manager::run_migrations(&db).await;
            manager::close(db).await;
            result.context("failed to apply migrations")
        }
        Command::CreateSuperuser => {
            let db = manager::connect(&config.database)
                .await
                .context("failed to connect to database")?;
            let result = manager::create_superuser(&db, &config.superuser).await;
            manager::close(db).await;
            let user = result.context("failed to create superuser")?;
            tracing::info!(id = user.base.id, username = %user.username, "superuser ready");
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(config: AgentConfig) -> anyhow::Result<()> {
    tracing::info!(addr = %config.listen_addr, "starting plus-db-agent");

    let db = manager::init(&config)
        .await
        .context("failed to initialize database")?;

    let state = AppState::new(db.clone(), config.ws_queue_capacity);
    let processor = state.connections.start_queue_processor().await;
    let connections = Arc::clone(&state.connections);
    let app = api::build_app_with_timeout(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    for client in connections.get_all_connections().await {
        connections.disconnect(&client.uuid).await;
    }
    if let Some(handle) = processor {
        handle.abort();
    }
    manager::close(db).await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
