use std::process::ExitCode;

use clap::Parser;
use tether::{AppState, build_app, config::TetherConfig, db::DbPool, observability};

/// CLI arguments for tether
#[derive(Parser, Debug)]
#[command(version, about = "Federated OpenID Connect sign-in service", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "tether.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match TetherConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config, &args.config).await,
        Command::Migrate => run_migrate(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(
    config: TetherConfig,
    config_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config_file = %config_path, "Starting tether");

    let db = DbPool::from_config(&config.database).await?;
    if config.database.run_migrations() {
        db.run_migrations().await?;
    }

    let state = AppState::new(config.clone(), db)?;

    // Providers that fail discovery are skipped; the rest are served.
    let summary = state.registry.load(state.db.providers().as_ref()).await?;
    tracing::info!(
        loaded = summary.loaded,
        failed = summary.failed,
        "OIDC providers initialized"
    );

    let app = build_app(&config, state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn run_migrate(config: TetherConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = DbPool::from_config(&config.database).await?;
    db.run_migrations().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}
