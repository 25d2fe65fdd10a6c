use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use timestack::cache::RedisService;
use timestack::config::Config;
use timestack::db::migrations::MigrationReport;
use timestack::db::{self, Database};
use timestack::graphql::{build_schema, schema_sdl};
use timestack::integrations::GithubService;
use timestack::lifecycle::ServiceRegistry;
use timestack::server::{AppState, serve_until, start_server};

/// Timestack time-tracking server
#[derive(Parser, Debug)]
#[command(name = "timestack")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP/GraphQL server
    Serve {
        /// Apply pending migrations before serving
        #[arg(long)]
        migrate: bool,
    },
    /// Manage schema migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Print the GraphQL schema as SDL
    Schema,
}

#[derive(Subcommand, Debug)]
enum MigrateAction {
    /// Apply every pending migration in order
    Run,
    /// Revert the most recent migration
    Revert {
        /// Revert every applied migration
        #[arg(long)]
        all: bool,
    },
    /// List migrations and whether they are applied
    Status,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("timestack=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn log_report(action: &str, report: &MigrationReport) {
    if report.is_empty() {
        tracing::info!("No migrations to {}", action);
    }
    for (version, name) in &report.executed {
        tracing::info!(version, name, "Migration {}", action);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    if let Command::Schema = cli.command {
        println!("{}", schema_sdl(&build_schema(None)));
        return Ok(());
    }

    let config = Config::from_env().context("failed to load configuration")?;
    let database = db::connect_from_config(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;

    match cli.command {
        Command::Migrate { action } => migrate(database.as_ref(), action).await,
        Command::Serve { migrate } => serve(config, database, migrate).await,
        Command::Schema => Ok(()),
    }
}

async fn migrate(database: &dyn Database, action: MigrateAction) -> anyhow::Result<()> {
    match action {
        MigrateAction::Run => {
            let report = database.run_migrations().await?;
            log_report("applied", &report);
        }
        MigrateAction::Revert { all } => {
            let report = database.revert_migrations(all).await?;
            log_report("reverted", &report);
        }
        MigrateAction::Status => {
            let status = database.migration_status().await?;
            for entry in &status.entries {
                let state = if entry.applied { "applied" } else { "pending" };
                println!("{:<8} {} {}", state, entry.version, entry.name);
            }
            for version in &status.unknown_applied {
                println!("{:<8} {} (not in catalog)", "unknown", version);
            }
        }
    }
    Ok(())
}

async fn serve(config: Config, database: Arc<dyn Database>, migrate: bool) -> anyhow::Result<()> {
    if migrate {
        let report = database
            .run_migrations()
            .await
            .context("failed to apply migrations")?;
        log_report("applied", &report);
    }

    let redis = Arc::new(RedisService::new(config.redis.clone()));
    let github = Arc::new(GithubService::new(config.github.clone()));

    let mut services = ServiceRegistry::new();
    services.register(redis);
    services.register(github);
    services
        .start_all()
        .await
        .context("failed to start services")?;

    let state = Arc::new(AppState::new(
        build_schema(Some(database)),
        config.server.clone(),
    ));
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
    let server = match start_server(addr, Arc::clone(&state)).await {
        Ok(server) => server,
        Err(e) => {
            services.shutdown().await;
            return Err(e).context("failed to start HTTP server");
        }
    };

    tracing::info!(
        addr = %server.addr,
        environment = config.environment.as_str(),
        url = %config.server.url,
        "Timestack ready"
    );

    serve_until(&state, server, &services, shutdown_signal()).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM. A listener that cannot be installed is
/// logged and treated as a shutdown request.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGINT"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM");
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
