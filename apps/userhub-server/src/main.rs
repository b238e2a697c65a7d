use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use db::DbHandle;
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use sea_orm_migration::MigratorTrait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use users::api::rest::routes::register_routes;
use users::config::UsersConfig;
use users::domain::service::Service;
use users::errors::ErrorCatalog;
use users::infra::storage::{Migrator, SeaOrmUsersRepository};

mod request_id;
mod shutdown;
mod web;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const MEMORY_DSN: &str = "sqlite::memory:";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps in-memory DSNs as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path) -> Result<String> {
    if dsn.eq_ignore_ascii_case(MEMORY_DSN) || dsn.eq_ignore_ascii_case("sqlite://:memory:") {
        return Ok(MEMORY_DSN.to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// DSN the server connects to: `--mock` forces an in-memory SQLite database,
/// otherwise the `database` section is required.
fn resolve_dsn(database: Option<&DatabaseConfig>, mock: bool, base_dir: &Path) -> Result<String> {
    if mock {
        return Ok(MEMORY_DSN.to_string());
    }
    let database = database
        .ok_or_else(|| anyhow!("no `database` section configured (use --mock for an in-memory database)"))?;
    let dsn = database.dsn()?;
    if dsn.starts_with("sqlite://") {
        absolutize_sqlite_dsn(&dsn, base_dir)
    } else {
        Ok(dsn)
    }
}

/// UserHub Server - user records REST API
#[derive(Parser)]
#[command(name = "userhub-server")]
#[command(about = "UserHub Server - user records REST API")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory SQLite database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("UserHub Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(&config, &args),
    }
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    let base_dir = PathBuf::from(&config.server.home_dir);
    let dsn = resolve_dsn(config.database.as_ref(), args.mock, &base_dir)?;
    let mut connect_opts = config
        .database
        .as_ref()
        .map(DatabaseConfig::connect_opts)
        .unwrap_or_default();
    connect_opts.create_sqlite_dirs = true;

    let db = DbHandle::connect(&dsn, connect_opts)
        .await
        .context("failed to connect to database")?;
    tracing::info!(dsn = db.dsn(), engine = ?db.engine(), "database connected");

    Migrator::up(db.seaorm(), None)
        .await
        .context("failed to apply migrations")?;
    tracing::info!("migrations applied");

    let conn = db.sea();
    let service = Arc::new(Service::new(Arc::new(SeaOrmUsersRepository::new(
        conn.clone(),
    ))));
    let users_config = UsersConfig {
        default_page_size: config.users.default_page_size,
    };

    let router = register_routes(
        web::health_router(Arc::new(conn)),
        service,
        users_config,
        Arc::new(ErrorCatalog::standard()),
    );
    let router = web::apply_middleware(router, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("HTTP server bound on {}", listener.local_addr()?);

    let cancel = CancellationToken::new();
    shutdown::spawn_signal_listener(cancel.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server: graceful shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    db.close().await;
    tracing::info!("UserHub Server stopped");
    Ok(())
}

fn check_config(config: &AppConfig, args: &CliArgs) -> Result<()> {
    tracing::info!("Checking configuration...");

    let dsn = resolve_dsn(
        config.database.as_ref(),
        args.mock,
        Path::new(&config.server.home_dir),
    )?;
    DbHandle::detect(&dsn)?;

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sqlite_paths_resolve_against_home() {
        let dsn = absolutize_sqlite_dsn("sqlite://database/userhub.db", Path::new("/srv/uh")).unwrap();
        assert_eq!(dsn, "sqlite:///srv/uh/database/userhub.db");
    }

    #[test]
    fn absolute_paths_and_query_are_kept() {
        let dsn = absolutize_sqlite_dsn("sqlite:///var/lib/u.db?mode=rwc", Path::new("/srv/uh")).unwrap();
        assert_eq!(dsn, "sqlite:///var/lib/u.db?mode=rwc");
    }

    #[test]
    fn memory_dsn_is_normalized() {
        assert_eq!(
            absolutize_sqlite_dsn("sqlite://:memory:", Path::new("/x")).unwrap(),
            MEMORY_DSN
        );
        assert!(absolutize_sqlite_dsn("sqlite://", Path::new("/x")).is_err());
    }

    #[test]
    fn mock_wins_over_missing_database() {
        assert_eq!(resolve_dsn(None, true, Path::new("/x")).unwrap(), MEMORY_DSN);
        let err = resolve_dsn(None, false, Path::new("/x")).unwrap_err();
        assert!(err.to_string().contains("--mock"));
    }

    #[test]
    fn postgres_dsn_passes_through() {
        let db = DatabaseConfig {
            url: Some("postgres://u:p@localhost:5432/users".into()),
            ..DatabaseConfig::default()
        };
        assert_eq!(
            resolve_dsn(Some(&db), false, Path::new("/x")).unwrap(),
            "postgres://u:p@localhost:5432/users"
        );
    }

    #[test]
    fn cli_parses_flags_and_subcommand() {
        let cli = Cli::try_parse_from(["userhub-server", "-p", "9000", "-vv", "--mock", "check"]).unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.verbose, 2);
        assert!(cli.mock);
        assert!(matches!(cli.command, Some(Commands::Check)));
    }
}
