//! The Archive - clearance-gated dossier and intel record service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use archive::{
    config::{Args, Command},
    db::{Database, FileStorage},
    logging::{self, AuditLogger},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    if args.command() == Command::MigrateAccessLevels {
        return migrate(&args).await;
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  The Archive");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Data dir: {}", args.data_dir.display());
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Session TTL: {}s", args.session_ttl_seconds);
    info!("======================================");

    let db = Database::open(&args.data_dir).await?;

    let audit = AuditLogger::new();
    if let Some(ref path) = args.audit_log {
        audit.init_file(path.clone()).await?;
    }

    match args.bootstrap_credentials() {
        Some((username, password)) => {
            if let Some(admin) = db.bootstrap_admin(username, password).await? {
                info!(
                    "Roster was empty; created Redline administrator {} (id {})",
                    admin.username, admin.id
                );
            }
        }
        None => {
            if db.agents.is_empty().await {
                warn!("Roster is empty and no bootstrap credentials are set; nobody can log in");
            }
        }
    }

    let state = Arc::new(AppState::new(args, db, audit)?);
    server::run(state).await?;

    Ok(())
}

async fn migrate(args: &Args) -> anyhow::Result<()> {
    let storage = FileStorage::open(&args.data_dir).await?;
    info!("Migrating access levels in {}", storage.dir().display());

    let report = Database::migrate_access_levels(Arc::new(storage)).await?;
    info!(
        "Migration complete: {} person record(s) and {} intel report(s) rewritten",
        report.people_changed, report.intel_changed
    );
    Ok(())
}
