//! ltigate
//!
//! LTI 1.3 tool launch endpoint: OIDC login initiation and launch callback.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use ltigate::keyset::{HttpKeySetSource, KeySetCache};
use ltigate::launch::LaunchService;
use ltigate::routes::{AppState, build_router};
use ltigate::storage::LaunchDatabase;
use ltigate::token::state::STATE_TTL_SECS;
use ltigate_core::config::{database_path, load_config};
use ltigate_core::db::unix_timestamp;
use ltigate_core::tracing_init::{default_filter, init_tracing};

/// How often abandoned launches are purged.
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[command(name = "ltigate")]
#[command(version, about = "LTI 1.3 tool launch endpoint")]
struct Args {
    /// Path to a JSON config file, layered over the global settings file.
    #[arg(long, env = "LTIGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "LTIGATE_ADDR")]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr.to_string();
    }
    if let Some(path) = args.db_path {
        config.server.database_path = Some(path);
    }
    config.server.log_json |= args.log_json;

    init_tracing(
        &default_filter(&config.server.log_level),
        config.server.log_json,
    );
    config.validate()?;

    let addr: SocketAddr = config.server.addr.parse()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        deployment_policy = ?config.launch.deployment_policy,
        "Starting ltigate"
    );

    let db_path = config
        .server
        .database_path
        .clone()
        .or_else(database_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
    info!(path = %db_path.display(), "Opening launch database");
    let db = LaunchDatabase::open(&db_path).await?;

    let source = HttpKeySetSource::new(Duration::from_secs(config.keyset.fetch_timeout_secs))?;
    let key_sets = Arc::new(KeySetCache::new(
        Arc::new(source),
        Duration::from_secs(config.keyset.ttl_secs),
    ));
    let launches = Arc::new(LaunchService::new(
        config.launch.clone(),
        Arc::new(db.clone()),
        Arc::clone(&key_sets),
    ));

    // Background refresh of every key set seen so far
    if config.keyset.refresh_interval_secs > 0 {
        let refresh_keys = Arc::clone(&key_sets);
        let period = Duration::from_secs(config.keyset.refresh_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip first immediate tick
            loop {
                interval.tick().await;
                let refreshed = refresh_keys.refresh_all().await;
                info!(refreshed, "Background key set refresh completed");
            }
        });
    }

    // Purge launches whose state token can no longer be presented
    let purge_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            match purge_db
                .purge_abandoned_launches(unix_timestamp() - STATE_TTL_SECS)
                .await
            {
                Ok(removed) if removed > 0 => {
                    info!(removed, "Abandoned launches purged");
                }
                Err(e) => {
                    warn!(error = %e, "Abandoned launch purge failed");
                }
                _ => {}
            }
        }
    });

    let app = build_router(AppState { launches });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
