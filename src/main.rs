//! Server binary: wires storage, the round scheduler and the HTTP API.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use colorwin::api::monitoring::MetricsRegistry;
use colorwin::api::ApiServer;
use colorwin::config::GameConfig;
use colorwin::engine::{EventBus, GameScheduler, RoundManager, SettlementEngine};
use colorwin::errors::GameResult;
use colorwin::outcome::OutcomeResolver;
use colorwin::service::GameService;
use colorwin::store::{MemoryStore, RocksStore, Store, UserStore};
use colorwin::types::UserAccount;

#[derive(Parser, Debug)]
#[command(name = "colorwin-server", about = "Color game round engine and API")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured RocksDB data directory.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Run with in-memory storage (nothing survives a restart).
    #[arg(long)]
    memory: bool,

    /// Allowed CORS origins; repeatable.
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,

    /// Create demo accounts (alice, bob, carol) with starting balances.
    #[arg(long)]
    seed_demo_users: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colorwin=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> GameResult<()> {
    let mut config = match &args.config {
        Some(path) => GameConfig::from_file(path)?,
        None => GameConfig::default(),
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.storage.data_directory = db_path.to_string_lossy().into_owned();
    }
    if args.memory {
        config.storage.in_memory = true;
    }
    if !args.cors_origins.is_empty() {
        config.api.allowed_origins = args.cors_origins;
    }
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        duration_secs = config.round.duration_secs,
        cooldown_secs = config.round.cooldown_secs,
        "starting colorwin server"
    );

    let store: Arc<dyn Store> = if config.storage.in_memory {
        warn!("running with in-memory storage, state will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        info!(path = %config.storage.data_directory, "opening database");
        Arc::new(RocksStore::open(
            &config.storage.data_directory,
            &config.storage,
        )?)
    };

    if args.seed_demo_users {
        seed_demo_users(store.as_ref()).await?;
    }

    let manager = Arc::new(RoundManager::new(
        store.clone(),
        OutcomeResolver::new(store.clone()),
        SettlementEngine::new(store.clone()),
        &config.round,
    ));

    // Adopt or close out whatever round a previous run left behind before
    // the scheduler opens new ones.
    match manager.recover(chrono::Utc::now()).await? {
        Some(round) => info!(period = %round.period, "recovered round from previous run"),
        None => info!("no round to recover"),
    }

    let events = EventBus::new();
    let metrics = Arc::new(MetricsRegistry::new());
    metrics.start_event_counter(&events);

    let scheduler = Arc::new(GameScheduler::new(
        manager.clone(),
        events.clone(),
        &config.round,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = scheduler.start(shutdown_rx)?;

    let service = Arc::new(GameService::new(
        store,
        manager,
        config.round.max_query_limit,
    ));
    let server = ApiServer::new(config.api.clone(), service, events, metrics);
    let result = server.run().await;

    // The API has stopped; drain the scheduler so an in-flight round is
    // settled before the process exits.
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        warn!("scheduler task panicked: {}", e);
    }

    result
}

async fn seed_demo_users(store: &dyn Store) -> GameResult<()> {
    for (id, name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        if store.user(id).await?.is_none() {
            store
                .upsert_user(&UserAccount {
                    id: id.to_string(),
                    name: name.to_string(),
                    balance: 1000.0,
                })
                .await?;
            info!(user_id = id, "seeded demo user");
        }
    }
    Ok(())
}
