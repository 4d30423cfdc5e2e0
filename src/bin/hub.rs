use std::sync::Arc;

use clap::Parser;
use thermowatch::{
    alerts::AlertEngine,
    api::{ApiState, spawn_api_server},
    config::{Config, ConfigProvider, SettingsStore, StorageConfig, read_config_file},
    events::EventBroadcaster,
    ingest::Ingestor,
    notify::{ChannelSet, DispatcherHandle},
    storage::{MemoryBackend, StorageBackend},
    util::get_log_level,
};
use tracing::{error, info, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let level = get_log_level();
    let filter = filter::Targets::new().with_targets(vec![
        ("thermowatch", level),
        ("thermowatch_hub", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config.storage.clone().unwrap_or_default() {
        StorageConfig::None => {
            info!("using in-memory storage, readings are lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            info!("using SQLite storage at {}", path.display());
            let backend = thermowatch::storage::sqlite::SqliteBackend::new(&path).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("SQLite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;
    let storage = open_storage(&config).await?;

    let settings = Arc::new(SettingsStore::new(config.settings()));
    let provider: Arc<dyn ConfigProvider> = settings.clone();
    let events = EventBroadcaster::default();

    let channels = ChannelSet::from_endpoints(&config.endpoints, config.notifications.timeout());
    let dispatcher = DispatcherHandle::spawn(
        provider.clone(),
        channels.clone(),
        storage.clone(),
        events.clone(),
        config.notifications.queue_capacity,
    );

    let engine = Arc::new(AlertEngine::new(dispatcher.clone(), events.clone()));
    let ingestor = Arc::new(Ingestor::new(
        provider,
        storage.clone(),
        engine.clone(),
        events.clone(),
    ));

    let state = ApiState {
        ingestor,
        engine,
        settings,
        storage: storage.clone(),
        dispatcher: dispatcher.clone(),
        channels,
        events,
    };
    let api = config.api.clone().unwrap_or_default();
    let addr = spawn_api_server(&api, state).await?;
    info!("hub ready on {addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down, draining pending notifications");

    match dispatcher.shutdown().await {
        Ok(stats) => info!(
            "notifications: {} sent, {} failed, {} skipped",
            stats.sent, stats.failed, stats.skipped
        ),
        Err(e) => error!("dispatcher did not shut down cleanly: {e}"),
    }

    if let Err(e) = storage.close().await {
        error!("failed to close storage: {e}");
    }

    Ok(())
}
