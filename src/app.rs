//! Service runtime
//!
//! Startup order:
//!
//! 1. open the durable store and ping it (fatal)
//! 2. warm the cache (non-fatal)
//! 3. mark ready, start ingestion when an input is configured
//! 4. serve HTTP until shutdown
//! 5. stop ingestion and report its counters

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::ShardedCache;
use crate::config::{AppConfig, StorageBackend, StorageConfig};
use crate::error::{Error, Result};
use crate::ingest::{IngestionPipeline, LineSource, MessageSource, PipelineStats};
use crate::metrics::{init_metrics, record_store_op};
use crate::read_path::ReadPath;
use crate::server::{self, AppState, HealthChecker, StoreHealth};
use crate::storage::{DurableStore, FileStore, MemoryStore};
use crate::warmup::{WarmupLoader, WarmupReport};

/// Wired core components, ready to serve
#[derive(Clone)]
pub struct Services {
    pub cache: Arc<ShardedCache>,
    pub store: Arc<dyn DurableStore>,
    pub read_path: ReadPath,
    pub health: Arc<HealthChecker>,
    pub warmup: Option<WarmupReport>,
}

/// Open the configured store backend
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn DurableStore>> {
    match config.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory order store, data will not survive a restart");
            Ok(Arc::new(MemoryStore::with_item_policy(config.item_policy)))
        }
        StorageBackend::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                Error::Config("storage.path is required for the file backend".to_string())
            })?;
            let store = FileStore::open_with_policy(path, config.item_policy)?;
            info!(path = %path.display(), orders = store.len(), "File order store opened");
            Ok(Arc::new(store))
        }
    }
}

/// Open the configured ingestion input; `-` reads stdin
pub async fn open_source(input: &str) -> Result<Box<dyn MessageSource>> {
    if input == "-" {
        info!("Ingesting orders from stdin");
        Ok(Box::new(LineSource::stdin()))
    } else {
        info!(input = %input, "Ingesting orders from file");
        Ok(Box::new(LineSource::open(input).await?))
    }
}

/// Steps 1 to 3 of startup, without ingestion or HTTP
pub async fn bootstrap(config: &AppConfig) -> Result<Services> {
    init_metrics();

    let cache = Arc::new(ShardedCache::with_shards(config.cache.shard_count)?);
    let store = open_store(&config.storage)?;
    let health = Arc::new(HealthChecker::new(cache.clone()).with_store(store.clone()));

    let ping = store.ping().await;
    record_store_op("ping", ping.is_ok());
    if let Err(e) = ping {
        error!(error = %e, "Order store unreachable");
        return Err(e);
    }
    health
        .update_store_health(StoreHealth {
            status: "healthy".to_string(),
            backend: backend_name(config.storage.backend).to_string(),
        })
        .await;

    let warmup = if config.warmup.enabled {
        let loader = WarmupLoader::new(store.clone(), cache.clone(), config.warmup.window);
        match loader.load().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Cache warmup failed, starting with an empty cache");
                None
            }
        }
    } else {
        info!("Cache warmup disabled");
        None
    };

    health.set_startup_complete().await;
    health.set_ready().await;

    Ok(Services {
        read_path: ReadPath::new(cache.clone(), store.clone()),
        cache,
        store,
        health,
        warmup,
    })
}

/// Spawn the ingestion pipeline over `source`
pub fn spawn_pipeline<S>(
    services: &Services,
    source: S,
    shutdown: CancellationToken,
) -> (Arc<IngestionPipeline>, JoinHandle<Result<PipelineStats>>)
where
    S: MessageSource + 'static,
{
    let pipeline = Arc::new(IngestionPipeline::new(
        services.store.clone(),
        services.cache.clone(),
        shutdown,
    ));
    let handle = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(source).await })
    };
    (pipeline, handle)
}

/// Run the service until `shutdown` is cancelled
pub async fn run(config: AppConfig, shutdown: CancellationToken) -> Result<()> {
    info!(version = %crate::VERSION, "OrderCache starting");
    config.validate()?;

    let services = bootstrap(&config).await?;

    let ingestion = match &config.ingest.input {
        Some(input) => {
            let source = open_source(input).await?;
            Some(spawn_pipeline(&services, source, shutdown.child_token()))
        }
        None => {
            info!("No ingest input configured, serving lookups only");
            None
        }
    };

    let state = AppState {
        read_path: services.read_path.clone(),
        cache: services.cache.clone(),
        health: services.health.clone(),
        config: config.server.clone(),
    };
    let served = server::serve(state, shutdown.clone()).await;

    // Server gone (shutdown or bind failure): stop ingestion as well
    shutdown.cancel();
    services.health.set_not_ready().await;

    if let Some((_, handle)) = ingestion {
        match handle.await {
            Ok(Ok(stats)) => info!(
                received = stats.received,
                cached = stats.cached,
                redelivered = stats.redelivered,
                malformed = stats.malformed,
                invalid = stats.invalid,
                persist_failed = stats.persist_failed,
                "Ingestion finished"
            ),
            Ok(Err(e)) => error!(error = %e, "Ingestion stopped with an error"),
            Err(e) => error!(error = %e, "Ingestion task panicked"),
        }
    }

    info!(cached_orders = services.cache.len(), "OrderCache stopped");
    served
}

fn backend_name(backend: StorageBackend) -> &'static str {
    match backend {
        StorageBackend::Memory => "memory",
        StorageBackend::File => "file",
    }
}
