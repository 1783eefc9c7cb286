//! GBP Hub Server: batch orchestration for rank checks and post publishing.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use gbphub_api::AppState;
use gbphub_client::{HttpProfileClient, HttpRankCheckClient};
use gbphub_core::config::{AppConfig, StoreBackend};
use gbphub_core::error::{AppError, ErrorKind};
use gbphub_database::repositories::{
    BatchRepository, CredentialRepository, KeywordRepository, PostRepository,
};
use gbphub_database::{
    BatchStore, CredentialStore, DatabasePool, KeywordStore, MemoryStore, PostStore,
};
use gbphub_worker::workloads::{PostPublishWorkload, RankCheckWorkload};
use gbphub_worker::{BatchController, BatchRegistry, CronScheduler, ProgressTracker, RateLimiter};

#[tokio::main]
async fn main() {
    let env = std::env::var("GBPHUB_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!("Loaded configuration (env: {})", env);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// The four stores the engine runs against.
struct Stores {
    batches: Arc<dyn BatchStore>,
    keywords: Arc<dyn KeywordStore>,
    posts: Arc<dyn PostStore>,
    credentials: Arc<dyn CredentialStore>,
    pool: Option<DatabasePool>,
}

/// Connect the configured persistence backend
async fn open_stores(config: &AppConfig) -> Result<Stores, AppError> {
    match config.store.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db = DatabasePool::connect(&config.database).await?;
            gbphub_database::migration::run_migrations(db.pool()).await?;

            let pool = db.pool().clone();
            Ok(Stores {
                batches: Arc::new(BatchRepository::new(pool.clone())),
                keywords: Arc::new(KeywordRepository::new(pool.clone())),
                posts: Arc::new(PostRepository::new(pool.clone())),
                credentials: Arc::new(CredentialRepository::new(pool)),
                pool: Some(db),
            })
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; batch state is lost on restart");
            let memory = Arc::new(MemoryStore::new());
            Ok(Stores {
                batches: memory.clone(),
                keywords: memory.clone(),
                posts: memory.clone(),
                credentials: memory,
                pool: None,
            })
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting GBP Hub v{}", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    // ── Step 1: Persistence ──────────────────────────────────────
    let stores = open_stores(&config).await?;

    // ── Step 2: External API clients ─────────────────────────────
    let http = gbphub_client::http::build_client(&config.clients)?;
    let rank_api = Arc::new(HttpRankCheckClient::new(
        http.clone(),
        config.clients.rank_check_base_url.clone(),
    ));
    let profile_api = Arc::new(HttpProfileClient::new(
        http,
        config.clients.business_profile_base_url.clone(),
    ));

    // ── Step 3: Batch engine ─────────────────────────────────────
    let worker = &config.worker;
    let tracker = Arc::new(ProgressTracker::new(
        Arc::clone(&stores.batches),
        worker.snapshot_retention(),
    ));

    let rank_check = BatchController::new(
        Arc::new(RankCheckWorkload::new(
            Arc::clone(&stores.keywords),
            Arc::clone(&stores.credentials),
            rank_api,
        )),
        Arc::clone(&stores.batches),
        Arc::new(RateLimiter::from_config(&worker.rank_check)),
        Arc::clone(&tracker),
        worker.rank_check.clone(),
        worker.max_concurrent_tenants,
    );
    let post_publish = BatchController::new(
        Arc::new(PostPublishWorkload::new(
            Arc::clone(&stores.posts),
            Arc::clone(&stores.credentials),
            profile_api,
        )),
        Arc::clone(&stores.batches),
        Arc::new(RateLimiter::from_config(&worker.post_publish)),
        Arc::clone(&tracker),
        worker.post_publish.clone(),
        worker.max_concurrent_tenants,
    );

    let mut registry = BatchRegistry::new();
    registry.register(Arc::new(rank_check));
    registry.register(Arc::new(post_publish));
    let registry = Arc::new(registry);

    let recovered = registry.recover_interrupted().await?;
    if recovered > 0 {
        tracing::warn!("Closed {} batches interrupted by a previous shutdown", recovered);
    }

    // ── Step 4: Scheduled batches ────────────────────────────────
    let scheduler = if worker.enabled {
        let scheduler = CronScheduler::new(
            worker.clone(),
            Arc::clone(&registry),
            Arc::clone(&stores.batches),
            Arc::clone(&tracker),
        )
        .await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Scheduled batches disabled");
        None
    };

    // ── Step 5: HTTP server ──────────────────────────────────────
    let state = AppState::new(Arc::clone(&config), Arc::clone(&registry));
    let app = gbphub_api::build_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Configuration,
            format!("Failed to bind {}", addr),
            e,
        )
    })?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 6: Drain ────────────────────────────────────────────
    tracing::info!("Shutting down...");
    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }
    registry
        .shutdown(Duration::from_secs(config.server.shutdown_grace_seconds))
        .await;
    if let Some(pool) = stores.pool {
        pool.close().await;
    }

    tracing::info!("GBP Hub stopped");
    Ok(())
}

/// Resolve on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
