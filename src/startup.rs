//! Application Startup
//!
//! Wires stores, services, the retention workers and the HTTP server, and
//! shuts them down together.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::services::{ResourceWriteGuard, RoomLocks, RoomService};
use crate::config::Settings;
use crate::domain::{BlobStore, NotificationEmitter};
use crate::infrastructure::memory::InMemoryStore;
use crate::infrastructure::notify::{create_redis_client, FanoutNotifier, RedisNotifier};
use crate::infrastructure::repositories::Repositories;
use crate::infrastructure::storage::{FilesystemBlobStore, InMemoryBlobStore};
use crate::infrastructure::database;
use crate::presentation::http::routes;
use crate::presentation::http::handlers::health;
use crate::presentation::websocket::Gateway;
use crate::retention::{spawn_retention_workers, RetentionSweeper, SweepConfig};
use crate::shared::clock::{Clock, Pacer, SystemClock, TokioPacer};
use crate::shared::snowflake::SnowflakeGenerator;

/// How long workers get to finish after shutdown is signalled
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Backing stores and time sources the services are built on.
pub struct Stores {
    pub repos: Repositories,
    pub blobs: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
    pub pacer: Arc<dyn Pacer>,
    pub db: Option<PgPool>,
    pub redis: Option<ConnectionManager>,
}

impl Stores {
    /// Process-local stores with the wall clock.
    pub fn in_memory(store: Arc<InMemoryStore>, blobs: Arc<InMemoryBlobStore>) -> Self {
        Self {
            repos: Repositories::in_memory(store),
            blobs,
            clock: Arc::new(SystemClock),
            pacer: Arc::new(TokioPacer),
            db: None,
            redis: None,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn NotificationEmitter>,
    pub gateway: Arc<Gateway>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub clock: Arc<dyn Clock>,
    pub write_guard: Arc<ResourceWriteGuard>,
    pub rooms: Arc<RoomService>,
    pub sweeper: Arc<RetentionSweeper>,
    pub settings: Arc<Settings>,
    pub shutdown: watch::Receiver<bool>,
    /// None when running on the in-memory metadata store
    pub db: Option<PgPool>,
    /// None when Redis fan-out is disabled
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    /// Build every service on top of the given stores.
    pub fn assemble(settings: Settings, stores: Stores, shutdown: watch::Receiver<bool>) -> Self {
        let gateway = Arc::new(Gateway::new());
        let mut fanout = FanoutNotifier::new().with(gateway.clone());
        if let Some(conn) = &stores.redis {
            fanout = fanout.with(Arc::new(RedisNotifier::new(conn.clone())));
        }
        let notifier: Arc<dyn NotificationEmitter> = Arc::new(fanout);

        let snowflake = Arc::new(SnowflakeGenerator::new(settings.snowflake.machine_id as u64));
        let locks = RoomLocks::new();
        let blob_timeout = settings.storage.timeout();

        let write_guard = Arc::new(ResourceWriteGuard::new(
            stores.repos.clone(),
            stores.blobs.clone(),
            notifier.clone(),
            snowflake.clone(),
            stores.clock.clone(),
            locks.clone(),
            blob_timeout,
        ));

        let sweep_config = SweepConfig::from(&settings.retention);
        let rooms = Arc::new(RoomService::new(
            stores.repos.clone(),
            stores.blobs.clone(),
            notifier.clone(),
            snowflake.clone(),
            stores.clock.clone(),
            locks,
            settings.room_defaults,
            blob_timeout,
            sweep_config.blob_concurrency,
        ));

        let sweeper = Arc::new(RetentionSweeper::new(
            stores.repos.retention.clone(),
            stores.blobs.clone(),
            notifier.clone(),
            stores.clock.clone(),
            stores.pacer,
            sweep_config,
        ));

        Self {
            repos: stores.repos,
            blobs: stores.blobs,
            notifier,
            gateway,
            snowflake,
            clock: stores.clock,
            write_guard,
            rooms,
            sweeper,
            settings: Arc::new(settings),
            shutdown,
            db: stores.db,
            redis: stores.redis,
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let db = database::create_pool(&settings.database)
            .await
            .context("failed to create database pool")?;
        database::run_migrations(&db)
            .await
            .context("failed to run database migrations")?;
        tracing::info!("Database connection pool created and migrated");

        let redis = if settings.redis.enabled {
            Some(create_redis_client(&settings.redis).await?)
        } else {
            tracing::info!("Redis fan-out disabled");
            None
        };

        let blobs = FilesystemBlobStore::new(&settings.storage.root)?;
        tracing::info!(root = %settings.storage.root, "Filesystem blob store ready");

        let stores = Stores {
            repos: Repositories::postgres(db.clone()),
            blobs: Arc::new(blobs),
            clock: Arc::new(SystemClock),
            pacer: Arc::new(TokioPacer),
            db: Some(db),
            redis,
        };
        let state = AppState::assemble(settings, stores, shutdown_rx.clone());

        let workers = spawn_retention_workers(
            state.sweeper.clone(),
            &state.settings.retention,
            state.clock.clone(),
            shutdown_rx,
        );

        let addr = state.settings.server_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        tracing::info!("Listening on {}", addr);

        let router = routes::create_router(state);

        Ok(Self {
            listener,
            router,
            shutdown_tx,
            workers,
        })
    }

    /// Run the server until a shutdown signal arrives, then stop the workers.
    pub async fn run_until_stopped(self) -> Result<()> {
        let shutdown_tx = self.shutdown_tx;
        let signal_tx = shutdown_tx.clone();

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signal_tx.send(true);
            })
            .await?;

        let _ = shutdown_tx.send(true);
        let drain = futures::future::join_all(self.workers);
        if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("Retention workers did not stop in time");
        }
        tracing::info!("Shutdown complete");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

    tracing::info!("Shutdown signal received, stopping retention workers");
}
