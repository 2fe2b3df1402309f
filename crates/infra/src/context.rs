//! Application context - dependency injection container
//!
//! Built once at process start and passed by reference; no component reads
//! ambient global state. Startup verifies the handler registry covers every
//! topic the outbox store can produce, so wiring gaps fail the boot instead
//! of dead-lettering records at runtime.

use std::sync::Arc;
use std::time::Duration;

use minuteflow_core::dispatch::registry::HandlerRegistry;
use minuteflow_core::outbox::ports::{JobScheduler, OutboxStore};
use minuteflow_core::telemetry::TelemetrySink;
use minuteflow_core::OutboxService;
use minuteflow_domain::constants::OUTBOX_DISPATCH_QUEUE;
use minuteflow_domain::{Config, MinuteflowError, Result};
use tokio::sync::Mutex;
use tracing::info;

use crate::database::{DbManager, SqliteOutboxRepository};
use crate::dispatch::{
    ApprovalRequestHandler, DocumentCreateHandler, DocumentMoveHandler, OutboxDispatchJobHandler,
    OutboxSweeper, OutboxSweeperConfig,
};
use crate::integrations::{HttpApprovalNotifier, HttpDocumentStore};
use crate::observability::DispatchMetrics;
use crate::queue::{JobQueue, WorkerOptions};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub outbox_repository: Arc<SqliteOutboxRepository>,
    pub queue: Arc<JobQueue>,
    pub outbox_service: Arc<OutboxService>,
    pub metrics: Arc<DispatchMetrics>,
    sweeper: Mutex<OutboxSweeper>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build and start every component.
    pub async fn bootstrap(config: Config) -> Result<Arc<Self>> {
        config.validate().map_err(MinuteflowError::Config)?;

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let outbox_repository = Arc::new(SqliteOutboxRepository::new(Arc::clone(&db)));
        let store: Arc<dyn OutboxStore> = outbox_repository.clone();

        let queue = Arc::new(JobQueue::new(config.queue.clone()));
        let scheduler: Arc<dyn JobScheduler> = queue.clone();

        let metrics = Arc::new(DispatchMetrics::new());
        let telemetry: Arc<dyn TelemetrySink> = metrics.clone();

        let retry_policy = config.dispatch.retry_policy();
        let documents =
            Arc::new(HttpDocumentStore::new(&config.dependencies.documents, &retry_policy)?);
        let notifier =
            Arc::new(HttpApprovalNotifier::new(&config.dependencies.chat, &retry_policy)?);

        let registry = Arc::new(
            HandlerRegistry::new()
                .register(Arc::new(DocumentCreateHandler::new(documents.clone())))
                .register(Arc::new(DocumentMoveHandler::new(documents)))
                .register(Arc::new(ApprovalRequestHandler::new(
                    notifier,
                    config.approval_channel.clone(),
                ))),
        );
        registry.verify_complete()?;

        let outbox_service = Arc::new(OutboxService::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            registry,
            retry_policy,
            Arc::clone(&telemetry),
        ));

        queue.register_worker(
            OUTBOX_DISPATCH_QUEUE,
            Arc::new(OutboxDispatchJobHandler::new(Arc::clone(&outbox_service))),
            WorkerOptions { concurrency: config.dispatch.worker_concurrency },
        );

        let mut sweeper = OutboxSweeper::new(
            store,
            scheduler,
            OutboxSweeperConfig {
                poll_interval: Duration::from_secs(config.dispatch.sweep_interval_secs.max(1)),
                batch_size: config.dispatch.sweep_batch_size,
                ..Default::default()
            },
            telemetry,
        );
        sweeper.start()?;

        info!("application context ready");
        Ok(Arc::new(Self {
            config,
            db,
            outbox_repository,
            queue,
            outbox_service,
            metrics,
            sweeper: Mutex::new(sweeper),
        }))
    }

    /// Stop background workers and the sweeper.
    pub async fn shutdown(&self) -> Result<()> {
        self.sweeper.lock().await.stop().await?;
        self.queue.shutdown().await;
        info!("application context stopped");
        Ok(())
    }
}
