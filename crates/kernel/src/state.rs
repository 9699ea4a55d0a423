//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Config, DEFAULT_CRON_KEY};
use crate::content::{ApprovalPolicy, Lifecycle, PageService, PublishingService};
use crate::cron::SchedulerTick;
use crate::db;
use crate::metrics::Metrics;
use crate::store::{MemoryPageStore, PageStore, PgPageStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn PageStore>,
    pages: PageService,
    publishing: PublishingService,
    scheduler: SchedulerTick,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create the state from configuration.
    ///
    /// Connects to PostgreSQL and applies migrations when `DATABASE_URL` is
    /// set; otherwise falls back to the in-memory store.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn PageStore> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections)
                    .await
                    .context("failed to create database pool")?;
                db::run_migrations(&pool).await?;
                info!("PostgreSQL store ready");
                Arc::new(PgPageStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set, using the in-memory store (data is lost on restart)");
                Arc::new(MemoryPageStore::new())
            }
        };

        Ok(Self::with_store(config.clone(), store))
    }

    /// Create the state over an existing store.
    pub fn with_store(config: Config, store: Arc<dyn PageStore>) -> Self {
        if config.cron_key == DEFAULT_CRON_KEY {
            warn!("CRON_KEY not set, using the default key");
        }

        let metrics = Arc::new(Metrics::new());
        let lifecycle = Lifecycle::new(ApprovalPolicy {
            require_by_default: config.require_approval_by_default,
        });
        let pages = PageService::new(store.clone(), metrics.clone());
        let publishing = PublishingService::new(store.clone(), lifecycle, metrics.clone());
        let scheduler = SchedulerTick::new(store.clone(), publishing.clone(), metrics.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                pages,
                publishing,
                scheduler,
                metrics,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.inner.store
    }

    pub fn pages(&self) -> &PageService {
        &self.inner.pages
    }

    pub fn publishing(&self) -> &PublishingService {
        &self.inner.publishing
    }

    pub fn scheduler(&self) -> &SchedulerTick {
        &self.inner.scheduler
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Check whether the page store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.store.healthy().await
    }
}
