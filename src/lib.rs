//! Basket-to-order core of a small storefront.
//!
//! A per-user basket lives in Redis (or process memory), reserves warehouse
//! stock as lines are added, takes at most one discount code, and is turned
//! into a persisted order plus a payment record at checkout.

pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod seed;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use errors::ServiceError;
pub use services::AppServices;

/// Process-wide state: configuration, the database pool, the event
/// processor and the services built over them.
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
    event_task: JoinHandle<()>,
}

impl AppState {
    /// Connects to the database and the configured stores, runs migrations
    /// when asked to, and starts the event processor.
    pub async fn build(config: config::AppConfig) -> anyhow::Result<Self> {
        let pool = db::establish_connection_from_app_config(&config).await?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }
        let stores = cache::StoreFactory::create(&config).await?;
        Ok(Self::from_parts(config, Arc::new(pool), stores))
    }

    /// Wires services over an existing pool and stores.
    pub fn from_parts(
        config: config::AppConfig,
        db: Arc<DatabaseConnection>,
        stores: cache::Stores,
    ) -> Self {
        let (event_sender, event_rx) = events::channel(config.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let services = AppServices::new(db.clone(), stores, event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
            event_task,
        }
    }

    /// Drains pending events and closes the database pool.
    pub async fn shutdown(self) {
        let Self {
            db,
            event_sender,
            services,
            event_task,
            ..
        } = self;

        drop(services);
        drop(event_sender);
        if let Err(e) = event_task.await {
            warn!(error = %e, "Event processor ended abnormally");
        }

        match Arc::try_unwrap(db) {
            Ok(pool) => {
                if let Err(e) = pool.close().await {
                    warn!(error = %e, "Failed to close database pool");
                }
            }
            Err(_) => warn!("Database pool still shared at shutdown; leaving it to drop"),
        }
        info!("Shutdown complete");
    }
}
