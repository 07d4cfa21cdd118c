// Basket and payment stores backed by Redis, with an in-memory fallback

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod basket_store;
pub mod payment_ledger;

pub use basket_store::{
    BasketStore, DiscountOutcome, InMemoryBasketStore, PayAmountRefresh, RedisBasketStore,
};
pub use payment_ledger::{InMemoryPaymentLedger, PaymentLedger, RedisPaymentLedger};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

/// Which backend holds baskets and payment records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum StoreBackend {
    Redis,
    InMemory,
}

/// Basket and payment stores built together at process start.
#[derive(Clone)]
pub struct Stores {
    pub baskets: Arc<dyn BasketStore>,
    pub payments: Arc<dyn PaymentLedger>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            baskets: Arc::new(InMemoryBasketStore::new()),
            payments: Arc::new(InMemoryPaymentLedger::new()),
        }
    }
}

pub struct StoreFactory;

impl StoreFactory {
    /// Opens the configured stores. Baskets and payments live in separate
    /// Redis databases, so each gets its own connection manager.
    pub async fn create(config: &AppConfig) -> Result<Stores, CacheError> {
        match config.store_backend() {
            StoreBackend::InMemory => {
                info!("Using in-memory basket and payment stores");
                Ok(Stores::in_memory())
            }
            StoreBackend::Redis => {
                let baskets = RedisBasketStore::connect(&config.redis_url).await?;
                let payments = RedisPaymentLedger::connect(config.payment_redis_url()).await?;
                info!(
                    basket_store = %config.redis_url,
                    payment_store = %config.payment_redis_url(),
                    "Connected to Redis stores"
                );
                Ok(Stores {
                    baskets: Arc::new(baskets),
                    payments: Arc::new(payments),
                })
            }
        }
    }
}
