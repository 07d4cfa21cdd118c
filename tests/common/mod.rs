#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use storefront::{
    cache::Stores,
    config::AppConfig,
    db,
    entities::{AddressModel, DiscountKind, ProductModel, UserModel},
    seed, AppServices, AppState,
};
use std::sync::Arc;

/// Application state over a fresh in-memory SQLite database and in-memory
/// basket/payment stores.
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "redis://127.0.0.1:6379/0".to_string(),
            "test".to_string(),
        );
        cfg.store_backend = "in-memory".to_string();
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let state = AppState::from_parts(cfg, Arc::new(pool), Stores::in_memory());
        Self { state }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub async fn user(&self, username: &str) -> UserModel {
        seed::insert_user(self.db(), username)
            .await
            .expect("insert user")
    }

    pub async fn address(&self, user_id: i32, text: &str) -> AddressModel {
        seed::insert_address(self.db(), user_id, text)
            .await
            .expect("insert address")
    }

    pub async fn product(&self, slug: &str, price: Decimal, warehouse: i32) -> ProductModel {
        seed::insert_product(self.db(), &slug.to_uppercase(), slug, price, warehouse)
            .await
            .expect("insert product")
    }

    pub async fn code(&self, code: &str, kind: DiscountKind, value: Decimal, user_id: Option<i32>) {
        seed::insert_discount_code(self.db(), code, kind, value, user_id)
            .await
            .expect("insert discount code");
    }

    pub async fn available(&self, product_id: i32) -> i32 {
        self.services()
            .stock
            .available(product_id)
            .await
            .expect("available")
    }
}
