use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{DiscountKind, OrderModel};
use crate::errors::ServiceError;
use crate::models::BasketLine;

pub mod catalog_repository;
pub mod discount_repository;
pub mod identity_repository;
pub mod order_repository;

pub use catalog_repository::SeaOrmCatalogRepository;
pub use discount_repository::SeaOrmDiscountRepository;
pub use identity_repository::SeaOrmIdentityRepository;
pub use order_repository::SeaOrmOrderRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub warehouse: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i32,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub id: i32,
    pub owner_id: i32,
    pub full_address: String,
}

/// Discount type and magnitude granted to a user by a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountGrant {
    pub kind: DiscountKind,
    pub value: Decimal,
}

/// Everything needed to turn a checked-out basket into an order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i32,
    pub address_id: i32,
    pub total_price: Decimal,
    pub lines: Vec<BasketLine>,
}

/// Products and their available stock.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_product(&self, id: i32) -> Result<Option<ProductRecord>, ServiceError>;

    /// Adds `delta` to the product's stock in one conditional statement.
    /// Returns false, changing nothing, when the product is missing or the
    /// result would drop below zero.
    async fn adjust_warehouse(&self, id: i32, delta: i64) -> Result<bool, ServiceError>;
}

/// Users and their delivery addresses.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>, ServiceError>;

    async fn get_address(&self, id: i32) -> Result<Option<AddressRecord>, ServiceError>;
}

#[async_trait]
pub trait DiscountRepository: Send + Sync {
    /// Looks up a code owned by `user_id`. Codes owned by someone else, or
    /// by nobody, are not found.
    async fn find_user_discount(
        &self,
        user_id: i32,
        code: &str,
    ) -> Result<Option<DiscountGrant>, ServiceError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Creates the order, resolves its address and writes the receipt in a
    /// single transaction. Nothing is persisted when any step fails.
    async fn create_order(&self, order: NewOrder) -> Result<OrderModel, ServiceError>;

    async fn orders_for_user(&self, user_id: i32) -> Result<Vec<OrderModel>, ServiceError>;
}
