use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::info;

use super::{BaseRepository, NewOrder, OrderRepository, Repository};
use crate::entities::order::{ActiveModel as OrderActiveModel, Column, Entity as Order};
use crate::entities::{Address, OrderModel, Product};
use crate::errors::ServiceError;
use crate::models::{Receipt, ReceiptLine};

/// Repository for order operations
#[derive(Debug, Clone)]
pub struct SeaOrmOrderRepository {
    base: BaseRepository,
}

impl SeaOrmOrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl OrderRepository for SeaOrmOrderRepository {
    async fn create_order(&self, order: NewOrder) -> Result<OrderModel, ServiceError> {
        let created = self
            .base
            .get_db()
            .transaction::<_, OrderModel, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let draft = OrderActiveModel {
                        user_id: Set(order.user_id),
                        address: Set(None),
                        total_price: Set(Decimal::ZERO),
                        product_list: Set(serde_json::json!({})),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    let address = Address::find_by_id(order.address_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("address {}", order.address_id))
                        })?;

                    // The address is captured as text; the receipt only
                    // carries product lines.
                    let mut receipt = Receipt::new();
                    for line in &order.lines {
                        let product = Product::find_by_id(line.product_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!("product {}", line.product_id))
                            })?;
                        receipt.insert(
                            product.id,
                            ReceiptLine::new(product.name, product.slug, product.price, line.quantity),
                        );
                    }

                    let mut active: OrderActiveModel = draft.into();
                    active.address = Set(Some(address.full_address));
                    active.total_price = Set(order.total_price);
                    active.product_list = Set(serde_json::to_value(&receipt)?);
                    active.updated_at = Set(Utc::now());
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            order_id = created.id,
            user_id = created.user_id,
            total_price = %created.total_price,
            "Order persisted"
        );
        Ok(created)
    }

    async fn orders_for_user(&self, user_id: i32) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await?)
    }
}
