use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::debug;

use super::{BaseRepository, CatalogRepository, ProductRecord, Repository};
use crate::entities::product::{Column, Entity as Product, Model as ProductModel};
use crate::errors::ServiceError;

impl From<ProductModel> for ProductRecord {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            price: model.price,
            warehouse: model.warehouse,
        }
    }
}

/// Repository for product and stock operations
#[derive(Debug, Clone)]
pub struct SeaOrmCatalogRepository {
    base: BaseRepository,
}

impl SeaOrmCatalogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl CatalogRepository for SeaOrmCatalogRepository {
    async fn get_product(&self, id: i32) -> Result<Option<ProductRecord>, ServiceError> {
        let product = Product::find_by_id(id).one(self.base.get_db()).await?;
        Ok(product.map(ProductRecord::from))
    }

    async fn adjust_warehouse(&self, id: i32, delta: i64) -> Result<bool, ServiceError> {
        let mut update = Product::update_many()
            .col_expr(Column::Warehouse, Expr::col(Column::Warehouse).add(delta))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id));
        if delta < 0 {
            // the guard and the decrement are one statement
            update = update.filter(Column::Warehouse.gte(-delta));
        }

        let result = update.exec(self.base.get_db()).await?;
        debug!(
            product_id = id,
            delta,
            rows = result.rows_affected,
            "Adjusted warehouse stock"
        );
        Ok(result.rows_affected > 0)
    }
}
