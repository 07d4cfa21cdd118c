use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;

use super::{BaseRepository, DiscountGrant, DiscountRepository, Repository};
use crate::entities::discount_code::{Column, Entity as DiscountCode};
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct SeaOrmDiscountRepository {
    base: BaseRepository,
}

impl SeaOrmDiscountRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl DiscountRepository for SeaOrmDiscountRepository {
    async fn find_user_discount(
        &self,
        user_id: i32,
        code: &str,
    ) -> Result<Option<DiscountGrant>, ServiceError> {
        let grant = DiscountCode::find()
            .filter(Column::Code.eq(code))
            .filter(Column::UserId.eq(user_id))
            .one(self.base.get_db())
            .await?;

        Ok(grant.map(|d| DiscountGrant {
            kind: d.kind,
            value: d.value,
        }))
    }
}
