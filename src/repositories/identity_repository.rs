use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use super::{AddressRecord, BaseRepository, IdentityRepository, Repository, UserRecord};
use crate::entities::{Address, User};
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct SeaOrmIdentityRepository {
    base: BaseRepository,
}

impl SeaOrmIdentityRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl IdentityRepository for SeaOrmIdentityRepository {
    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>, ServiceError> {
        let user = User::find_by_id(id).one(self.base.get_db()).await?;
        Ok(user.map(|u| UserRecord {
            id: u.id,
            uuid: u.uuid,
        }))
    }

    async fn get_address(&self, id: i32) -> Result<Option<AddressRecord>, ServiceError> {
        let address = Address::find_by_id(id).one(self.base.get_db()).await?;
        Ok(address.map(|a| AddressRecord {
            id: a.id,
            owner_id: a.user_id,
            full_address: a.full_address,
        }))
    }
}
