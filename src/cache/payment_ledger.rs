use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, AsyncCommands};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::CacheError;
use crate::models::{PaymentRecord, PaymentStatus};

/// Latest payment attempt per user UUID. Recording replaces whatever was
/// stored for that user before.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    async fn record(&self, record: &PaymentRecord) -> Result<(), CacheError>;

    async fn latest(&self, user: Uuid) -> Result<Option<PaymentRecord>, CacheError>;
}

pub(crate) fn payment_key(user: Uuid) -> String {
    format!("payment:{}", user)
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, CacheError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| CacheError::Serialization(format!("payment record missing {}", name)))
}

pub(crate) fn decode_payment(fields: &HashMap<String, String>) -> Result<PaymentRecord, CacheError> {
    let bad = |name: &str, value: &str| {
        CacheError::Serialization(format!("bad payment {} {:?}", name, value))
    };

    let total_price = required(fields, "total_price")?;
    let user = required(fields, "user")?;
    let payment_id = required(fields, "payment_id")?;
    let status = required(fields, "status")?;

    Ok(PaymentRecord {
        total_price: Decimal::from_str(total_price).map_err(|_| bad("total_price", total_price))?,
        user: Uuid::parse_str(user).map_err(|_| bad("user", user))?,
        payment_id: Uuid::parse_str(payment_id).map_err(|_| bad("payment_id", payment_id))?,
        status: PaymentStatus::from_str(status).map_err(|_| bad("status", status))?,
    })
}

/// Payment ledger on a Redis hash per user (`payment:<uuid>`).
#[derive(Clone)]
pub struct RedisPaymentLedger {
    conn: ConnectionManager,
}

impl RedisPaymentLedger {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl PaymentLedger for RedisPaymentLedger {
    async fn record(&self, record: &PaymentRecord) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let key = payment_key(record.user);
        let fields = [
            ("total_price", record.total_price.to_string()),
            ("user", record.user.to_string()),
            ("payment_id", record.payment_id.to_string()),
            ("status", record.status.to_string()),
        ];
        redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, &fields[..])
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn latest(&self, user: Uuid) -> Result<Option<PaymentRecord>, CacheError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(payment_key(user)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_payment(&fields).map(Some)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPaymentLedger {
    records: DashMap<Uuid, PaymentRecord>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn record(&self, record: &PaymentRecord) -> Result<(), CacheError> {
        self.records.insert(record.user, record.clone());
        Ok(())
    }

    async fn latest(&self, user: Uuid) -> Result<Option<PaymentRecord>, CacheError> {
        Ok(self.records.get(&user).map(|record| record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decodes_stored_payment_fields() {
        let user = Uuid::new_v4();
        let payment_id = Uuid::new_v4();
        let fields: HashMap<String, String> = [
            ("total_price", "170".to_string()),
            ("user", user.to_string()),
            ("payment_id", payment_id.to_string()),
            ("status", "success".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let record = decode_payment(&fields).unwrap();
        assert_eq!(record.total_price, dec!(170));
        assert_eq!(record.user, user);
        assert_eq!(record.payment_id, payment_id);
        assert_eq!(record.status, PaymentStatus::Success);
    }

    #[test]
    fn missing_field_is_reported() {
        let fields = HashMap::from([("status".to_string(), "fail".to_string())]);
        assert!(matches!(
            decode_payment(&fields),
            Err(CacheError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_keeps_only_latest_attempt() {
        let ledger = InMemoryPaymentLedger::new();
        let user = Uuid::new_v4();
        let first = PaymentRecord::new(user, dec!(10), PaymentStatus::Fail);
        let second = PaymentRecord::new(user, dec!(10), PaymentStatus::Success);

        ledger.record(&first).await.unwrap();
        ledger.record(&second).await.unwrap();

        let latest = ledger.latest(user).await.unwrap().unwrap();
        assert_eq!(latest.payment_id, second.payment_id);
        assert_eq!(latest.status, PaymentStatus::Success);
        assert!(ledger.latest(Uuid::new_v4()).await.unwrap().is_none());
    }
}
