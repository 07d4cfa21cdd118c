use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use rust_decimal::Decimal;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::str::FromStr;
use tracing::warn;

use super::CacheError;
use crate::models::{Basket, BasketLine};

const ADDRESS_FIELD: &str = "address";
const PAY_AMOUNT_FIELD: &str = "pay_amount";
const DISCOUNT_FIELD: &str = "discount";
const LINE_PREFIX: &str = "line:";

/// Result of trying to set the discount flag on a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountOutcome {
    Applied,
    AlreadyApplied,
    MissingBasket,
}

/// Result of storing a recomputed payable amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayAmountRefresh {
    Updated,
    /// Basket missing or discounted; nothing written.
    Skipped,
    /// The stored lines no longer match the ones the amount was computed from.
    Stale,
}

/// Per-user basket storage.
///
/// Every method that guards a basket invariant is a single atomic operation
/// on the user's key, so concurrent requests from the same user cannot both
/// pass a check and then both write.
#[async_trait]
pub trait BasketStore: Send + Sync {
    async fn exists(&self, user_id: i32) -> Result<bool, CacheError>;

    async fn load(&self, user_id: i32) -> Result<Option<Basket>, CacheError>;

    /// Inserts a line unless the product already has one. Returns `false` on a duplicate.
    async fn insert_line(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: u32,
    ) -> Result<bool, CacheError>;

    /// Overwrites the quantity of an existing line, returning the previous
    /// quantity, or `None` (and no write) when the line is absent.
    async fn set_line_quantity(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: u32,
    ) -> Result<Option<u32>, CacheError>;

    /// Deletes a line, returning the quantity it held.
    async fn remove_line(&self, user_id: i32, product_id: i32) -> Result<Option<u32>, CacheError>;

    /// Sets the address of an existing basket. Returns `false` (and writes
    /// nothing) when the user has no basket.
    async fn set_address(&self, user_id: i32, address_id: i32) -> Result<bool, CacheError>;

    /// Stores (or clears) the payable amount computed from `lines`, provided
    /// the basket still holds exactly those lines and carries no discount.
    async fn refresh_pay_amount(
        &self,
        user_id: i32,
        lines: &BTreeMap<i32, u32>,
        amount: Option<Decimal>,
    ) -> Result<PayAmountRefresh, CacheError>;

    /// Sets the discounted amount and the discount flag in one step.
    async fn apply_discount(
        &self,
        user_id: i32,
        amount: Decimal,
    ) -> Result<DiscountOutcome, CacheError>;

    /// Reads and deletes the whole basket in one step. Of two concurrent
    /// callers only one gets the basket.
    async fn take(&self, user_id: i32) -> Result<Option<Basket>, CacheError>;

    /// Writes a taken basket back, merging with anything created since.
    ///
    /// A line whose product already has a line again is left out and
    /// returned, so the caller can hand its stock back. The address is kept
    /// if one was set meanwhile; a discounted amount always wins.
    async fn restore(&self, basket: &Basket) -> Result<Vec<BasketLine>, CacheError>;
}

pub(crate) fn basket_key(user_id: i32) -> String {
    format!("user:{}", user_id)
}

fn line_field(product_id: i32) -> String {
    format!("{}{}", LINE_PREFIX, product_id)
}

/// Decodes the tagged hash fields of a stored basket.
pub(crate) fn decode_basket(
    user_id: i32,
    fields: HashMap<String, String>,
) -> Result<Basket, CacheError> {
    let mut basket = Basket::new(user_id);
    for (field, value) in fields {
        match field.as_str() {
            ADDRESS_FIELD => {
                basket.address_id = Some(value.parse().map_err(|_| {
                    CacheError::Serialization(format!("bad address id {:?}", value))
                })?);
            }
            PAY_AMOUNT_FIELD => {
                basket.pay_amount = Some(Decimal::from_str(&value).map_err(|_| {
                    CacheError::Serialization(format!("bad pay amount {:?}", value))
                })?);
            }
            DISCOUNT_FIELD => basket.discount_applied = true,
            other => match other.strip_prefix(LINE_PREFIX) {
                Some(product) => {
                    let product_id: i32 = product.parse().map_err(|_| {
                        CacheError::Serialization(format!("bad line field {:?}", other))
                    })?;
                    let quantity: u32 = value.parse().map_err(|_| {
                        CacheError::Serialization(format!(
                            "bad quantity {:?} for product {}",
                            value, product_id
                        ))
                    })?;
                    basket.lines.insert(product_id, quantity);
                }
                None => warn!(user_id, field = %other, "Ignoring unknown basket field"),
            },
        }
    }
    Ok(basket)
}

/// Tagged hash fields of a basket, the inverse of [`decode_basket`].
pub(crate) fn encode_basket(basket: &Basket) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = basket
        .lines()
        .map(|line| (line_field(line.product_id), line.quantity.to_string()))
        .collect();
    if let Some(address_id) = basket.address_id {
        fields.push((ADDRESS_FIELD.to_string(), address_id.to_string()));
    }
    if let Some(amount) = basket.pay_amount {
        fields.push((PAY_AMOUNT_FIELD.to_string(), amount.to_string()));
    }
    if basket.discount_applied {
        fields.push((DISCOUNT_FIELD.to_string(), "1".to_string()));
    }
    fields
}

// Returns the old value of a field and overwrites it only if it existed.
const REPLACE_FIELD: &str = r"
local old = redis.call('HGET', KEYS[1], ARGV[1])
if old then redis.call('HSET', KEYS[1], ARGV[1], ARGV[2]) end
return old
";

const TAKE_FIELD: &str = r"
local old = redis.call('HGET', KEYS[1], ARGV[1])
if old then redis.call('HDEL', KEYS[1], ARGV[1]) end
return old
";

const SET_IF_EXISTS: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then return 0 end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
";

// ARGV[1] is the amount ('' clears it), then the expected line field/quantity pairs.
const REFRESH_PAY_AMOUNT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then return 0 end
if redis.call('HEXISTS', KEYS[1], 'discount') == 1 then return 0 end
local expected = {}
local expected_count = 0
for i = 2, #ARGV, 2 do
  expected[ARGV[i]] = ARGV[i + 1]
  expected_count = expected_count + 1
end
local fields = redis.call('HGETALL', KEYS[1])
local seen = 0
for i = 1, #fields, 2 do
  if string.sub(fields[i], 1, 5) == 'line:' then
    if expected[fields[i]] ~= fields[i + 1] then return -1 end
    seen = seen + 1
  end
end
if seen ~= expected_count then return -1 end
if ARGV[1] == '' then
  redis.call('HDEL', KEYS[1], 'pay_amount')
else
  redis.call('HSET', KEYS[1], 'pay_amount', ARGV[1])
end
return 1
";

const APPLY_DISCOUNT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then return -1 end
if redis.call('HEXISTS', KEYS[1], 'discount') == 1 then return 0 end
redis.call('HSET', KEYS[1], 'pay_amount', ARGV[1], 'discount', '1')
return 1
";

const TAKE_BASKET: &str = r"
local fields = redis.call('HGETALL', KEYS[1])
if #fields > 0 then redis.call('DEL', KEYS[1]) end
return fields
";

// ARGV[1] is '1' when the basket carries a discount, then field/value pairs.
const RESTORE_BASKET: &str = r"
local rejected = {}
for i = 2, #ARGV, 2 do
  local field, value = ARGV[i], ARGV[i + 1]
  if ARGV[1] == '1' and (field == 'pay_amount' or field == 'discount') then
    redis.call('HSET', KEYS[1], field, value)
  elseif redis.call('HSETNX', KEYS[1], field, value) == 0 then
    table.insert(rejected, field)
  end
end
return rejected
";

/// Basket store on a Redis hash per user (`user:<id>`).
#[derive(Clone)]
pub struct RedisBasketStore {
    conn: ConnectionManager,
    replace_field: Script,
    take_field: Script,
    set_if_exists: Script,
    refresh_pay_amount: Script,
    apply_discount: Script,
    take_basket: Script,
    restore_basket: Script,
}

impl RedisBasketStore {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            replace_field: Script::new(REPLACE_FIELD),
            take_field: Script::new(TAKE_FIELD),
            set_if_exists: Script::new(SET_IF_EXISTS),
            refresh_pay_amount: Script::new(REFRESH_PAY_AMOUNT),
            apply_discount: Script::new(APPLY_DISCOUNT),
            take_basket: Script::new(TAKE_BASKET),
            restore_basket: Script::new(RESTORE_BASKET),
        }
    }
}

fn parse_quantity(raw: Option<String>) -> Result<Option<u32>, CacheError> {
    raw.map(|value| {
        value
            .parse::<u32>()
            .map_err(|_| CacheError::Serialization(format!("bad quantity {:?}", value)))
    })
    .transpose()
}

#[async_trait]
impl BasketStore for RedisBasketStore {
    async fn exists(&self, user_id: i32) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(basket_key(user_id)).await?)
    }

    async fn load(&self, user_id: i32) -> Result<Option<Basket>, CacheError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(basket_key(user_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_basket(user_id, fields).map(Some)
    }

    async fn insert_line(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: u32,
    ) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn
            .hset_nx(basket_key(user_id), line_field(product_id), quantity)
            .await?)
    }

    async fn set_line_quantity(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: u32,
    ) -> Result<Option<u32>, CacheError> {
        let mut conn = self.conn.clone();
        let old: Option<String> = self
            .replace_field
            .key(basket_key(user_id))
            .arg(line_field(product_id))
            .arg(quantity)
            .invoke_async(&mut conn)
            .await?;
        parse_quantity(old)
    }

    async fn remove_line(&self, user_id: i32, product_id: i32) -> Result<Option<u32>, CacheError> {
        let mut conn = self.conn.clone();
        let old: Option<String> = self
            .take_field
            .key(basket_key(user_id))
            .arg(line_field(product_id))
            .invoke_async(&mut conn)
            .await?;
        parse_quantity(old)
    }

    async fn set_address(&self, user_id: i32, address_id: i32) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let written: i64 = self
            .set_if_exists
            .key(basket_key(user_id))
            .arg(ADDRESS_FIELD)
            .arg(address_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(written == 1)
    }

    async fn refresh_pay_amount(
        &self,
        user_id: i32,
        lines: &BTreeMap<i32, u32>,
        amount: Option<Decimal>,
    ) -> Result<PayAmountRefresh, CacheError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.refresh_pay_amount.prepare_invoke();
        invocation
            .key(basket_key(user_id))
            .arg(amount.map(|a| a.to_string()).unwrap_or_default());
        for (product_id, quantity) in lines {
            invocation.arg(line_field(*product_id)).arg(quantity.to_string());
        }
        let outcome: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(match outcome {
            1 => PayAmountRefresh::Updated,
            0 => PayAmountRefresh::Skipped,
            _ => PayAmountRefresh::Stale,
        })
    }

    async fn apply_discount(
        &self,
        user_id: i32,
        amount: Decimal,
    ) -> Result<DiscountOutcome, CacheError> {
        let mut conn = self.conn.clone();
        let outcome: i64 = self
            .apply_discount
            .key(basket_key(user_id))
            .arg(amount.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok(match outcome {
            1 => DiscountOutcome::Applied,
            0 => DiscountOutcome::AlreadyApplied,
            _ => DiscountOutcome::MissingBasket,
        })
    }

    async fn take(&self, user_id: i32) -> Result<Option<Basket>, CacheError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = self
            .take_basket
            .key(basket_key(user_id))
            .invoke_async(&mut conn)
            .await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_basket(user_id, fields).map(Some)
    }

    async fn restore(&self, basket: &Basket) -> Result<Vec<BasketLine>, CacheError> {
        let fields = encode_basket(basket);
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut invocation = self.restore_basket.prepare_invoke();
        invocation
            .key(basket_key(basket.user_id))
            .arg(if basket.discount_applied { "1" } else { "0" });
        for (field, value) in &fields {
            invocation.arg(field).arg(value);
        }
        let rejected: Vec<String> = invocation.invoke_async(&mut conn).await?;
        Ok(rejected
            .iter()
            .filter_map(|field| field.strip_prefix(LINE_PREFIX)?.parse::<i32>().ok())
            .filter_map(|product_id| {
                basket.quantity_of(product_id).map(|quantity| BasketLine {
                    product_id,
                    quantity,
                })
            })
            .collect())
    }
}

/// Basket store kept in process memory.
///
/// Mirrors Redis hash semantics: a basket left with no fields disappears.
#[derive(Debug, Default)]
pub struct InMemoryBasketStore {
    baskets: DashMap<i32, Basket>,
}

fn is_vacant(basket: &Basket) -> bool {
    basket.lines.is_empty()
        && basket.address_id.is_none()
        && basket.pay_amount.is_none()
        && !basket.discount_applied
}

impl InMemoryBasketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(&self, user_id: i32) {
        self.baskets.remove_if(&user_id, |_, basket| is_vacant(basket));
    }
}

#[async_trait]
impl BasketStore for InMemoryBasketStore {
    async fn exists(&self, user_id: i32) -> Result<bool, CacheError> {
        Ok(self.baskets.contains_key(&user_id))
    }

    async fn load(&self, user_id: i32) -> Result<Option<Basket>, CacheError> {
        Ok(self.baskets.get(&user_id).map(|basket| basket.clone()))
    }

    async fn insert_line(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: u32,
    ) -> Result<bool, CacheError> {
        let mut basket = self
            .baskets
            .entry(user_id)
            .or_insert_with(|| Basket::new(user_id));
        Ok(match basket.lines.entry(product_id) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(quantity);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        })
    }

    async fn set_line_quantity(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: u32,
    ) -> Result<Option<u32>, CacheError> {
        let Some(mut basket) = self.baskets.get_mut(&user_id) else {
            return Ok(None);
        };
        Ok(basket
            .lines
            .get_mut(&product_id)
            .map(|held| std::mem::replace(held, quantity)))
    }

    async fn remove_line(&self, user_id: i32, product_id: i32) -> Result<Option<u32>, CacheError> {
        let removed = match self.baskets.get_mut(&user_id) {
            Some(mut basket) => basket.lines.remove(&product_id),
            None => return Ok(None),
        };
        self.prune(user_id);
        Ok(removed)
    }

    async fn set_address(&self, user_id: i32, address_id: i32) -> Result<bool, CacheError> {
        Ok(match self.baskets.get_mut(&user_id) {
            Some(mut basket) => {
                basket.address_id = Some(address_id);
                true
            }
            None => false,
        })
    }

    async fn refresh_pay_amount(
        &self,
        user_id: i32,
        lines: &BTreeMap<i32, u32>,
        amount: Option<Decimal>,
    ) -> Result<PayAmountRefresh, CacheError> {
        let outcome = match self.baskets.get_mut(&user_id) {
            Some(mut basket) if !basket.discount_applied => {
                if basket.lines == *lines {
                    basket.pay_amount = amount;
                    PayAmountRefresh::Updated
                } else {
                    PayAmountRefresh::Stale
                }
            }
            _ => PayAmountRefresh::Skipped,
        };
        self.prune(user_id);
        Ok(outcome)
    }

    async fn apply_discount(
        &self,
        user_id: i32,
        amount: Decimal,
    ) -> Result<DiscountOutcome, CacheError> {
        Ok(match self.baskets.entry(user_id) {
            Entry::Vacant(_) => DiscountOutcome::MissingBasket,
            Entry::Occupied(mut slot) => {
                let basket = slot.get_mut();
                if basket.discount_applied {
                    DiscountOutcome::AlreadyApplied
                } else {
                    basket.pay_amount = Some(amount);
                    basket.discount_applied = true;
                    DiscountOutcome::Applied
                }
            }
        })
    }

    async fn take(&self, user_id: i32) -> Result<Option<Basket>, CacheError> {
        Ok(self.baskets.remove(&user_id).map(|(_, basket)| basket))
    }

    async fn restore(&self, basket: &Basket) -> Result<Vec<BasketLine>, CacheError> {
        if is_vacant(basket) {
            return Ok(Vec::new());
        }
        let mut current = self
            .baskets
            .entry(basket.user_id)
            .or_insert_with(|| Basket::new(basket.user_id));
        let mut rejected = Vec::new();
        for line in basket.lines() {
            match current.lines.entry(line.product_id) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(line.quantity);
                }
                btree_map::Entry::Occupied(_) => rejected.push(line),
            }
        }
        if current.address_id.is_none() {
            current.address_id = basket.address_id;
        }
        if basket.discount_applied {
            current.pay_amount = basket.pay_amount;
            current.discount_applied = true;
        } else if current.pay_amount.is_none() {
            current.pay_amount = basket.pay_amount;
        }
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn decodes_tagged_fields_into_basket() {
        let basket = decode_basket(
            4,
            fields(&[
                ("line:12", "2"),
                ("line:7", "1"),
                ("address", "31"),
                ("pay_amount", "170.00"),
                ("discount", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(basket.user_id, 4);
        assert_eq!(basket.quantity_of(12), Some(2));
        assert_eq!(basket.quantity_of(7), Some(1));
        assert_eq!(basket.address_id, Some(31));
        assert_eq!(basket.pay_amount, Some(dec!(170.00)));
        assert!(basket.discount_applied);
    }

    #[test]
    fn reserved_names_never_read_as_lines() {
        let basket = decode_basket(1, fields(&[("address", "5"), ("line:5", "3")])).unwrap();
        assert_eq!(basket.lines.len(), 1);
        assert_eq!(basket.address_id, Some(5));
    }

    #[test]
    fn corrupt_quantity_is_a_serialization_error() {
        let err = decode_basket(1, fields(&[("line:5", "many")])).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[test]
    fn basket_key_shape() {
        assert_eq!(basket_key(42), "user:42");
        assert_eq!(line_field(9), "line:9");
    }

    #[tokio::test]
    async fn in_memory_insert_rejects_duplicates() {
        let store = InMemoryBasketStore::new();
        assert!(store.insert_line(1, 10, 2).await.unwrap());
        assert!(!store.insert_line(1, 10, 5).await.unwrap());
        let basket = store.load(1).await.unwrap().unwrap();
        assert_eq!(basket.quantity_of(10), Some(2));
    }

    #[tokio::test]
    async fn in_memory_basket_vanishes_when_last_field_goes() {
        let store = InMemoryBasketStore::new();
        store.insert_line(1, 10, 2).await.unwrap();
        assert_eq!(store.remove_line(1, 10).await.unwrap(), Some(2));
        assert!(!store.exists(1).await.unwrap());
        assert_eq!(store.remove_line(1, 10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_discount_is_set_once() {
        let store = InMemoryBasketStore::new();
        assert_eq!(
            store.apply_discount(1, dec!(5)).await.unwrap(),
            DiscountOutcome::MissingBasket
        );

        store.insert_line(1, 10, 1).await.unwrap();
        assert_eq!(
            store.apply_discount(1, dec!(5)).await.unwrap(),
            DiscountOutcome::Applied
        );
        assert_eq!(
            store.apply_discount(1, dec!(1)).await.unwrap(),
            DiscountOutcome::AlreadyApplied
        );
        let lines = store.load(1).await.unwrap().unwrap().lines;
        assert_eq!(
            store.refresh_pay_amount(1, &lines, Some(dec!(99))).await.unwrap(),
            PayAmountRefresh::Skipped
        );
        let basket = store.load(1).await.unwrap().unwrap();
        assert_eq!(basket.pay_amount, Some(dec!(5)));
    }

    #[tokio::test]
    async fn in_memory_refresh_refuses_outdated_lines() {
        let store = InMemoryBasketStore::new();
        store.insert_line(1, 10, 1).await.unwrap();
        let snapshot = store.load(1).await.unwrap().unwrap().lines;
        store.insert_line(1, 11, 2).await.unwrap();

        assert_eq!(
            store.refresh_pay_amount(1, &snapshot, Some(dec!(3))).await.unwrap(),
            PayAmountRefresh::Stale
        );
        assert_eq!(store.load(1).await.unwrap().unwrap().pay_amount, None);

        let current = store.load(1).await.unwrap().unwrap().lines;
        assert_eq!(
            store.refresh_pay_amount(1, &current, Some(dec!(7))).await.unwrap(),
            PayAmountRefresh::Updated
        );
        assert_eq!(
            store.refresh_pay_amount(2, &current, Some(dec!(7))).await.unwrap(),
            PayAmountRefresh::Skipped
        );
    }

    #[tokio::test]
    async fn in_memory_address_needs_a_basket() {
        let store = InMemoryBasketStore::new();
        assert!(!store.set_address(1, 3).await.unwrap());
        assert!(!store.exists(1).await.unwrap());

        store.insert_line(1, 10, 1).await.unwrap();
        assert!(store.set_address(1, 3).await.unwrap());
        assert_eq!(store.load(1).await.unwrap().unwrap().address_id, Some(3));
    }

    #[tokio::test]
    async fn in_memory_take_hands_the_basket_to_one_caller() {
        let store = InMemoryBasketStore::new();
        store.insert_line(1, 10, 2).await.unwrap();

        let taken = store.take(1).await.unwrap().expect("basket");
        assert_eq!(taken.quantity_of(10), Some(2));
        assert!(store.take(1).await.unwrap().is_none());
        assert!(!store.exists(1).await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_restore_merges_with_newer_lines() {
        let store = InMemoryBasketStore::new();
        store.insert_line(1, 10, 2).await.unwrap();
        store.insert_line(1, 11, 1).await.unwrap();
        store.set_address(1, 4).await.unwrap();
        store.apply_discount(1, dec!(12)).await.unwrap();
        let taken = store.take(1).await.unwrap().unwrap();

        // a line for product 11 came back while the basket was out
        store.insert_line(1, 11, 5).await.unwrap();
        store
            .refresh_pay_amount(1, &BTreeMap::from([(11, 5)]), Some(dec!(50)))
            .await
            .unwrap();

        let rejected = store.restore(&taken).await.unwrap();
        assert_eq!(
            rejected,
            vec![BasketLine {
                product_id: 11,
                quantity: 1
            }]
        );
        let basket = store.load(1).await.unwrap().unwrap();
        assert_eq!(basket.quantity_of(10), Some(2));
        assert_eq!(basket.quantity_of(11), Some(5));
        assert_eq!(basket.address_id, Some(4));
        assert_eq!(basket.pay_amount, Some(dec!(12)));
        assert!(basket.discount_applied);
    }

    #[test]
    fn encoded_fields_decode_to_the_same_basket() {
        let mut basket = Basket::new(3);
        basket.lines.insert(8, 2);
        basket.address_id = Some(1);
        basket.pay_amount = Some(dec!(9.50));
        basket.discount_applied = true;

        let fields = encode_basket(&basket).into_iter().collect();
        assert_eq!(decode_basket(3, fields).unwrap(), basket);
    }

    #[tokio::test]
    async fn in_memory_set_quantity_only_touches_existing_lines() {
        let store = InMemoryBasketStore::new();
        store.insert_line(1, 10, 1).await.unwrap();
        assert_eq!(store.set_line_quantity(1, 10, 4).await.unwrap(), Some(1));
        assert_eq!(store.set_line_quantity(1, 11, 4).await.unwrap(), None);
        let basket = store.load(1).await.unwrap().unwrap();
        assert_eq!(basket.quantity_of(10), Some(4));
        assert!(!basket.has_line(11));
    }
}
