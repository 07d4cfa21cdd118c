use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::repositories::CatalogRepository;

/// Available stock per product.
///
/// Reserve and release are each a single conditional statement in the
/// catalog, so concurrent reservations never take stock below zero.
#[derive(Clone)]
pub struct StockLedger {
    catalog: Arc<dyn CatalogRepository>,
}

impl StockLedger {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Takes `quantity` units out of the product's available stock.
    #[instrument(skip(self))]
    pub async fn reserve(&self, product_id: i32, quantity: u32) -> Result<(), ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::InvalidInput(
                "quantity must be at least 1".to_string(),
            ));
        }

        if self
            .catalog
            .adjust_warehouse(product_id, -i64::from(quantity))
            .await?
        {
            counter!("storefront.stock.reserved", u64::from(quantity));
            info!(product_id, quantity, "Reserved stock");
            return Ok(());
        }

        // Nothing changed: tell a missing product apart from a short one.
        match self.catalog.get_product(product_id).await? {
            None => Err(ServiceError::InvalidInput(format!(
                "unknown product {}",
                product_id
            ))),
            Some(product) => {
                counter!("storefront.stock.out_of_stock", 1);
                warn!(
                    product_id,
                    requested = quantity,
                    available = product.warehouse,
                    "Reservation refused"
                );
                Err(ServiceError::OutOfStock(format!(
                    "{} has {} available, {} requested",
                    product.slug, product.warehouse, quantity
                )))
            }
        }
    }

    /// Returns `quantity` units to the product's available stock.
    #[instrument(skip(self))]
    pub async fn release(&self, product_id: i32, quantity: u32) -> Result<(), ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::InvalidInput(
                "quantity must be at least 1".to_string(),
            ));
        }

        if !self
            .catalog
            .adjust_warehouse(product_id, i64::from(quantity))
            .await?
        {
            return Err(ServiceError::InvalidInput(format!(
                "unknown product {}",
                product_id
            )));
        }
        counter!("storefront.stock.released", u64::from(quantity));
        info!(product_id, quantity, "Released stock");
        Ok(())
    }

    pub async fn available(&self, product_id: i32) -> Result<i32, ServiceError> {
        self.catalog
            .get_product(product_id)
            .await?
            .map(|product| product.warehouse)
            .ok_or_else(|| ServiceError::InvalidInput(format!("unknown product {}", product_id)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repositories::ProductRecord;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Catalog kept in a map; adjustments are atomic under the lock.
    #[derive(Default)]
    pub(crate) struct MapCatalog {
        products: Mutex<HashMap<i32, ProductRecord>>,
    }

    impl MapCatalog {
        pub(crate) fn with_product(id: i32, price: Decimal, warehouse: i32) -> Self {
            let catalog = Self::default();
            catalog.insert(id, price, warehouse);
            catalog
        }

        pub(crate) fn insert(&self, id: i32, price: Decimal, warehouse: i32) {
            self.products.lock().unwrap().insert(
                id,
                ProductRecord {
                    id,
                    name: format!("Product {}", id),
                    slug: format!("product-{}", id),
                    price,
                    warehouse,
                },
            );
        }
    }

    #[async_trait]
    impl CatalogRepository for MapCatalog {
        async fn get_product(&self, id: i32) -> Result<Option<ProductRecord>, ServiceError> {
            Ok(self.products.lock().unwrap().get(&id).cloned())
        }

        async fn adjust_warehouse(&self, id: i32, delta: i64) -> Result<bool, ServiceError> {
            let mut products = self.products.lock().unwrap();
            match products.get_mut(&id) {
                Some(p) if i64::from(p.warehouse) + delta >= 0 => {
                    p.warehouse = (i64::from(p.warehouse) + delta) as i32;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn ledger(warehouse: i32) -> StockLedger {
        StockLedger::new(Arc::new(MapCatalog::with_product(1, Decimal::TEN, warehouse)))
    }

    #[tokio::test]
    async fn reserve_takes_exactly_what_is_available() {
        let stock = ledger(5);
        stock.reserve(1, 5).await.unwrap();
        assert_eq!(stock.available(1).await.unwrap(), 0);
        assert_matches!(stock.reserve(1, 1).await, Err(ServiceError::OutOfStock(_)));
        assert_eq!(stock.available(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_product_and_zero_quantity_are_invalid() {
        let stock = ledger(5);
        assert_matches!(stock.reserve(9, 1).await, Err(ServiceError::InvalidInput(_)));
        assert_matches!(stock.release(9, 1).await, Err(ServiceError::InvalidInput(_)));
        assert_matches!(stock.reserve(1, 0).await, Err(ServiceError::InvalidInput(_)));
        assert_matches!(stock.available(9).await, Err(ServiceError::InvalidInput(_)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(u32),
        Release(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..8).prop_map(Op::Reserve),
            (1u32..8).prop_map(Op::Release),
        ]
    }

    proptest! {
        #[test]
        fn available_never_drops_below_zero(start in 0i32..20, ops in prop::collection::vec(op(), 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let stock = ledger(start);
                let mut expected = start;
                for op in ops {
                    match op {
                        Op::Reserve(q) => match stock.reserve(1, q).await {
                            Ok(()) => expected -= q as i32,
                            Err(ServiceError::OutOfStock(_)) => prop_assert!((q as i32) > expected),
                            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                        },
                        Op::Release(q) => {
                            stock.release(1, q).await.unwrap();
                            expected += q as i32;
                        }
                    }
                    let available = stock.available(1).await.unwrap();
                    prop_assert!(available >= 0);
                    prop_assert_eq!(available, expected);
                }
                Ok(())
            })?;
        }
    }
}
