use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::cache::{BasketStore, PayAmountRefresh};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::Basket;
use crate::repositories::{CatalogRepository, ProductRecord};
use crate::services::stock_ledger::StockLedger;

const PAY_AMOUNT_ATTEMPTS: usize = 5;

/// Product id and quantity as submitted by a client.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct BasketItemInput {
    #[validate(range(min = 1))]
    pub product_id: i32,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

impl BasketItemInput {
    /// Parses raw request parameters. Missing, non-numeric and zero values
    /// are all `InvalidInput`.
    pub fn parse(product_id: Option<&str>, quantity: Option<&str>) -> Result<Self, ServiceError> {
        let product_id = parse_number("product_id", product_id)?;
        let quantity = parse_number("quantity", quantity)?;
        let input = Self {
            product_id,
            quantity,
        };
        input.validate()?;
        Ok(input)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<T, ServiceError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput(format!("{} is required", name)))?;
    raw.parse()
        .map_err(|_| ServiceError::InvalidInput(format!("{} must be a positive integer", name)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasketViewItem {
    pub product_id: i32,
    pub name: String,
    pub quantity: u32,
}

/// Read-only snapshot of a basket for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasketView {
    pub items: Vec<BasketViewItem>,
    pub address_id: Option<i32>,
    /// Σ price × quantity over the current lines
    pub total_price: Decimal,
    /// Present only once a payable amount has been stored
    pub price_after_discount: Option<Decimal>,
}

/// Service for managing per-user baskets
#[derive(Clone)]
pub struct BasketService {
    store: Arc<dyn BasketStore>,
    catalog: Arc<dyn CatalogRepository>,
    stock: StockLedger,
    event_sender: EventSender,
}

impl BasketService {
    pub fn new(
        store: Arc<dyn BasketStore>,
        catalog: Arc<dyn CatalogRepository>,
        stock: StockLedger,
        event_sender: EventSender,
    ) -> Self {
        Self {
            store,
            catalog,
            stock,
            event_sender,
        }
    }

    /// Adds a new line to the user's basket, reserving its stock.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: i32, product_id: i32, quantity: u32) -> Result<(), ServiceError> {
        BasketItemInput {
            product_id,
            quantity,
        }
        .validate()?;

        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "unknown product {}",
                product_id
            )));
        }

        if let Some(basket) = self.store.load(user_id).await? {
            if basket.has_line(product_id) {
                counter!("storefront.basket.duplicate_line", 1);
                return Err(ServiceError::DuplicateLine(product_id));
            }
        }

        self.stock.reserve(product_id, quantity).await?;

        let inserted = match self.store.insert_line(user_id, product_id, quantity).await {
            Ok(inserted) => inserted,
            Err(e) => {
                self.release_quietly(product_id, quantity).await;
                return Err(e.into());
            }
        };
        if !inserted {
            // A concurrent add won the line; hand its stock back.
            self.stock.release(product_id, quantity).await?;
            counter!("storefront.basket.duplicate_line", 1);
            return Err(ServiceError::DuplicateLine(product_id));
        }

        self.refresh_pay_amount(user_id).await?;

        counter!("storefront.basket.items_added", 1);
        info!(user_id, product_id, quantity, "Added basket line");
        self.event_sender
            .send_or_log(Event::BasketItemAdded {
                user_id,
                product_id,
                quantity,
            })
            .await;
        Ok(())
    }

    /// Removes a line and returns its stock.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: i32, product_id: i32) -> Result<(), ServiceError> {
        let quantity = self
            .store
            .remove_line(user_id, product_id)
            .await?
            .ok_or(ServiceError::LineNotFound(product_id))?;

        self.stock.release(product_id, quantity).await?;
        self.refresh_pay_amount(user_id).await?;

        counter!("storefront.basket.items_removed", 1);
        info!(user_id, product_id, quantity, "Removed basket line");
        self.event_sender
            .send_or_log(Event::BasketItemRemoved {
                user_id,
                product_id,
                quantity,
            })
            .await;
        Ok(())
    }

    /// Changes a line's quantity, reserving or releasing the difference.
    ///
    /// The new quantity (not the growth) is checked against what is still
    /// available, so growing a line can be refused even when the extra units
    /// would fit.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: u32,
    ) -> Result<(), ServiceError> {
        BasketItemInput {
            product_id,
            quantity,
        }
        .validate()?;

        let current = self
            .store
            .load(user_id)
            .await?
            .and_then(|basket| basket.quantity_of(product_id))
            .ok_or(ServiceError::LineNotFound(product_id))?;

        let available = self.stock.available(product_id).await?;
        if i64::from(quantity) > i64::from(available) {
            counter!("storefront.stock.out_of_stock", 1);
            return Err(ServiceError::OutOfStock(format!(
                "product {} has {} available, {} requested",
                product_id, available, quantity
            )));
        }

        if quantity > current {
            self.stock.reserve(product_id, quantity - current).await?;
        }

        let previous = match self
            .store
            .set_line_quantity(user_id, product_id, quantity)
            .await
        {
            Ok(Some(previous)) => previous,
            Ok(None) => {
                // Line vanished between the read and the write.
                if quantity > current {
                    self.release_quietly(product_id, quantity - current).await;
                }
                return Err(ServiceError::LineNotFound(product_id));
            }
            Err(e) => {
                if quantity > current {
                    self.release_quietly(product_id, quantity - current).await;
                }
                return Err(e.into());
            }
        };

        if quantity < current {
            self.stock.release(product_id, current - quantity).await?;
        }
        if previous != current {
            warn!(
                user_id,
                product_id, previous, current, "Basket line changed during update"
            );
        }

        self.refresh_pay_amount(user_id).await?;

        counter!("storefront.basket.items_updated", 1);
        info!(user_id, product_id, from = current, to = quantity, "Updated basket line");
        self.event_sender
            .send_or_log(Event::BasketItemUpdated {
                user_id,
                product_id,
                old_quantity: current,
                new_quantity: quantity,
            })
            .await;
        Ok(())
    }

    /// Snapshot of the user's basket with product names and totals.
    #[instrument(skip(self))]
    pub async fn display(&self, user_id: i32) -> Result<BasketView, ServiceError> {
        let basket = self
            .store
            .load(user_id)
            .await?
            .ok_or(ServiceError::BasketNotFound(user_id))?;

        let priced = self.price_lines(&basket).await?;
        let total_price = priced
            .iter()
            .map(|(product, quantity)| product.price * Decimal::from(*quantity))
            .sum();
        let items = priced
            .into_iter()
            .map(|(product, quantity)| BasketViewItem {
                product_id: product.id,
                name: product.name,
                quantity,
            })
            .collect();

        Ok(BasketView {
            items,
            address_id: basket.address_id,
            total_price,
            price_after_discount: basket.pay_amount,
        })
    }

    pub async fn exists(&self, user_id: i32) -> Result<bool, ServiceError> {
        Ok(self.store.exists(user_id).await?)
    }

    /// Drops the whole basket, returning every line's stock.
    ///
    /// The basket is taken in one step, so only the lines actually removed
    /// are released.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: i32) -> Result<(), ServiceError> {
        let basket = self
            .store
            .take(user_id)
            .await?
            .ok_or(ServiceError::BasketNotFound(user_id))?;

        for line in basket.lines() {
            self.stock.release(line.product_id, line.quantity).await?;
        }

        counter!("storefront.basket.cleared", 1);
        info!(user_id, lines = basket.lines.len(), "Cleared basket");
        self.event_sender
            .send_or_log(Event::BasketCleared { user_id })
            .await;
        Ok(())
    }

    /// Writes a taken basket back after a failed checkout.
    ///
    /// Lines that collide with lines added in the meantime have their stock
    /// released. Failures are logged; the caller already has an error to report.
    pub(crate) async fn put_back(&self, basket: &Basket) {
        let user_id = basket.user_id;
        match self.store.restore(basket).await {
            Ok(rejected) => {
                for line in rejected {
                    warn!(
                        user_id,
                        product_id = line.product_id,
                        "Dropping line that was re-added during checkout"
                    );
                    self.release_quietly(line.product_id, line.quantity).await;
                }
                if let Err(e) = self.refresh_pay_amount(user_id).await {
                    warn!(user_id, error = %e, "Failed to refresh pay amount after restore");
                }
            }
            Err(e) => {
                error!(user_id, lines = ?basket.lines, error = %e, "Failed to restore basket");
                for line in basket.lines() {
                    self.release_quietly(line.product_id, line.quantity).await;
                }
            }
        }
    }

    /// Raw total of a basket: Σ price × quantity.
    pub async fn raw_total(&self, basket: &Basket) -> Result<Decimal, ServiceError> {
        Ok(self
            .price_lines(basket)
            .await?
            .iter()
            .map(|(product, quantity)| product.price * Decimal::from(*quantity))
            .sum())
    }

    async fn price_lines(&self, basket: &Basket) -> Result<Vec<(ProductRecord, u32)>, ServiceError> {
        let mut priced = Vec::with_capacity(basket.lines.len());
        for line in basket.lines() {
            let product = self
                .catalog
                .get_product(line.product_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("product {}", line.product_id)))?;
            priced.push((product, line.quantity));
        }
        Ok(priced)
    }

    // Keeps pay_amount equal to the raw total until a discount fixes it.
    // Retries when the lines change between the read and the write.
    async fn refresh_pay_amount(&self, user_id: i32) -> Result<(), ServiceError> {
        for _ in 0..PAY_AMOUNT_ATTEMPTS {
            let Some(basket) = self.store.load(user_id).await? else {
                return Ok(());
            };
            if basket.discount_applied {
                return Ok(());
            }
            let amount = if basket.is_empty() {
                None
            } else {
                Some(self.raw_total(&basket).await?)
            };
            match self
                .store
                .refresh_pay_amount(user_id, &basket.lines, amount)
                .await?
            {
                PayAmountRefresh::Stale => continue,
                PayAmountRefresh::Updated | PayAmountRefresh::Skipped => return Ok(()),
            }
        }
        // whoever keeps changing the lines refreshes after their own write
        warn!(user_id, "Basket lines kept changing; pay amount left to the next writer");
        Ok(())
    }

    async fn release_quietly(&self, product_id: i32, quantity: u32) {
        if let Err(e) = self.stock.release(product_id, quantity).await {
            error!(product_id, quantity, error = %e, "Failed to return reserved stock");
        }
    }
}
