use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::cache::{BasketStore, DiscountOutcome};
use crate::entities::DiscountKind;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::{DiscountGrant, DiscountRepository};
use crate::services::basket::BasketService;

/// Validates discount codes and applies them once per basket.
#[derive(Clone)]
pub struct DiscountEngine {
    discounts: Arc<dyn DiscountRepository>,
    store: Arc<dyn BasketStore>,
    baskets: BasketService,
    event_sender: EventSender,
}

impl DiscountEngine {
    pub fn new(
        discounts: Arc<dyn DiscountRepository>,
        store: Arc<dyn BasketStore>,
        baskets: BasketService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            discounts,
            store,
            baskets,
            event_sender,
        }
    }

    /// Looks up a code granted to this user.
    #[instrument(skip(self))]
    pub async fn check(&self, user_id: i32, code: &str) -> Result<DiscountGrant, ServiceError> {
        self.discounts
            .find_user_discount(user_id, code)
            .await?
            .ok_or_else(|| ServiceError::CodeNotFound(code.to_string()))
    }

    /// Price after applying a discount to `total`. Cash discounts are not
    /// clamped, so a large cash value can produce a negative amount.
    pub fn calculate(kind: DiscountKind, value: Decimal, total: Decimal) -> Decimal {
        match kind {
            DiscountKind::Cash => total - value,
            DiscountKind::Percentage => total - total * value / Decimal::ONE_HUNDRED,
        }
    }

    /// Applies a code to the user's basket. At most one discount ever lands
    /// on a basket, whatever code is offered the second time.
    #[instrument(skip(self))]
    pub async fn apply(&self, user_id: i32, code: &str) -> Result<Decimal, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::InvalidInput("discount code is required".into()));
        }

        let basket = self
            .store
            .load(user_id)
            .await?
            .ok_or(ServiceError::BasketNotFound(user_id))?;
        if basket.discount_applied {
            counter!("storefront.discount.already_used", 1);
            return Err(ServiceError::DiscountAlreadyUsed);
        }

        let grant = match self.check(user_id, code).await {
            Ok(grant) => grant,
            Err(ServiceError::CodeNotFound(_)) => {
                counter!("storefront.discount.invalid_code", 1);
                warn!(user_id, code, "Rejected discount code");
                return Err(ServiceError::InvalidCode(code.to_string()));
            }
            Err(other) => return Err(other),
        };

        let total = self.baskets.raw_total(&basket).await?;
        let pay_amount = Self::calculate(grant.kind, grant.value, total);

        match self.store.apply_discount(user_id, pay_amount).await? {
            DiscountOutcome::Applied => {}
            DiscountOutcome::AlreadyApplied => {
                counter!("storefront.discount.already_used", 1);
                return Err(ServiceError::DiscountAlreadyUsed);
            }
            DiscountOutcome::MissingBasket => return Err(ServiceError::BasketNotFound(user_id)),
        }

        counter!("storefront.discount.applied", 1);
        info!(user_id, code, %total, %pay_amount, "Applied discount");
        self.event_sender
            .send_or_log(Event::DiscountApplied {
                user_id,
                code: code.to_string(),
                pay_amount,
            })
            .await;
        Ok(pay_amount)
    }
}
