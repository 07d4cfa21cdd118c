use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::cache::{BasketStore, PaymentLedger};
use crate::entities::OrderModel;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Basket, CheckoutState, PaymentRecord, PaymentStatus};
use crate::repositories::{IdentityRepository, NewOrder, OrderRepository};
use crate::services::basket::BasketService;

/// Moves a basket from open to ready to submitted.
///
/// A basket is ready once it has an address and a payable amount. Creating
/// the order consumes the basket; the payment ledger keeps the last attempt
/// per user independently.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn BasketStore>,
    payments: Arc<dyn PaymentLedger>,
    identity: Arc<dyn IdentityRepository>,
    orders: Arc<dyn OrderRepository>,
    baskets: BasketService,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn BasketStore>,
        payments: Arc<dyn PaymentLedger>,
        identity: Arc<dyn IdentityRepository>,
        orders: Arc<dyn OrderRepository>,
        baskets: BasketService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            store,
            payments,
            identity,
            orders,
            baskets,
            event_sender,
        }
    }

    /// Attaches one of the user's addresses to their basket.
    #[instrument(skip(self))]
    pub async fn submit_address(&self, user_id: i32, address_id: i32) -> Result<(), ServiceError> {
        let address = self
            .identity
            .get_address(address_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("address {}", address_id)))?;
        if address.owner_id != user_id {
            warn!(user_id, address_id, owner_id = address.owner_id, "Address owned by another user");
            return Err(ServiceError::AddressOwnershipMismatch {
                address_id,
                user_id,
            });
        }
        if !self.store.set_address(user_id, address_id).await? {
            return Err(ServiceError::BasketNotFound(user_id));
        }

        info!(user_id, address_id, "Address submitted");
        self.event_sender
            .send_or_log(Event::AddressSubmitted {
                user_id,
                address_id,
            })
            .await;
        Ok(())
    }

    /// Returns the basket when it is ready for checkout.
    #[instrument(skip(self))]
    pub async fn validate(&self, user_id: i32) -> Result<Basket, ServiceError> {
        let basket = self.load(user_id).await?;
        ready_for_order(&basket)?;
        Ok(basket)
    }

    pub async fn state(&self, user_id: i32) -> Result<CheckoutState, ServiceError> {
        Ok(self.load(user_id).await?.state())
    }

    /// Turns a ready basket into an order.
    ///
    /// The basket is taken out of the store before anything is written, so
    /// concurrent submits for one user produce at most one order. The order
    /// row, its address text and its receipt are written in one transaction;
    /// if that fails the basket is put back.
    #[instrument(skip(self))]
    pub async fn create_order(&self, user_id: i32) -> Result<OrderModel, ServiceError> {
        self.validate(user_id).await?;

        let basket = self
            .store
            .take(user_id)
            .await?
            .ok_or(ServiceError::BasketNotFound(user_id))?;
        let (address_id, total_price) = match ready_for_order(&basket) {
            Ok(parts) => parts,
            Err(e) => {
                self.baskets.put_back(&basket).await;
                return Err(e);
            }
        };

        let order = match self
            .orders
            .create_order(NewOrder {
                user_id,
                address_id,
                total_price,
                lines: basket.lines().collect(),
            })
            .await
        {
            Ok(order) => order,
            Err(e) => {
                warn!(user_id, error = %e, "Order write failed; restoring basket");
                self.baskets.put_back(&basket).await;
                return Err(e);
            }
        };

        counter!("storefront.orders.created", 1);
        info!(
            user_id,
            order_id = order.id,
            total_price = %order.total_price,
            "Order created"
        );
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.id,
                user_id,
                total_price: order.total_price,
                created_at: order.created_at,
            })
            .await;
        Ok(order)
    }

    /// Records a payment attempt for the user's basket, replacing the
    /// previous attempt.
    #[instrument(skip(self))]
    pub async fn record_payment(
        &self,
        user_id: i32,
        status: PaymentStatus,
    ) -> Result<PaymentRecord, ServiceError> {
        let user = self
            .identity
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))?;
        let basket = self.load(user_id).await?;

        let total_price = match basket.pay_amount {
            Some(amount) => amount,
            None => self.baskets.raw_total(&basket).await?,
        };

        let record = PaymentRecord::new(user.uuid, total_price, status);
        self.payments.record(&record).await?;

        counter!("storefront.payments.recorded", 1, "status" => status.to_string());
        info!(
            user_id,
            payment_id = %record.payment_id,
            %status,
            %total_price,
            "Payment recorded"
        );
        self.event_sender
            .send_or_log(Event::PaymentRecorded {
                user: record.user,
                payment_id: record.payment_id,
                status,
                total_price,
            })
            .await;
        Ok(record)
    }

    /// Latest payment attempt for the user.
    pub async fn payment(&self, user_id: i32) -> Result<PaymentRecord, ServiceError> {
        let user = self
            .identity
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))?;
        self.payments
            .latest(user.uuid)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("payment for user {}", user_id)))
    }

    pub async fn orders_for_user(&self, user_id: i32) -> Result<Vec<OrderModel>, ServiceError> {
        self.orders.orders_for_user(user_id).await
    }

    async fn load(&self, user_id: i32) -> Result<Basket, ServiceError> {
        self.store
            .load(user_id)
            .await?
            .ok_or(ServiceError::BasketNotFound(user_id))
    }
}

// Address and payable amount of a basket that can become an order.
fn ready_for_order(basket: &Basket) -> Result<(i32, Decimal), ServiceError> {
    if basket.is_empty() {
        return Err(ServiceError::IncompleteBasket("basket has no lines".into()));
    }
    let Some(address_id) = basket.address_id else {
        return Err(ServiceError::IncompleteBasket(
            "no delivery address submitted".into(),
        ));
    };
    let Some(total_price) = basket.pay_amount else {
        return Err(ServiceError::IncompleteBasket("no payable amount".into()));
    };
    Ok((address_id, total_price))
}
