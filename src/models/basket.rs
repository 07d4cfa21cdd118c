use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One product line held in a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub product_id: i32,
    pub quantity: u32,
}

/// Checkout readiness of a live basket.
///
/// A submitted basket no longer exists, so only the two live states are
/// observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckoutState {
    Open,
    Ready,
}

/// Per-user basket as held in the basket store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub user_id: i32,
    /// product id -> quantity, one entry per product
    pub lines: BTreeMap<i32, u32>,
    pub address_id: Option<i32>,
    pub pay_amount: Option<Decimal>,
    /// Set once a discount has been applied; never cleared while the basket lives.
    pub discount_applied: bool,
}

impl Basket {
    pub fn new(user_id: i32) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = BasketLine> + '_ {
        self.lines
            .iter()
            .map(|(&product_id, &quantity)| BasketLine {
                product_id,
                quantity,
            })
    }

    pub fn quantity_of(&self, product_id: i32) -> Option<u32> {
        self.lines.get(&product_id).copied()
    }

    pub fn has_line(&self, product_id: i32) -> bool {
        self.lines.contains_key(&product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn state(&self) -> CheckoutState {
        if self.address_id.is_some() && self.pay_amount.is_some() {
            CheckoutState::Ready
        } else {
            CheckoutState::Open
        }
    }
}
