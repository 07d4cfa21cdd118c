use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of one basket line captured into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub quantity: u32,
    pub total: Decimal,
}

impl ReceiptLine {
    pub fn new(name: String, slug: String, price: Decimal, quantity: u32) -> Self {
        Self {
            total: price * Decimal::from(quantity),
            name,
            slug,
            price,
            quantity,
        }
    }
}

/// Order product list: product id -> receipt line.
pub type Receipt = BTreeMap<i32, ReceiptLine>;

/// Sum of line totals across a receipt.
pub fn receipt_total(receipt: &Receipt) -> Decimal {
    receipt.values().map(|line| line.total).sum()
}
