//! Domain records for baskets, payments and order receipts.

pub mod basket;
pub mod payment;
pub mod receipt;

pub use basket::{Basket, BasketLine, CheckoutState};
pub use payment::{PaymentRecord, PaymentStatus};
pub use receipt::{Receipt, ReceiptLine};
