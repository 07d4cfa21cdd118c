use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome reported for a payment attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentStatus {
    Success,
    Fail,
}

/// Latest payment attempt for a user, keyed by the user's UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub total_price: Decimal,
    pub user: Uuid,
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

impl PaymentRecord {
    /// Builds a record with a freshly generated payment id.
    pub fn new(user: Uuid, total_price: Decimal, status: PaymentStatus) -> Self {
        Self {
            total_price,
            user,
            payment_id: Uuid::new_v4(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(PaymentStatus::from_str("SUCCESS").ok(), Some(PaymentStatus::Success));
        assert_eq!(PaymentStatus::from_str("fail").ok(), Some(PaymentStatus::Fail));
        assert!(PaymentStatus::from_str("pending").is_err());
        assert_eq!(PaymentStatus::Fail.to_string(), "fail");
    }

    #[test]
    fn each_record_gets_a_new_payment_id() {
        let user = Uuid::new_v4();
        let a = PaymentRecord::new(user, Decimal::ONE, PaymentStatus::Success);
        let b = PaymentRecord::new(user, Decimal::ONE, PaymentStatus::Success);
        assert_ne!(a.payment_id, b.payment_id);
    }
}
