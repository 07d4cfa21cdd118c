use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use storefront::cache::{
    BasketStore, DiscountOutcome, PayAmountRefresh, PaymentLedger, RedisBasketStore,
    RedisPaymentLedger,
};
use storefront::models::{BasketLine, PaymentRecord, PaymentStatus};
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string())
}

fn user_id() -> i32 {
    // spread runs over the key space so reruns do not collide
    (Uuid::new_v4().as_u128() % 1_000_000) as i32 + 1
}

// These tests need a running Redis server.
// Run with: cargo test -- --ignored redis
#[tokio::test]
#[ignore]
async fn redis_basket_lines_are_unique_and_removable() {
    let store = RedisBasketStore::connect(&redis_url()).await.expect("redis");
    let user = user_id();
    store.take(user).await.unwrap();

    assert!(store.insert_line(user, 7, 2).await.unwrap());
    assert!(!store.insert_line(user, 7, 5).await.unwrap());
    assert_eq!(store.set_line_quantity(user, 7, 4).await.unwrap(), Some(2));
    assert_eq!(store.set_line_quantity(user, 8, 1).await.unwrap(), None);

    let basket = store.load(user).await.unwrap().expect("basket");
    assert_eq!(basket.quantity_of(7), Some(4));
    assert!(!basket.has_line(8));

    assert_eq!(store.remove_line(user, 7).await.unwrap(), Some(4));
    assert_eq!(store.remove_line(user, 7).await.unwrap(), None);
    assert!(!store.exists(user).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn redis_discount_is_applied_once() {
    let store = RedisBasketStore::connect(&redis_url()).await.expect("redis");
    let user = user_id();
    store.take(user).await.unwrap();

    assert_eq!(
        store.apply_discount(user, dec!(1)).await.unwrap(),
        DiscountOutcome::MissingBasket
    );

    store.insert_line(user, 1, 1).await.unwrap();
    let lines = BTreeMap::from([(1, 1)]);
    assert_eq!(
        store.refresh_pay_amount(user, &lines, Some(dec!(50))).await.unwrap(),
        PayAmountRefresh::Updated
    );
    assert_eq!(
        store.apply_discount(user, dec!(40)).await.unwrap(),
        DiscountOutcome::Applied
    );
    assert_eq!(
        store.apply_discount(user, dec!(10)).await.unwrap(),
        DiscountOutcome::AlreadyApplied
    );
    assert_eq!(
        store.refresh_pay_amount(user, &lines, Some(dec!(99))).await.unwrap(),
        PayAmountRefresh::Skipped
    );

    assert!(store.set_address(user, 12).await.unwrap());
    let basket = store.load(user).await.unwrap().expect("basket");
    assert_eq!(basket.pay_amount, Some(dec!(40)));
    assert!(basket.discount_applied);
    assert_eq!(basket.address_id, Some(12));

    assert!(store.take(user).await.unwrap().is_some());
    assert!(store.load(user).await.unwrap().is_none());
    assert!(!store.set_address(user, 12).await.unwrap());
    assert!(!store.exists(user).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn redis_refresh_rejects_outdated_lines() {
    let store = RedisBasketStore::connect(&redis_url()).await.expect("redis");
    let user = user_id();
    store.take(user).await.unwrap();

    store.insert_line(user, 1, 2).await.unwrap();
    store.insert_line(user, 2, 1).await.unwrap();
    assert_eq!(
        store
            .refresh_pay_amount(user, &BTreeMap::from([(1, 2)]), Some(dec!(20)))
            .await
            .unwrap(),
        PayAmountRefresh::Stale
    );
    assert_eq!(
        store
            .refresh_pay_amount(user, &BTreeMap::from([(1, 2), (2, 1)]), Some(dec!(25)))
            .await
            .unwrap(),
        PayAmountRefresh::Updated
    );
    let basket = store.load(user).await.unwrap().expect("basket");
    assert_eq!(basket.pay_amount, Some(dec!(25)));
    store.take(user).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn redis_take_and_restore_basket() {
    let store = RedisBasketStore::connect(&redis_url()).await.expect("redis");
    let user = user_id();
    store.take(user).await.unwrap();

    store.insert_line(user, 1, 2).await.unwrap();
    store.insert_line(user, 2, 1).await.unwrap();
    store.set_address(user, 9).await.unwrap();
    let taken = store.take(user).await.unwrap().expect("basket");
    assert!(store.take(user).await.unwrap().is_none());
    assert_eq!(taken.quantity_of(1), Some(2));
    assert_eq!(taken.address_id, Some(9));

    store.insert_line(user, 2, 4).await.unwrap();
    let rejected = store.restore(&taken).await.unwrap();
    assert_eq!(
        rejected,
        vec![BasketLine {
            product_id: 2,
            quantity: 1
        }]
    );

    let basket = store.load(user).await.unwrap().expect("basket");
    assert_eq!(basket.quantity_of(1), Some(2));
    assert_eq!(basket.quantity_of(2), Some(4));
    assert_eq!(basket.address_id, Some(9));
    store.take(user).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn redis_payment_ledger_keeps_latest_attempt() {
    let ledger = RedisPaymentLedger::connect(&redis_url()).await.expect("redis");
    let user = Uuid::new_v4();

    assert!(ledger.latest(user).await.unwrap().is_none());
    let first = PaymentRecord::new(user, dec!(12.5), PaymentStatus::Fail);
    let second = PaymentRecord::new(user, dec!(12.5), PaymentStatus::Success);
    ledger.record(&first).await.unwrap();
    ledger.record(&second).await.unwrap();

    let latest = ledger.latest(user).await.unwrap().expect("record");
    assert_eq!(latest, second);
}
