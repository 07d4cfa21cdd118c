mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront::{errors::ServiceError, models::CheckoutState};

#[tokio::test]
async fn add_reserves_stock_and_sets_pay_amount() {
    let app = TestApp::new().await;
    let user = app.user("ann").await;
    let product = app.product("widget", dec!(100), 5).await;
    let baskets = &app.services().baskets;

    baskets.add(user.id, product.id, 2).await.unwrap();

    assert_eq!(app.available(product.id).await, 3);
    let view = baskets.display(user.id).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 2);
    assert_eq!(view.items[0].name, "WIDGET");
    assert_eq!(view.total_price, dec!(200));
    assert_eq!(view.price_after_discount, Some(dec!(200)));
    assert_eq!(view.address_id, None);
    assert!(baskets.exists(user.id).await.unwrap());
}

#[tokio::test]
async fn second_add_of_same_product_is_a_duplicate() {
    let app = TestApp::new().await;
    let user = app.user("ben").await;
    let product = app.product("gadget", dec!(10), 10).await;
    let baskets = &app.services().baskets;

    baskets.add(user.id, product.id, 1).await.unwrap();
    let err = baskets.add(user.id, product.id, 3).await.unwrap_err();

    assert_matches!(err, ServiceError::DuplicateLine(id) if id == product.id);
    // the rejected add reserved nothing
    assert_eq!(app.available(product.id).await, 9);
    let view = baskets.display(user.id).await.unwrap();
    assert_eq!(view.items[0].quantity, 1);
}

#[tokio::test]
async fn out_of_stock_add_leaves_no_basket() {
    let app = TestApp::new().await;
    let user = app.user("cat").await;
    let product = app.product("rare", dec!(50), 1).await;
    let baskets = &app.services().baskets;

    let err = baskets.add(user.id, product.id, 2).await.unwrap_err();

    assert_matches!(err, ServiceError::OutOfStock(_));
    assert!(!baskets.exists(user.id).await.unwrap());
    assert_eq!(app.available(product.id).await, 1);
}

#[tokio::test]
async fn add_rejects_unknown_product_and_zero_quantity() {
    let app = TestApp::new().await;
    let user = app.user("dan").await;
    let product = app.product("thing", dec!(5), 5).await;
    let baskets = &app.services().baskets;

    assert_matches!(
        baskets.add(user.id, 9999, 1).await,
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        baskets.add(user.id, product.id, 0).await,
        Err(ServiceError::InvalidInput(_))
    );
    assert!(!baskets.exists(user.id).await.unwrap());
}

#[tokio::test]
async fn remove_releases_last_quantity() {
    let app = TestApp::new().await;
    let user = app.user("eve").await;
    let a = app.product("a", dec!(10), 5).await;
    let b = app.product("b", dec!(20), 5).await;
    let baskets = &app.services().baskets;

    baskets.add(user.id, a.id, 2).await.unwrap();
    baskets.add(user.id, b.id, 1).await.unwrap();
    baskets.remove(user.id, a.id).await.unwrap();

    assert_eq!(app.available(a.id).await, 5);
    let view = baskets.display(user.id).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.total_price, dec!(20));
    assert_eq!(view.price_after_discount, Some(dec!(20)));

    assert_matches!(
        baskets.remove(user.id, a.id).await,
        Err(ServiceError::LineNotFound(id)) if id == a.id
    );
}

#[tokio::test]
async fn removing_the_last_line_drops_the_basket() {
    let app = TestApp::new().await;
    let user = app.user("fay").await;
    let product = app.product("solo", dec!(10), 5).await;
    let baskets = &app.services().baskets;

    baskets.add(user.id, product.id, 1).await.unwrap();
    baskets.remove(user.id, product.id).await.unwrap();

    assert!(!baskets.exists(user.id).await.unwrap());
    assert_matches!(
        baskets.display(user.id).await,
        Err(ServiceError::BasketNotFound(_))
    );
}

#[tokio::test]
async fn update_reserves_growth_and_releases_shrink() {
    let app = TestApp::new().await;
    let user = app.user("gus").await;
    let product = app.product("bolt", dec!(3), 10).await;
    let baskets = &app.services().baskets;

    baskets.add(user.id, product.id, 2).await.unwrap();
    baskets.update(user.id, product.id, 5).await.unwrap();
    assert_eq!(app.available(product.id).await, 5);
    assert_eq!(
        baskets.display(user.id).await.unwrap().price_after_discount,
        Some(dec!(15))
    );

    baskets.update(user.id, product.id, 1).await.unwrap();
    assert_eq!(app.available(product.id).await, 9);
    let view = baskets.display(user.id).await.unwrap();
    assert_eq!(view.items[0].quantity, 1);
    assert_eq!(view.total_price, dec!(3));
}

// The new quantity is compared with what is still available, not the growth.
#[tokio::test]
async fn update_checks_new_quantity_against_remaining_stock() {
    let app = TestApp::new().await;
    let user = app.user("hal").await;
    let product = app.product("nut", dec!(1), 5).await;
    let baskets = &app.services().baskets;

    baskets.add(user.id, product.id, 3).await.unwrap();
    assert_eq!(app.available(product.id).await, 2);

    // growing 3 -> 4 needs one more unit and two are left, but 4 > 2
    let err = baskets.update(user.id, product.id, 4).await.unwrap_err();
    assert_matches!(err, ServiceError::OutOfStock(_));
    assert_eq!(app.available(product.id).await, 2);
    assert_eq!(baskets.display(user.id).await.unwrap().items[0].quantity, 3);

    // 3 -> 2 is within the remaining two
    baskets.update(user.id, product.id, 2).await.unwrap();
    assert_eq!(app.available(product.id).await, 3);
}

#[tokio::test]
async fn update_requires_an_existing_line() {
    let app = TestApp::new().await;
    let user = app.user("ivy").await;
    let product = app.product("cog", dec!(2), 5).await;
    let baskets = &app.services().baskets;

    assert_matches!(
        baskets.update(user.id, product.id, 1).await,
        Err(ServiceError::LineNotFound(_))
    );
    baskets.add(user.id, product.id, 1).await.unwrap();
    assert_matches!(
        baskets.update(user.id, product.id, 0).await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn clear_returns_all_reserved_stock() {
    let app = TestApp::new().await;
    let user = app.user("jay").await;
    let a = app.product("pen", dec!(2), 4).await;
    let b = app.product("ink", dec!(7), 6).await;
    let baskets = &app.services().baskets;

    baskets.add(user.id, a.id, 4).await.unwrap();
    baskets.add(user.id, b.id, 5).await.unwrap();
    baskets.clear(user.id).await.unwrap();

    assert_eq!(app.available(a.id).await, 4);
    assert_eq!(app.available(b.id).await, 6);
    assert!(!baskets.exists(user.id).await.unwrap());
    assert_matches!(
        baskets.clear(user.id).await,
        Err(ServiceError::BasketNotFound(_))
    );
}

#[tokio::test]
async fn baskets_are_per_user() {
    let app = TestApp::new().await;
    let kim = app.user("kim").await;
    let lee = app.user("lee").await;
    let product = app.product("cup", dec!(4), 10).await;
    let baskets = &app.services().baskets;

    baskets.add(kim.id, product.id, 2).await.unwrap();
    baskets.add(lee.id, product.id, 3).await.unwrap();

    assert_eq!(app.available(product.id).await, 5);
    assert_eq!(baskets.display(kim.id).await.unwrap().total_price, dec!(8));
    assert_eq!(baskets.display(lee.id).await.unwrap().total_price, dec!(12));
    assert_eq!(
        app.services().checkout.state(kim.id).await.unwrap(),
        CheckoutState::Open
    );
}
