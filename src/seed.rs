use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use tracing::info;
use uuid::Uuid;

use crate::entities::{
    address, discount_code, product, user, AddressModel, DiscountCodeModel, DiscountKind,
    ProductModel, UserModel,
};

pub async fn insert_user(db: &DatabaseConnection, username: &str) -> Result<UserModel, DbErr> {
    user::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_address(
    db: &DatabaseConnection,
    user_id: i32,
    full_address: &str,
) -> Result<AddressModel, DbErr> {
    address::ActiveModel {
        user_id: Set(user_id),
        full_address: Set(full_address.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_product(
    db: &DatabaseConnection,
    name: &str,
    slug: &str,
    price: Decimal,
    warehouse: i32,
) -> Result<ProductModel, DbErr> {
    let now = Utc::now();
    product::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(slug.to_string()),
        price: Set(price),
        warehouse: Set(warehouse),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_discount_code(
    db: &DatabaseConnection,
    code: &str,
    kind: DiscountKind,
    value: Decimal,
    user_id: Option<i32>,
) -> Result<DiscountCodeModel, DbErr> {
    discount_code::ActiveModel {
        code: Set(code.to_string()),
        kind: Set(kind),
        value: Set(value),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Rows created by [`seed_demo_data`].
#[derive(Debug, Clone)]
pub struct DemoData {
    pub user: UserModel,
    pub address: AddressModel,
    pub products: Vec<ProductModel>,
    pub codes: Vec<DiscountCodeModel>,
}

/// Creates one shopper with an address, a small catalog and two discount codes.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<DemoData, DbErr> {
    info!("Creating demo shopper...");
    let user = insert_user(db, &format!("shopper-{}", &Uuid::new_v4().simple().to_string()[..8])).await?;
    let address = insert_address(db, user.id, "12 Market Street, Springfield").await?;

    info!("Creating products...");
    let catalog = [
        ("Wireless Bluetooth Headphones", "wbh-001", dec!(79.99), 25),
        ("USB-C Fast Charger 65W", "chg-065", dec!(34.99), 40),
        ("Mechanical Keyboard RGB", "kbd-rgb", dec!(129.99), 10),
        ("Canvas Backpack 25L", "bag-cnv-25", dec!(79.99), 5),
    ];
    let mut products = Vec::with_capacity(catalog.len());
    for (name, slug, price, warehouse) in catalog {
        let slug = format!("{}-{}", slug, user.id);
        products.push(insert_product(db, name, &slug, price, warehouse).await?);
    }
    info!("  Created {} products", products.len());

    info!("Creating discount codes...");
    let codes = vec![
        insert_discount_code(db, &format!("CASH{:04}", user.id % 10_000), DiscountKind::Cash, dec!(10), Some(user.id)).await?,
        insert_discount_code(db, &format!("PCT{:05}", user.id % 100_000), DiscountKind::Percentage, dec!(15), Some(user.id)).await?,
    ];

    Ok(DemoData {
        user,
        address,
        products,
        codes,
    })
}
