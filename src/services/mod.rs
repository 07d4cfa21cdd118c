pub mod basket;
pub mod checkout;
pub mod discount;
pub mod stock_ledger;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use basket::{BasketItemInput, BasketService, BasketView, BasketViewItem};
pub use checkout::CheckoutService;
pub use discount::DiscountEngine;
pub use stock_ledger::StockLedger;

use crate::cache::Stores;
use crate::events::EventSender;
use crate::repositories::{
    SeaOrmCatalogRepository, SeaOrmDiscountRepository, SeaOrmIdentityRepository,
    SeaOrmOrderRepository,
};

/// The four core services wired over one database pool and one pair of stores.
#[derive(Clone)]
pub struct AppServices {
    pub stock: StockLedger,
    pub baskets: BasketService,
    pub discounts: DiscountEngine,
    pub checkout: CheckoutService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, stores: Stores, event_sender: EventSender) -> Self {
        let catalog = Arc::new(SeaOrmCatalogRepository::new(db.clone()));
        let identity = Arc::new(SeaOrmIdentityRepository::new(db.clone()));
        let discount_codes = Arc::new(SeaOrmDiscountRepository::new(db.clone()));
        let orders = Arc::new(SeaOrmOrderRepository::new(db));

        let stock = StockLedger::new(catalog.clone());
        let baskets = BasketService::new(
            stores.baskets.clone(),
            catalog,
            stock.clone(),
            event_sender.clone(),
        );
        let discounts = DiscountEngine::new(
            discount_codes,
            stores.baskets.clone(),
            baskets.clone(),
            event_sender.clone(),
        );
        let checkout = CheckoutService::new(
            stores.baskets,
            stores.payments,
            identity,
            orders,
            baskets.clone(),
            event_sender,
        );

        Self {
            stock,
            baskets,
            discounts,
            checkout,
        }
    }
}
