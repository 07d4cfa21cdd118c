use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

use storefront::{
    config,
    db,
    models::{receipt::receipt_total, PaymentStatus},
    seed,
    services::BasketItemInput,
    AppState, ServiceError,
};

#[derive(Parser)]
#[command(name = "storefront", about = "Basket, discount and checkout operations", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Check that the database answers
    Health,
    /// Create a demo shopper, products and discount codes
    Seed,
    /// Add a product line to a basket
    Add {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        product: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
    },
    /// Change the quantity of a basket line
    Update {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        product: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
    },
    /// Remove a basket line
    Remove {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        product: i32,
    },
    /// Show a basket
    Show {
        #[arg(long)]
        user: i32,
    },
    /// Drop a basket and return its stock
    Clear {
        #[arg(long)]
        user: i32,
    },
    /// Apply a discount code
    Discount {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        code: String,
    },
    /// Attach a delivery address to a basket
    Address {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        address: i32,
    },
    /// Record a payment attempt
    Pay {
        #[arg(long)]
        user: i32,
        #[arg(long, value_enum)]
        status: StatusArg,
    },
    /// Show the latest payment attempt
    Payment {
        #[arg(long)]
        user: i32,
    },
    /// Turn a ready basket into an order
    Checkout {
        #[arg(long)]
        user: i32,
    },
    /// List a user's orders
    Orders {
        #[arg(long)]
        user: i32,
    },
    /// Show available stock for a product
    Stock {
        #[arg(long)]
        product: i32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Success,
    Fail,
}

impl From<StatusArg> for PaymentStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Success => PaymentStatus::Success,
            StatusArg::Fail => PaymentStatus::Fail,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let state = AppState::build(cfg).await?;
    let outcome = run(&state, cli.command, cli.json).await;
    state.shutdown().await;

    if let Err(err) = outcome {
        if let Some(service_err) = err.downcast_ref::<ServiceError>() {
            error!(error = %service_err, "Command failed");
            eprintln!(
                "error ({}): {}",
                service_err.status_code().as_u16(),
                service_err.response_message()
            );
            std::process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}

async fn run(state: &AppState, command: Commands, json: bool) -> Result<()> {
    let services = &state.services;
    match command {
        Commands::Migrate => {
            db::run_migrations(&state.db).await?;
            println!("Migrations applied");
        }
        Commands::Health => {
            db::check_connection(&state.db).await?;
            println!("Database ok ({} store)", state.config.store_backend());
        }
        Commands::Seed => {
            let demo = seed::seed_demo_data(&state.db).await?;
            info!(user_id = demo.user.id, "Seeded demo data");
            if json {
                print_json(&serde_json::json!({
                    "user": demo.user,
                    "address": demo.address,
                    "products": demo.products,
                    "codes": demo.codes,
                }))?;
            } else {
                println!("User {} ({})", demo.user.id, demo.user.username);
                println!("Address {}: {}", demo.address.id, demo.address.full_address);
                for p in &demo.products {
                    println!("Product {}: {} @ {} ({} in stock)", p.id, p.name, p.price, p.warehouse);
                }
                for c in &demo.codes {
                    println!("Code {}: {:?} {}", c.code, c.kind, c.value);
                }
            }
        }
        Commands::Add {
            user,
            product,
            quantity,
        } => {
            let input = BasketItemInput::parse(product.as_deref(), quantity.as_deref())?;
            services
                .baskets
                .add(user, input.product_id, input.quantity)
                .await?;
            println!("Added {} x product {}", input.quantity, input.product_id);
        }
        Commands::Update {
            user,
            product,
            quantity,
        } => {
            let input = BasketItemInput::parse(product.as_deref(), quantity.as_deref())?;
            services
                .baskets
                .update(user, input.product_id, input.quantity)
                .await?;
            println!("Product {} now at {}", input.product_id, input.quantity);
        }
        Commands::Remove { user, product } => {
            services.baskets.remove(user, product).await?;
            println!("Removed product {}", product);
        }
        Commands::Show { user } => {
            let view = services.baskets.display(user).await?;
            let checkout_state = services.checkout.state(user).await?;
            if json {
                print_json(&view)?;
            } else {
                println!("Basket for user {} ({})", user, checkout_state);
                for item in &view.items {
                    println!("  {} x {} (product {})", item.quantity, item.name, item.product_id);
                }
                println!("  total: {}", view.total_price);
                if let Some(price) = view.price_after_discount {
                    println!("  to pay: {}", price);
                }
                if let Some(address) = view.address_id {
                    println!("  address: {}", address);
                }
            }
        }
        Commands::Clear { user } => {
            services.baskets.clear(user).await?;
            println!("Basket cleared");
        }
        Commands::Discount { user, code } => {
            let price = services.discounts.apply(user, &code).await?;
            println!("Discount applied, to pay: {}", price);
        }
        Commands::Address { user, address } => {
            services.checkout.submit_address(user, address).await?;
            println!("Address {} attached", address);
        }
        Commands::Pay { user, status } => {
            let record = services.checkout.record_payment(user, status.into()).await?;
            render(&record, json, |r| {
                format!("Payment {} {} for {}", r.payment_id, r.status, r.total_price)
            })?;
        }
        Commands::Payment { user } => {
            let record = services.checkout.payment(user).await?;
            render(&record, json, |r| {
                format!("Payment {} {} for {}", r.payment_id, r.status, r.total_price)
            })?;
        }
        Commands::Checkout { user } => {
            let order = services.checkout.create_order(user).await?;
            render(&order, json, |o| {
                format!("Order {} created, total {}", o.id, o.total_price)
            })?;
        }
        Commands::Orders { user } => {
            let orders = services.checkout.orders_for_user(user).await?;
            if json {
                print_json(&orders)?;
            } else {
                for order in &orders {
                    println!(
                        "Order {} at {}: {} to {}",
                        order.id,
                        order.created_at,
                        order.total_price,
                        order.address.as_deref().unwrap_or("-")
                    );
                    let receipt = order.receipt()?;
                    for (product_id, line) in &receipt {
                        println!(
                            "  {} x {} (product {}) = {}",
                            line.quantity, line.name, product_id, line.total
                        );
                    }
                    println!("  before discount: {}", receipt_total(&receipt));
                }
            }
        }
        Commands::Stock { product } => {
            let available = services.stock.available(product).await?;
            println!("Product {}: {} available", product, available);
        }
    }
    Ok(())
}

fn render<T: Serialize>(value: &T, json: bool, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        print_json(value)
    } else {
        println!("{}", text(value));
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
