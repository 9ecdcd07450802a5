use bazaar::{
    auth::{Role, TokenService},
    config::Settings,
    domain::{CreateOrderRequest, NewOrderItem},
    repository::{OrderRepository, SqliteOrderRepository},
};
use chrono::Duration;
use clap::Parser;
use fake::{faker::lorem::en::Words, Fake};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;

/// Seeds unpaid orders and prints bearer tokens for every role.
#[derive(Parser, Debug)]
#[command(name = "seed")]
struct Args {
    /// Defaults to the configured database url
    #[arg(long)]
    database_url: Option<String>,

    #[arg(long, default_value_t = 3)]
    orders: usize,

    #[arg(long, default_value_t = 2)]
    sellers: usize,

    /// Lifetime of the printed tokens
    #[arg(long, default_value_t = 24)]
    token_hours: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let settings = Settings::new().unwrap_or_default();

    println!("🌱 Starting database seeding...");

    let database_url = args.database_url.unwrap_or_else(|| settings.database.url.clone());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true))
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let order_repo = SqliteOrderRepository::new(db_pool.clone());

    let customer = Uuid::new_v4();
    let delivery_partner = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let sellers: Vec<Uuid> = (0..args.sellers.max(1)).map(|_| Uuid::new_v4()).collect();

    println!("🛒 Creating orders...");
    for n in 0..args.orders {
        let items = sellers
            .iter()
            .map(|seller| {
                let words: Vec<String> = Words(2..4).fake();
                NewOrderItem {
                    product_id: Uuid::new_v4(),
                    seller_id: *seller,
                    product_name: words.join(" "),
                    unit_price: (100..5_000).fake::<i64>() * 100,
                    quantity: (1..4).fake::<i64>(),
                }
            })
            .collect();

        let order = order_repo
            .create(CreateOrderRequest {
                customer_id: customer,
                // Every other order ships with a delivery partner
                delivery_partner_id: (n % 2 == 0).then_some(delivery_partner),
                currency: settings.gateway.currency.clone(),
                items,
            })
            .await?;

        println!("  ✅ Order {} for {} {}", order.id, order.total_amount, order.currency);
    }

    let tokens = TokenService::new(&settings.auth);
    let ttl = Duration::hours(args.token_hours);

    println!("\n🔑 Bearer tokens:");
    println!("  customer         {}\n    {}", customer, tokens.issue(customer, Role::Customer, ttl)?);
    for seller in &sellers {
        println!("  seller           {}\n    {}", seller, tokens.issue(*seller, Role::Seller, ttl)?);
    }
    println!(
        "  delivery partner {}\n    {}",
        delivery_partner,
        tokens.issue(delivery_partner, Role::DeliveryPartner, ttl)?
    );
    println!("  admin            {}\n    {}", admin, tokens.issue(admin, Role::Admin, ttl)?);

    println!("\n✨ Seeding complete!");
    Ok(())
}
