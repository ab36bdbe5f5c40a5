//! # Database Seed Tool
//!
//! Populates a database with sample inventory and catalog data for
//! local development.
//!
//! ## Usage
//! ```bash
//! cargo run -p duka-db --bin seed -- [database_path]
//! ```
//! Defaults to `duka.db` in the current directory.

use duka_db::{Database, DbConfig, NewCatalogProduct, NewCatalogSource, NewProduct};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "duka.db".to_string());
    info!(path = %path, "Seeding database");

    let db = Database::new(DbConfig::new(&path)).await?;

    let products = db.products();
    let chai = products
        .create(NewProduct {
            hotel_id: Some("hotel-nairobi".to_string()),
            name: "Masala Chai".to_string(),
            price_cents: 15_000,
            stock: 40,
        })
        .await?;
    products
        .create(NewProduct {
            hotel_id: Some("hotel-nairobi".to_string()),
            name: "Mandazi (4 pc)".to_string(),
            price_cents: 8_000,
            stock: 60,
        })
        .await?;
    let towel = products
        .create(NewProduct {
            hotel_id: Some("hotel-mombasa".to_string()),
            name: "Bath Towel Set".to_string(),
            price_cents: 120_000,
            stock: 12,
        })
        .await?;

    let catalog = db.catalog();
    let gift_box = catalog
        .create(NewCatalogProduct {
            name: "Coastal Gift Box".to_string(),
            slug: "coastal-gift-box".to_string(),
            description: Some("Towel set and tea sampler.".to_string()),
            initial_price_cents: Some(180_000),
            final_price_cents: Some(165_000),
            stock: 25,
        })
        .await?;

    catalog
        .add_source(NewCatalogSource {
            catalog_product_id: gift_box.id.clone(),
            hotel_id: Some("hotel-mombasa".to_string()),
            product_id: Some(towel.id.clone()),
            base_price_cents: None,
            priority: 5,
        })
        .await?;
    catalog
        .add_source(NewCatalogSource {
            catalog_product_id: gift_box.id.clone(),
            hotel_id: Some("hotel-nairobi".to_string()),
            product_id: None,
            base_price_cents: Some(140_000),
            priority: 10,
        })
        .await?;

    info!(
        products = 3,
        catalog_products = 1,
        sources = 2,
        sample_product = %chai.name,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
