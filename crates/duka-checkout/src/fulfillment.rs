//! # Fulfillment Assignment
//!
//! Picks the physical source that will fulfil a catalog order and
//! records the payout math for it.
//!
//! ## Ranking
//! Enabled sources of the catalog product, ordered by priority
//! ascending, ties broken by effective unit price ascending (source
//! base price, else the linked product's current price; unpriceable
//! sources sort last). The math lives in `duka_core::fulfillment`; this
//! service only loads, ranks and persists.

use tracing::{info, warn};

use crate::error::CheckoutResult;
use duka_core::fulfillment::{rank_candidates, FulfillmentPricing};
use duka_core::OrderFulfillment;
use duka_db::{Database, NewFulfillment};

/// Assigns fulfillment sources to catalog orders.
#[derive(Debug, Clone)]
pub struct FulfillmentService {
    db: Database,
    pricing: FulfillmentPricing,
}

impl FulfillmentService {
    /// Creates a service with the default pricing constants.
    pub fn new(db: Database) -> Self {
        FulfillmentService {
            db,
            pricing: FulfillmentPricing::default(),
        }
    }

    /// Creates a service with explicit pricing (tests, market overrides).
    pub fn with_pricing(db: Database, pricing: FulfillmentPricing) -> Self {
        FulfillmentService { db, pricing }
    }

    /// Assigns the best available source to an order.
    ///
    /// ## Returns
    /// * `Ok(Some(_))` - a source was assigned and persisted
    /// * `Ok(None)` - the order is not a catalog order, or no enabled
    ///   source exists (logged; the order stays unassigned)
    ///
    /// ## Errors
    /// Missing order or catalog product, or a persistence failure.
    pub async fn assign(&self, order_id: &str) -> CheckoutResult<Option<OrderFulfillment>> {
        let order = self.db.orders().require(order_id).await?;

        let catalog_product_id = match &order.catalog_product_id {
            Some(id) => id.clone(),
            None => return Ok(None),
        };

        let catalog_product = self.db.catalog().require(&catalog_product_id).await?;

        let mut candidates = self.db.catalog().candidate_sources(&catalog_product_id).await?;
        if candidates.is_empty() {
            warn!(
                order_id = %order_id,
                catalog_product_id = %catalog_product_id,
                "No enabled sources; order left unassigned"
            );
            return Ok(None);
        }

        rank_candidates(&mut candidates);
        let best = &candidates[0];

        let breakdown = self
            .pricing
            .breakdown(catalog_product.unit_price_cents(), best.hotel_base_cents());

        let fulfillment = self
            .db
            .fulfillments()
            .create(NewFulfillment {
                order_id: order_id.to_string(),
                assigned_hotel_id: best.source.hotel_id.clone(),
                assigned_product_id: best.source.product_id.clone(),
                price_breakdown: breakdown,
            })
            .await?;

        // The stamp is a convenience pointer; the fulfillment row is
        // already the source of truth, so a failed stamp is only logged.
        if let Err(e) = self
            .db
            .orders()
            .set_fulfillment(order_id, &fulfillment.id)
            .await
        {
            warn!(order_id = %order_id, error = %e, "Failed to stamp fulfillment onto order");
        }

        info!(
            order_id = %order_id,
            fulfillment_id = %fulfillment.id,
            hotel_id = ?fulfillment.assigned_hotel_id,
            profit_cents = fulfillment.price_breakdown.profit,
            "Fulfillment assigned"
        );

        Ok(Some(fulfillment))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::{OrderSource, RandomCodeGenerator};
    use duka_db::repository::order::{NewCatalogOrder, NewOrder};
    use duka_db::{DbConfig, NewCatalogProduct, NewCatalogSource, NewProduct};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn catalog_product(db: &Database) -> String {
        db.catalog()
            .create(NewCatalogProduct {
                name: "Gift Box".to_string(),
                slug: "gift-box".to_string(),
                description: None,
                initial_price_cents: Some(40_000),
                final_price_cents: Some(35_000),
                stock: 10,
            })
            .await
            .unwrap()
            .id
    }

    async fn catalog_order(db: &Database, catalog_product_id: &str) -> String {
        let codes = RandomCodeGenerator;
        db.orders()
            .create_catalog_order(
                NewCatalogOrder {
                    catalog_product_id: catalog_product_id.to_string(),
                    quantity: 1,
                    unit_price_cents: 35_000,
                    user_id: None,
                    guest_id: Some("guest-1".to_string()),
                    contact: None,
                },
                &codes,
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_assign_picks_lowest_priority_then_cheapest() {
        let db = test_db().await;
        let cp = catalog_product(&db).await;

        // Same priority, different prices: cheaper wins. A worse
        // priority with a better price must lose.
        for (priority, base) in [(10, Some(30_000)), (10, Some(26_000)), (5, Some(32_000))] {
            db.catalog()
                .add_source(NewCatalogSource {
                    catalog_product_id: cp.clone(),
                    hotel_id: Some(format!("hotel-{priority}-{base:?}")),
                    product_id: None,
                    base_price_cents: base,
                    priority,
                })
                .await
                .unwrap();
        }

        let order_id = catalog_order(&db, &cp).await;
        let service = FulfillmentService::new(db.clone());

        let assigned = service.assign(&order_id).await.unwrap().unwrap();
        // Priority 5 wins despite being the most expensive.
        assert_eq!(assigned.price_breakdown.hotel_base, 32_000);
        // catalog 35000, cut 5% = 1750, transport 0, profit 1250
        assert_eq!(assigned.price_breakdown.platform_cut, 1_750);
        assert_eq!(assigned.price_breakdown.profit, 1_250);

        let order = db.orders().require(&order_id).await.unwrap();
        assert_eq!(order.fulfillment_id.as_deref(), Some(assigned.id.as_str()));
    }

    #[tokio::test]
    async fn test_assign_uses_linked_product_price_as_fallback() {
        let db = test_db().await;
        let cp = catalog_product(&db).await;

        let product = db
            .products()
            .create(NewProduct {
                hotel_id: Some("hotel-1".to_string()),
                name: "Tin".to_string(),
                price_cents: 28_000,
                stock: 5,
            })
            .await
            .unwrap();

        db.catalog()
            .add_source(NewCatalogSource {
                catalog_product_id: cp.clone(),
                hotel_id: Some("hotel-1".to_string()),
                product_id: Some(product.id),
                base_price_cents: None,
                priority: 10,
            })
            .await
            .unwrap();

        let order_id = catalog_order(&db, &cp).await;
        let assigned = FulfillmentService::new(db.clone())
            .assign(&order_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(assigned.price_breakdown.hotel_base, 28_000);
    }

    #[tokio::test]
    async fn test_no_sources_returns_none() {
        let db = test_db().await;
        let cp = catalog_product(&db).await;
        let order_id = catalog_order(&db, &cp).await;

        let assigned = FulfillmentService::new(db.clone()).assign(&order_id).await.unwrap();
        assert!(assigned.is_none());
        assert!(db.fulfillments().get_by_order(&order_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_catalog_order_returns_none() {
        let db = test_db().await;
        let product = db
            .products()
            .create(NewProduct {
                hotel_id: Some("hotel-1".to_string()),
                name: "Chai".to_string(),
                price_cents: 5_000,
                stock: 10,
            })
            .await
            .unwrap();

        let codes = RandomCodeGenerator;
        let order = db
            .orders()
            .create_order(
                NewOrder {
                    source: OrderSource::Ecom,
                    user_id: Some("user-1".to_string()),
                    guest_id: None,
                    cart_id: None,
                    contact: None,
                    lines: vec![duka_core::OrderLine::new(&product.id, 1)],
                },
                &codes,
            )
            .await
            .unwrap();

        let assigned = FulfillmentService::new(db.clone())
            .assign(&order.order.id)
            .await
            .unwrap();
        assert!(assigned.is_none());
    }
}
