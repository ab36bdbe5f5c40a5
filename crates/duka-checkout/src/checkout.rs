//! # Checkout Service
//!
//! Orchestrates the three order-creation flows: owner cart checkout,
//! guest cart checkout and catalog checkout.
//!
//! ## Ordering of effects
//! The order transaction (stock, order, items) commits first. Cart
//! confirmation and fulfillment assignment run after it, best-effort:
//! a failure there leaves a valid committed order and is logged rather
//! than propagated. An order failure leaves the cart active and
//! retryable.

use std::sync::Arc;

use tracing::{info, warn};

use crate::actor::Actor;
use crate::error::CheckoutResult;
use crate::fulfillment::FulfillmentService;
use duka_core::validation::validate_quantity;
use duka_core::{
    CartStatus, CodeGenerator, Contact, CoreError, Order, OrderLine, OrderSource, OrderWithItems,
    RandomCodeGenerator,
};
use duka_db::repository::order::{NewCatalogOrder, NewOrder};
use duka_db::Database;

/// Input for catalog checkout.
#[derive(Debug, Clone)]
pub struct CatalogOrderRequest {
    pub catalog_product_id: String,
    /// Defaults to 1 when absent.
    pub quantity: Option<i64>,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub contact: Option<Contact>,
}

/// The checkout orchestrator.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    codes: Arc<dyn CodeGenerator>,
    fulfillment: Option<FulfillmentService>,
}

impl CheckoutService {
    /// Creates a service with the default random code generator and no
    /// fulfillment assignment.
    pub fn new(db: Database) -> Self {
        CheckoutService {
            db,
            codes: Arc::new(RandomCodeGenerator),
            fulfillment: None,
        }
    }

    /// Replaces the order code generator (tests use a deterministic one).
    pub fn with_code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    /// Wires the fulfillment assigner for catalog orders.
    pub fn with_fulfillment(mut self, fulfillment: FulfillmentService) -> Self {
        self.fulfillment = Some(fulfillment);
        self
    }

    /// Checks out the owner's active cart into an order.
    ///
    /// The actor must be the owner or an admin. An empty cart is
    /// rejected before anything is written.
    pub async fn checkout(
        &self,
        actor: &Actor,
        owner_id: &str,
        source: OrderSource,
    ) -> CheckoutResult<OrderWithItems> {
        if !actor.may_act_for(owner_id) {
            return Err(CoreError::Forbidden(format!(
                "actor {} cannot check out cart of {}",
                actor.id, owner_id
            ))
            .into());
        }

        let cart = self.db.carts().get_or_create_active(owner_id).await?;
        let created = self
            .checkout_cart_inner(
                &cart.id,
                NewOrder {
                    source,
                    user_id: Some(owner_id.to_string()),
                    guest_id: None,
                    cart_id: Some(cart.id.clone()),
                    contact: None,
                    lines: vec![],
                },
            )
            .await?;

        info!(
            order_id = %created.order.id,
            owner_id = %owner_id,
            total_cents = created.order.total_cents,
            "Cart checked out"
        );

        Ok(created)
    }

    /// Checks out a guest's cart into an order.
    ///
    /// The cart must belong to the guest. Contact details travel on the
    /// order itself since guests have no account to look up later.
    pub async fn guest_checkout(
        &self,
        cart_id: &str,
        guest_id: &str,
        contact: Option<Contact>,
    ) -> CheckoutResult<OrderWithItems> {
        let cart = self.db.carts().require(cart_id).await?;
        if cart.owner_id != guest_id {
            return Err(CoreError::Forbidden(format!(
                "cart {} does not belong to guest {}",
                cart_id, guest_id
            ))
            .into());
        }
        if cart.status != CartStatus::Active {
            return Err(CoreError::CartNotFound(cart_id.to_string()).into());
        }

        let created = self
            .checkout_cart_inner(
                cart_id,
                NewOrder {
                    source: OrderSource::Ecom,
                    user_id: None,
                    guest_id: Some(guest_id.to_string()),
                    cart_id: Some(cart_id.to_string()),
                    contact,
                    lines: vec![],
                },
            )
            .await?;

        info!(
            order_id = %created.order.id,
            guest_id = %guest_id,
            "Guest cart checked out"
        );

        Ok(created)
    }

    /// Shared tail of the two cart flows: load items, create the order,
    /// confirm the cart best-effort.
    async fn checkout_cart_inner(
        &self,
        cart_id: &str,
        mut new: NewOrder,
    ) -> CheckoutResult<OrderWithItems> {
        let items = self.db.carts().items(cart_id).await?;
        if items.is_empty() {
            return Err(CoreError::CartEmpty(cart_id.to_string()).into());
        }

        new.lines = items
            .iter()
            .map(|item| OrderLine::new(item.product_id.clone(), item.quantity))
            .collect();

        let created = self.db.orders().create_order(new, self.codes.as_ref()).await?;

        // Post-commit: the order exists either way, so a cart that
        // refuses to confirm (raced away, db hiccup) is only logged.
        match self
            .db
            .carts()
            .transition(cart_id, CartStatus::Active, CartStatus::Confirmed)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(cart_id = %cart_id, "Cart was no longer active after checkout")
            }
            Err(e) => warn!(cart_id = %cart_id, error = %e, "Failed to confirm cart"),
        }

        Ok(created)
    }

    /// Creates an order for a catalog listing.
    ///
    /// No stock is decremented (catalog stock is advisory). When a
    /// fulfillment assigner is wired, assignment runs after the order
    /// commits and its failure is logged, never propagated.
    pub async fn create_catalog_order(&self, req: CatalogOrderRequest) -> CheckoutResult<Order> {
        let quantity = req.quantity.unwrap_or(1);
        validate_quantity(quantity).map_err(CoreError::from)?;

        let catalog_product = self
            .db
            .catalog()
            .get_by_id(&req.catalog_product_id)
            .await?
            .ok_or_else(|| CoreError::CatalogProductNotFound(req.catalog_product_id.clone()))?;

        let mut order = self
            .db
            .orders()
            .create_catalog_order(
                NewCatalogOrder {
                    catalog_product_id: catalog_product.id.clone(),
                    quantity,
                    unit_price_cents: catalog_product.unit_price_cents(),
                    user_id: req.user_id,
                    guest_id: req.guest_id,
                    contact: req.contact,
                },
                self.codes.as_ref(),
            )
            .await?;

        if let Some(fulfillment) = &self.fulfillment {
            match fulfillment.assign(&order.id).await {
                Ok(Some(assigned)) => order.fulfillment_id = Some(assigned.id),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        order_id = %order.id,
                        error = %e,
                        "Fulfillment assignment failed; order kept"
                    );
                }
            }
        }

        info!(
            order_id = %order.id,
            catalog_product_id = %catalog_product.id,
            total_cents = order.total_cents,
            "Catalog order created"
        );

        Ok(order)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckoutError;
    use duka_core::{CoreError, OrderStatus};
    use duka_db::{DbConfig, DbError, NewCatalogProduct, NewCatalogSource, NewProduct};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seeded_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> String {
        db.products()
            .create(NewProduct {
                hotel_id: Some("hotel-1".to_string()),
                name: name.to_string(),
                price_cents,
                stock,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_cart_checkout_end_to_end() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 20_000, 10).await;
        let mandazi = seeded_product(&db, "Mandazi", 10_000, 10).await;

        let cart = db.carts().get_or_create_active("user-1").await.unwrap();
        db.carts().add_item(&cart.id, &chai, 1).await.unwrap();
        db.carts().add_item(&cart.id, &mandazi, 4).await.unwrap();

        let service = CheckoutService::new(db.clone());
        let actor = Actor::user("user-1");
        let created = service
            .checkout(&actor, "user-1", OrderSource::Ecom)
            .await
            .unwrap();

        // 1*20000 + 4*10000
        assert_eq!(created.order.total_cents, 60_000);
        assert_eq!(created.order.status, OrderStatus::NotPaid);
        assert_eq!(created.order.cart_id.as_deref(), Some(cart.id.as_str()));
        assert_eq!(created.items.len(), 2);

        // Stock reserved, cart confirmed.
        assert_eq!(db.products().require(&chai).await.unwrap().stock, 9);
        assert_eq!(db.products().require(&mandazi).await.unwrap().stock, 6);
        let cart = db.carts().require(&cart.id).await.unwrap();
        assert_eq!(cart.status, CartStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_checkout_of_empty_cart_rejected() {
        let db = test_db().await;
        let service = CheckoutService::new(db.clone());
        let actor = Actor::user("user-1");

        let err = service
            .checkout(&actor, "user-1", OrderSource::Ecom)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::CartEmpty(_))));

        // The empty cart stays active and usable.
        let cart = db.carts().find_active("user-1").await.unwrap().unwrap();
        assert_eq!(cart.status, CartStatus::Active);
    }

    #[tokio::test]
    async fn test_checkout_for_other_user_forbidden() {
        let db = test_db().await;
        let service = CheckoutService::new(db.clone());

        let err = service
            .checkout(&Actor::user("user-2"), "user-1", OrderSource::Ecom)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Forbidden(_))));

        // Admins may.
        let chai = seeded_product(&db, "Chai", 20_000, 10).await;
        let cart = db.carts().get_or_create_active("user-1").await.unwrap();
        db.carts().add_item(&cart.id, &chai, 1).await.unwrap();

        service
            .checkout(&Actor::admin("admin-1"), "user-1", OrderSource::Pos)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_checkout_leaves_cart_retryable() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 20_000, 2).await;

        let cart = db.carts().get_or_create_active("user-1").await.unwrap();
        let item = db.carts().add_item(&cart.id, &chai, 5).await.unwrap();

        let service = CheckoutService::new(db.clone());
        let actor = Actor::user("user-1");

        let err = service
            .checkout(&actor, "user-1", OrderSource::Ecom)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { .. })
        ));

        // Nothing written; fix the quantity and retry the same cart.
        assert_eq!(db.products().require(&chai).await.unwrap().stock, 2);
        db.carts().set_item_quantity(&item.id, 2).await.unwrap();
        let created = service
            .checkout(&actor, "user-1", OrderSource::Ecom)
            .await
            .unwrap();
        assert_eq!(created.order.total_cents, 40_000);
    }

    #[tokio::test]
    async fn test_guest_checkout_attaches_contact() {
        let db = test_db().await;
        let chai = seeded_product(&db, "Chai", 20_000, 10).await;

        let cart = db.carts().get_or_create_active("guest-9").await.unwrap();
        db.carts().add_item(&cart.id, &chai, 1).await.unwrap();

        let service = CheckoutService::new(db.clone());
        let created = service
            .guest_checkout(
                &cart.id,
                "guest-9",
                Some(Contact {
                    guest_id: Some("guest-9".to_string()),
                    name: Some("Asha".to_string()),
                    phone: Some("0712345678".to_string()),
                    email: None,
                }),
            )
            .await
            .unwrap();

        assert!(created.order.user_id.is_none());
        assert_eq!(created.order.guest_id.as_deref(), Some("guest-9"));

        let stored = db.orders().require(&created.order.id).await.unwrap();
        assert_eq!(stored.contact.unwrap().name.as_deref(), Some("Asha"));
    }

    #[tokio::test]
    async fn test_guest_checkout_of_foreign_cart_forbidden() {
        let db = test_db().await;
        let cart = db.carts().get_or_create_active("guest-9").await.unwrap();

        let service = CheckoutService::new(db.clone());
        let err = service
            .guest_checkout(&cart.id, "guest-other", None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_catalog_checkout_with_assignment() {
        let db = test_db().await;

        let cp = db
            .catalog()
            .create(NewCatalogProduct {
                name: "Gift Box".to_string(),
                slug: "gift-box".to_string(),
                description: None,
                initial_price_cents: Some(40_000),
                final_price_cents: Some(35_000),
                stock: 10,
            })
            .await
            .unwrap();
        db.catalog()
            .add_source(NewCatalogSource {
                catalog_product_id: cp.id.clone(),
                hotel_id: Some("hotel-1".to_string()),
                product_id: None,
                base_price_cents: Some(30_000),
                priority: 5,
            })
            .await
            .unwrap();

        let service = CheckoutService::new(db.clone())
            .with_fulfillment(FulfillmentService::new(db.clone()));

        let order = service
            .create_catalog_order(CatalogOrderRequest {
                catalog_product_id: cp.id.clone(),
                quantity: Some(2),
                user_id: None,
                guest_id: Some("guest-1".to_string()),
                contact: None,
            })
            .await
            .unwrap();

        // Final price wins over initial: 2 * 35000.
        assert_eq!(order.total_cents, 70_000);
        assert_eq!(order.source, OrderSource::Catalog);
        assert!(order.fulfillment_id.is_some());

        let fulfillment = db
            .fulfillments()
            .get_by_order(&order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fulfillment.assigned_hotel_id.as_deref(), Some("hotel-1"));
    }

    #[tokio::test]
    async fn test_catalog_checkout_without_sources_still_succeeds() {
        let db = test_db().await;

        let cp = db
            .catalog()
            .create(NewCatalogProduct {
                name: "Gift Box".to_string(),
                slug: "gift-box".to_string(),
                description: None,
                initial_price_cents: Some(40_000),
                final_price_cents: None,
                stock: 10,
            })
            .await
            .unwrap();

        let service = CheckoutService::new(db.clone())
            .with_fulfillment(FulfillmentService::new(db.clone()));

        let order = service
            .create_catalog_order(CatalogOrderRequest {
                catalog_product_id: cp.id,
                quantity: None,
                user_id: Some("user-1".to_string()),
                guest_id: None,
                contact: None,
            })
            .await
            .unwrap();

        // Falls back to the initial price, defaults to quantity 1.
        assert_eq!(order.total_cents, 40_000);
        assert!(order.fulfillment_id.is_none());
    }

    #[tokio::test]
    async fn test_catalog_checkout_unknown_product() {
        let db = test_db().await;
        let service = CheckoutService::new(db.clone());

        let err = service
            .create_catalog_order(CatalogOrderRequest {
                catalog_product_id: "no-such".to_string(),
                quantity: None,
                user_id: None,
                guest_id: None,
                contact: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::CatalogProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_db_error_passthrough_has_no_domain() {
        // Shape check on the error helper.
        let err = CheckoutError::from(DbError::Internal("boom".to_string()));
        assert!(err.as_domain().is_none());
    }
}
