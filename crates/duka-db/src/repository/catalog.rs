//! # Catalog Repository
//!
//! Database operations for marketplace catalog products and their
//! fulfillment sources.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::fulfillment::SourceCandidate;
use duka_core::{CatalogProduct, CatalogProductSource};

/// Input for creating a catalog product.
#[derive(Debug, Clone)]
pub struct NewCatalogProduct {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub initial_price_cents: Option<i64>,
    pub final_price_cents: Option<i64>,
    pub stock: i64,
}

/// Input for creating a catalog product source.
#[derive(Debug, Clone)]
pub struct NewCatalogSource {
    pub catalog_product_id: String,
    pub hotel_id: Option<String>,
    pub product_id: Option<String>,
    pub base_price_cents: Option<i64>,
    pub priority: i64,
}

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Creates a catalog product.
    pub async fn create(&self, new: NewCatalogProduct) -> DbResult<CatalogProduct> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, slug = %new.slug, "Creating catalog product");

        let product = CatalogProduct {
            id: id.clone(),
            name: new.name,
            slug: new.slug,
            description: new.description,
            initial_price_cents: new.initial_price_cents,
            final_price_cents: new.final_price_cents,
            stock: new.stock,
            is_visible: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO catalog_products (
                id, name, slug, description,
                initial_price_cents, final_price_cents, stock,
                is_visible, is_featured, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.initial_price_cents)
        .bind(product.final_price_cents)
        .bind(product.stock)
        .bind(product.is_visible)
        .bind(product.is_featured)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a catalog product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CatalogProduct>> {
        let product = sqlx::query_as::<_, CatalogProduct>(
            r#"
            SELECT id, name, slug, description,
                   initial_price_cents, final_price_cents, stock,
                   is_visible, is_featured, created_at, updated_at
            FROM catalog_products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a catalog product by ID, erroring if missing.
    pub async fn require(&self, id: &str) -> DbResult<CatalogProduct> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("CatalogProduct", id))
    }

    /// Gets a visible catalog product by slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<CatalogProduct>> {
        let product = sqlx::query_as::<_, CatalogProduct>(
            r#"
            SELECT id, name, slug, description,
                   initial_price_cents, final_price_cents, stock,
                   is_visible, is_featured, created_at, updated_at
            FROM catalog_products
            WHERE slug = ?1 AND is_visible = 1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Adds a fulfillment source to a catalog product.
    pub async fn add_source(&self, new: NewCatalogSource) -> DbResult<CatalogProductSource> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let source = CatalogProductSource {
            id: id.clone(),
            catalog_product_id: new.catalog_product_id,
            hotel_id: new.hotel_id,
            product_id: new.product_id,
            base_price_cents: new.base_price_cents,
            enabled: true,
            priority: new.priority,
            constraints: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO catalog_product_sources (
                id, catalog_product_id, hotel_id, product_id,
                base_price_cents, enabled, priority, constraints,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&source.id)
        .bind(&source.catalog_product_id)
        .bind(&source.hotel_id)
        .bind(&source.product_id)
        .bind(source.base_price_cents)
        .bind(source.enabled)
        .bind(source.priority)
        .bind(&source.constraints)
        .bind(source.created_at)
        .bind(source.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(source)
    }

    /// Disables a source so the assigner stops considering it.
    pub async fn disable_source(&self, source_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE catalog_product_sources SET enabled = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(source_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CatalogProductSource", source_id));
        }

        Ok(())
    }

    /// Loads the enabled sources of a catalog product together with the
    /// current price of any linked local product.
    ///
    /// The LEFT JOIN keeps sources whose `product_id` is null or
    /// dangling; their linked price is simply absent and the ranking
    /// falls back to `base_price_cents`.
    pub async fn candidate_sources(&self, catalog_product_id: &str) -> DbResult<Vec<SourceCandidate>> {
        #[derive(sqlx::FromRow)]
        struct CandidateRow {
            #[sqlx(flatten)]
            source: CatalogProductSource,
            linked_price_cents: Option<i64>,
        }

        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT s.id, s.catalog_product_id, s.hotel_id, s.product_id,
                   s.base_price_cents, s.enabled, s.priority, s.constraints,
                   s.created_at, s.updated_at,
                   p.price_cents AS linked_price_cents
            FROM catalog_product_sources s
            LEFT JOIN products p ON p.id = s.product_id
            WHERE s.catalog_product_id = ?1 AND s.enabled = 1
            "#,
        )
        .bind(catalog_product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SourceCandidate {
                source: row.source,
                product_price_cents: row.linked_price_cents,
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
