//! # Fulfillment Ranking & Payout Math
//!
//! Pure logic for choosing which physical source satisfies a catalog
//! order and what everyone gets paid.
//!
//! ## Ranking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Candidate Ranking                                    │
//! │                                                                         │
//! │  Primary key:   priority ascending (lower = preferred)                  │
//! │  Tie-break:     effective unit price ascending                          │
//! │                                                                         │
//! │  effective price = base_price_cents                                     │
//! │                  ∨ linked product price (cents)                         │
//! │                  ∨ +∞ (unpriced candidates sort last)                   │
//! │                                                                         │
//! │  priorities [10, 5, 10], prices [100, 200, 50]  →  picks priority 5     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sort is stable and deterministic for a fixed input, so the same
//! catalog state always assigns the same source.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{CatalogProductSource, PriceBreakdown};
use crate::{PLATFORM_CUT_BPS, TRANSPORT_FEE_CENTS};

// =============================================================================
// Candidates
// =============================================================================

/// A fulfillment source joined with its linked product's price, the
/// shape the ranking needs. Built by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCandidate {
    pub source: CatalogProductSource,
    /// Price of the linked local product, when the source has one.
    pub product_price_cents: Option<i64>,
}

impl SourceCandidate {
    /// Effective unit price used for ranking: the source's own base
    /// price, else the linked product's price, else `None` (sorts last).
    pub fn effective_price_cents(&self) -> Option<i64> {
        self.source.base_price_cents.or(self.product_price_cents)
    }

    /// What the hotel is owed per unit: same chain as the effective
    /// price but an unpriced source costs zero in the breakdown.
    pub fn hotel_base_cents(&self) -> i64 {
        self.effective_price_cents().unwrap_or(0)
    }
}

/// Sorts candidates by priority ascending, then effective price
/// ascending. Unpriced candidates sort after priced ones of the same
/// priority.
pub fn rank_candidates(candidates: &mut [SourceCandidate]) {
    candidates.sort_by(|a, b| {
        a.source
            .priority
            .cmp(&b.source.priority)
            .then_with(|| {
                let pa = a.effective_price_cents().unwrap_or(i64::MAX);
                let pb = b.effective_price_cents().unwrap_or(i64::MAX);
                pa.cmp(&pb)
            })
    });
}

// =============================================================================
// Pricing
// =============================================================================

/// Payout parameters.
///
/// The 5% platform cut and the zero transport fee mirror the current
/// business rules, which look like placeholders. They are carried here
/// as overridable configuration rather than baked into the math.
#[derive(Debug, Clone, Copy)]
pub struct FulfillmentPricing {
    pub platform_cut_bps: u32,
    pub transport_cents: i64,
}

impl Default for FulfillmentPricing {
    fn default() -> Self {
        FulfillmentPricing {
            platform_cut_bps: PLATFORM_CUT_BPS,
            transport_cents: TRANSPORT_FEE_CENTS,
        }
    }
}

impl FulfillmentPricing {
    /// Computes the payout breakdown for one fulfillment.
    ///
    /// `profit = catalog − (hotel_base + transport + platform_cut)`.
    /// Profit may be negative when a source is priced above the catalog
    /// listing; that is surfaced, not clamped.
    pub fn breakdown(&self, catalog_price_cents: i64, hotel_base_cents: i64) -> PriceBreakdown {
        let platform_cut = Money::from_cents(catalog_price_cents)
            .percentage_bps(self.platform_cut_bps)
            .cents();
        let profit =
            catalog_price_cents - (hotel_base_cents + self.transport_cents + platform_cut);

        PriceBreakdown {
            catalog_price_cents,
            hotel_base: hotel_base_cents,
            transport: self.transport_cents,
            platform_cut,
            profit,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
