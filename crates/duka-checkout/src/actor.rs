//! # Actor Context
//!
//! The minimal identity context the checkout flows need. Who issued a
//! request and whether they may act on someone else's cart is decided
//! here; how they were authenticated is an outer-surface concern and
//! deliberately absent.

/// Role of the acting principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Regular user: may only act on their own carts and orders.
    User,
    /// Admin: may check out any owner's cart.
    Admin,
}

/// The acting principal of a request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    /// A regular user actor.
    pub fn user(id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            role: Role::User,
        }
    }

    /// An admin actor.
    pub fn admin(id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            role: Role::Admin,
        }
    }

    /// Whether this actor may operate on the given owner's cart.
    pub fn may_act_for(&self, owner_id: &str) -> bool {
        self.role == Role::Admin || self.id == owner_id
    }
}
