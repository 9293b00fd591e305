//! Identifiers and caller identity shared across the storefront crates.

pub mod identity;
pub mod types;

pub use identity::{Requester, Role};
pub use types::{
    IdempotencyKey, IdempotencyKeyError, MAX_IDEMPOTENCY_KEY_LEN, OrderId, ProductId, UserId,
};
