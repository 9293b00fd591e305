use async_trait::async_trait;
use common::UserId;
use domain::{Cart, Version};

use crate::Result;

/// Entity name used in cart errors.
pub const CART: &str = "Cart";

/// Per-user cart persistence with optimistic concurrency.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Loads a user's cart. A user with no stored cart gets an empty one at
    /// version 0.
    async fn load(&self, user_id: UserId) -> Result<Cart>;

    /// Stores `cart` if the persisted version still equals `expected_version`.
    ///
    /// Fails with `ConcurrencyConflict` otherwise. Returns the stored version.
    async fn save(&self, cart: &Cart, expected_version: Version) -> Result<Version>;
}
