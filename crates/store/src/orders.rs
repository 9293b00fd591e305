use async_trait::async_trait;
use common::{IdempotencyKey, OrderId, UserId};
use domain::{Order, StatusChange, Version};

use crate::Result;

/// Entity names used in order errors.
pub const ORDER: &str = "Order";
pub const IDEMPOTENCY_KEY: &str = "IdempotencyKey";

/// Durable order records.
///
/// Orders are written once by checkout; afterwards only their status history
/// grows.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a newly placed order.
    ///
    /// Fails with `AlreadyExists` if the order id, or the order's
    /// (user, idempotency key) pair, is already taken.
    async fn create_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns a user's orders, newest first.
    async fn find_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Finds the order a user placed with `key`, if any.
    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &IdempotencyKey,
    ) -> Result<Option<Order>>;

    /// Returns every order, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Appends a status change if the order is still at `expected_version`.
    ///
    /// Returns the order after the change.
    async fn append_status_change(
        &self,
        order_id: OrderId,
        change: StatusChange,
        expected_version: Version,
    ) -> Result<Order>;
}
