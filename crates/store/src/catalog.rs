use async_trait::async_trait;
use common::ProductId;
use domain::{Product, Quantity};

use crate::Result;

/// Entity name used in catalog errors.
pub const PRODUCT: &str = "Product";

/// Persistent product records and their stock levels.
///
/// Stock adjustments are atomic per product: concurrent callers never observe
/// or produce a negative stock level, and no operation locks the whole catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Reads a product's current record.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Rechecks availability and removes `amount` units in one step.
    ///
    /// Fails with `InsufficientStock` (stock untouched) or `NotFound`.
    /// Returns the product as it is after the decrement.
    async fn decrement_stock(&self, id: &ProductId, amount: Quantity) -> Result<Product>;

    /// Puts `amount` units back. Used by rollback and restocking.
    async fn increment_stock(&self, id: &ProductId, amount: Quantity) -> Result<Product>;

    /// Creates or replaces a product record.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    /// Deletes a product. Returns false if it did not exist.
    async fn remove_product(&self, id: &ProductId) -> Result<bool>;
}
