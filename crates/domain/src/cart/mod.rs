//! Per-user shopping cart aggregate.

mod aggregate;
mod events;
mod line;

pub use aggregate::Cart;
pub use events::{
    CartClearedData, CartEvent, LineAddedData, LineQuantityChangedData, LineRemovedData,
};
pub use line::{CartLine, Quantity};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity is zero, negative, or too large to represent.
    #[error("Invalid quantity: {quantity} (must be between 1 and {})", u32::MAX)]
    InvalidQuantity { quantity: i64 },

    /// The cart has no line for this product.
    #[error("Cart line not found: {product_id}")]
    LineNotFound { product_id: ProductId },
}
