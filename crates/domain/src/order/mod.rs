//! Order aggregate and related types.

mod aggregate;
mod events;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use events::{OrderEvent, OrderPlaced, StatusChange};
pub use status::OrderStatus;
pub use value_objects::{OrderLine, ShippingAddress};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// An order must contain at least one line.
    #[error("Order has no lines")]
    NoLines,

    /// The status machine does not allow this move.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Shipping address must not be empty")]
    EmptyShippingAddress,

    /// A line total or the order total does not fit in `Money`.
    #[error("Order total overflows at line {product_id}")]
    TotalOverflow { product_id: ProductId },

    /// A persisted or caller-supplied status name is not recognised.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
