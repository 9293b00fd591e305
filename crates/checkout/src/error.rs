//! Checkout error types.

use common::{IdempotencyKeyError, ProductId};
use domain::{CartError, OrderError};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced to callers of the cart, checkout and order services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Caller input failed validation before anything was touched.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced product, cart line or order does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A product cannot cover the requested quantity.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The operation is not allowed in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A backend failed. Any partial effects were compensated first.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The requester may not see or change this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl CheckoutError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CheckoutError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns a stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::InvalidArgument(_) => "invalid_argument",
            CheckoutError::NotFound { .. } => "not_found",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::InvalidState(_) => "invalid_state",
            CheckoutError::Storage(_) => "storage",
            CheckoutError::Forbidden(_) => "forbidden",
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => CheckoutError::NotFound { entity, id },
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::ConcurrencyConflict { .. } => CheckoutError::InvalidState(error.to_string()),
            other => CheckoutError::Storage(other.to_string()),
        }
    }
}

impl From<CartError> for CheckoutError {
    fn from(error: CartError) -> Self {
        match error {
            CartError::InvalidQuantity { .. } => CheckoutError::InvalidArgument(error.to_string()),
            CartError::LineNotFound { product_id } => {
                CheckoutError::not_found("CartLine", product_id)
            }
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(error: OrderError) -> Self {
        match error {
            OrderError::EmptyShippingAddress
            | OrderError::UnknownStatus(_)
            | OrderError::TotalOverflow { .. } => {
                CheckoutError::InvalidArgument(error.to_string())
            }
            OrderError::NoLines | OrderError::InvalidTransition { .. } => {
                CheckoutError::InvalidState(error.to_string())
            }
        }
    }
}

impl From<IdempotencyKeyError> for CheckoutError {
    fn from(error: IdempotencyKeyError) -> Self {
        CheckoutError::InvalidArgument(error.to_string())
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{OrderStatus, Version};

    #[test]
    fn test_store_errors_map_onto_taxonomy() {
        let err: CheckoutError = StoreError::InsufficientStock {
            product_id: ProductId::new("A"),
            requested: 3,
            available: 2,
        }
        .into();
        assert_eq!(err.reason(), "insufficient_stock");

        let err: CheckoutError = StoreError::ConcurrencyConflict {
            entity: "Cart",
            id: "u".to_string(),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();
        assert_eq!(err.reason(), "invalid_state");

        let err: CheckoutError = StoreError::Unavailable("down".to_string()).into();
        assert_eq!(err, CheckoutError::Storage("Store unavailable: down".to_string()));
    }

    #[test]
    fn test_domain_errors_map_onto_taxonomy() {
        let err: CheckoutError = CartError::InvalidQuantity { quantity: 0 }.into();
        assert_eq!(err.reason(), "invalid_argument");

        let err: CheckoutError = CartError::LineNotFound {
            product_id: ProductId::new("A"),
        }
        .into();
        assert_eq!(err, CheckoutError::not_found("CartLine", "A"));

        let err: CheckoutError = OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        }
        .into();
        assert_eq!(err.reason(), "invalid_state");

        let err: CheckoutError = OrderError::EmptyShippingAddress.into();
        assert_eq!(err.reason(), "invalid_argument");

        let err: CheckoutError = OrderError::TotalOverflow {
            product_id: ProductId::new("SKU-9"),
        }
        .into();
        assert_eq!(
            err,
            CheckoutError::InvalidArgument("Order total overflows at line SKU-9".to_string())
        );
    }

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = CheckoutError::InsufficientStock {
            product_id: ProductId::new("SKU-9"),
            requested: 3,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SKU-9: requested 3, available 2"
        );
    }
}
