use std::num::NonZeroU32;

use common::ProductId;
use serde::{Deserialize, Serialize};

use super::CartError;

/// A validated, strictly positive item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Parses a raw caller-supplied count.
    pub fn new(quantity: i64) -> Result<Self, CartError> {
        u32::try_from(quantity)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(CartError::InvalidQuantity { quantity })
    }

    /// Returns the count as a plain integer.
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Adds two quantities, failing on overflow.
    pub fn checked_add(self, other: Quantity) -> Result<Quantity, CartError> {
        self.0
            .checked_add(other.get())
            .map(Self)
            .ok_or(CartError::InvalidQuantity {
                quantity: i64::from(self.get()) + i64::from(other.get()),
            })
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = CartError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

/// One (product, quantity) pair in a cart.
///
/// The product is referenced by id only; the cart never owns product data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl CartLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: Quantity) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_zero_and_negative() {
        assert_eq!(
            Quantity::new(0),
            Err(CartError::InvalidQuantity { quantity: 0 })
        );
        assert_eq!(
            Quantity::new(-3),
            Err(CartError::InvalidQuantity { quantity: -3 })
        );
    }

    #[test]
    fn test_quantity_rejects_values_above_u32() {
        let too_big = i64::from(u32::MAX) + 1;
        assert!(Quantity::new(too_big).is_err());
        assert_eq!(Quantity::new(i64::from(u32::MAX)).unwrap().get(), u32::MAX);
    }

    #[test]
    fn test_quantity_checked_add() {
        let two = Quantity::new(2).unwrap();
        let three = Quantity::new(3).unwrap();
        assert_eq!(two.checked_add(three).unwrap().get(), 5);

        let max = Quantity::new(i64::from(u32::MAX)).unwrap();
        assert!(max.checked_add(two).is_err());
    }

    #[test]
    fn test_quantity_deserialization_rejects_zero() {
        let result: Result<Quantity, _> = serde_json::from_str("0");
        assert!(result.is_err());

        let quantity: Quantity = serde_json::from_str("4").unwrap();
        assert_eq!(quantity.get(), 4);
    }
}
