//! Value objects for the order domain.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::{Money, Product, cart::Quantity};

use super::OrderError;

/// A line of a placed order.
///
/// Name and unit price are copied from the catalog when the order is placed,
/// so later catalog edits never change an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl OrderLine {
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: Quantity,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            unit_price,
            quantity,
        }
    }

    /// Captures the product's current name and price for `quantity` units.
    pub fn snapshot(product: &Product, quantity: Quantity) -> Self {
        Self::new(
            product.id().clone(),
            product.name(),
            product.price(),
            quantity,
        )
    }

    /// Returns `unit_price × quantity`.
    ///
    /// Fails with `TotalOverflow` if the product does not fit in `Money`.
    pub fn line_total(&self) -> Result<Money, OrderError> {
        self.unit_price
            .checked_multiply(self.quantity.get())
            .ok_or_else(|| OrderError::TotalOverflow {
                product_id: self.product_id.clone(),
            })
    }
}

/// A non-empty shipping address, stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShippingAddress(String);

impl ShippingAddress {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, OrderError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(OrderError::EmptyShippingAddress);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShippingAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ShippingAddress {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ShippingAddress> for String {
    fn from(address: ShippingAddress) -> Self {
        address.0
    }
}
