//! Cart domain events.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::Quantity;

/// Events that can occur on a cart aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// A line for a product not yet in the cart was appended.
    LineAdded(LineAddedData),

    /// An existing line's quantity changed (merge on add, or explicit set).
    LineQuantityChanged(LineQuantityChangedData),

    /// A line was removed.
    LineRemoved(LineRemovedData),

    /// All lines were removed.
    CartCleared(CartClearedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::LineAdded(_) => "LineAdded",
            CartEvent::LineQuantityChanged(_) => "LineQuantityChanged",
            CartEvent::LineRemoved(_) => "LineRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAddedData {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantityChangedData {
    pub product_id: ProductId,
    pub old_quantity: Quantity,
    pub new_quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub product_id: ProductId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartClearedData {
    /// Number of lines the cart held before clearing.
    pub line_count: usize,
}

impl CartEvent {
    pub fn line_added(product_id: ProductId, quantity: Quantity) -> Self {
        CartEvent::LineAdded(LineAddedData {
            product_id,
            quantity,
        })
    }

    pub fn line_quantity_changed(
        product_id: ProductId,
        old_quantity: Quantity,
        new_quantity: Quantity,
    ) -> Self {
        CartEvent::LineQuantityChanged(LineQuantityChangedData {
            product_id,
            old_quantity,
            new_quantity,
        })
    }

    pub fn line_removed(product_id: ProductId) -> Self {
        CartEvent::LineRemoved(LineRemovedData { product_id })
    }

    pub fn cart_cleared(line_count: usize) -> Self {
        CartEvent::CartCleared(CartClearedData { line_count })
    }
}
