//! Cart aggregate implementation.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Version};

use super::{
    CartError, CartEvent, CartLine, Quantity,
    events::{LineAddedData, LineQuantityChangedData},
};

/// A user's shopping cart.
///
/// Lines keep insertion order and hold at most one entry per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    user_id: UserId,

    lines: Vec<CartLine>,

    /// Number of events applied since the cart was first created.
    #[serde(default)]
    version: Version,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn version(&self) -> Version {
        self.version
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::LineAdded(data) => self.apply_line_added(data),
            CartEvent::LineQuantityChanged(data) => self.apply_quantity_changed(data),
            CartEvent::LineRemoved(data) => {
                self.lines.retain(|line| line.product_id != data.product_id);
            }
            CartEvent::CartCleared(_) => self.lines.clear(),
        }
        self.version = self.version.next();
    }
}

impl Cart {
    /// Creates the empty cart a user gets on first access.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            lines: Vec::new(),
            version: Version::initial(),
        }
    }

    /// Rebuilds a cart from persisted state.
    ///
    /// Lines for the same product are folded together so a malformed row set
    /// cannot reintroduce duplicates. Fails with `InvalidQuantity` if a folded
    /// quantity no longer fits.
    pub fn restore(
        user_id: UserId,
        lines: Vec<CartLine>,
        version: Version,
    ) -> Result<Self, CartError> {
        let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
        for line in lines {
            match merged
                .iter_mut()
                .find(|existing| existing.product_id == line.product_id)
            {
                Some(existing) => {
                    existing.quantity = existing.quantity.checked_add(line.quantity)?;
                }
                None => merged.push(line),
            }
        }

        Ok(Self {
            user_id,
            lines: merged,
            version,
        })
    }
}

// Query methods
impl Cart {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product_id == product_id)
    }

    pub fn quantity_of(&self, product_id: &ProductId) -> Option<Quantity> {
        self.line(product_id).map(|line| line.quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total number of units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity.get()))
            .sum()
    }
}

// Command methods (return events)
impl Cart {
    /// Adds `quantity` units of a product, merging into an existing line.
    pub fn add_line(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartEvent>, CartError> {
        match self.quantity_of(&product_id) {
            Some(existing) => {
                let merged = existing.checked_add(quantity)?;
                Ok(vec![CartEvent::line_quantity_changed(
                    product_id, existing, merged,
                )])
            }
            None => Ok(vec![CartEvent::line_added(product_id, quantity)]),
        }
    }

    /// Removes a product's line. Removing an absent line produces no events.
    pub fn remove_line(&self, product_id: &ProductId) -> Vec<CartEvent> {
        if self.line(product_id).is_some() {
            vec![CartEvent::line_removed(product_id.clone())]
        } else {
            vec![]
        }
    }

    /// Replaces a line's quantity.
    pub fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartEvent>, CartError> {
        let existing = self
            .quantity_of(&product_id)
            .ok_or_else(|| CartError::LineNotFound {
                product_id: product_id.clone(),
            })?;

        if existing == quantity {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::line_quantity_changed(
            product_id, existing, quantity,
        )])
    }

    /// Empties the cart. Clearing an empty cart produces no events.
    pub fn clear(&self) -> Vec<CartEvent> {
        if self.is_empty() {
            vec![]
        } else {
            vec![CartEvent::cart_cleared(self.lines.len())]
        }
    }
}

// Apply event helpers
impl Cart {
    fn apply_line_added(&mut self, data: LineAddedData) {
        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id == data.product_id)
        {
            Some(line) => line.quantity = data.quantity,
            None => self.lines.push(CartLine::new(data.product_id, data.quantity)),
        }
    }

    fn apply_quantity_changed(&mut self, data: LineQuantityChangedData) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == data.product_id)
        {
            line.quantity = data.new_quantity;
        }
    }
}
