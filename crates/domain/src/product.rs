//! Catalog product record.

use common::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Money;

/// Errors raised by product invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Invalid price for {product_id}: {price} (must not be negative)")]
    NegativePrice { product_id: ProductId, price: Money },

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Stock overflow for {product_id}: {current} + {amount}")]
    StockOverflow {
        product_id: ProductId,
        current: u32,
        amount: u32,
    },
}

/// A product as the catalog currently knows it.
///
/// Stock is unsigned and only changes through [`Product::take_stock`] and
/// [`Product::return_stock`], so it can never go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    stock: u32,
}

impl Product {
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Result<Self, ProductError> {
        let id = id.into();
        if price.is_negative() {
            return Err(ProductError::NegativePrice {
                product_id: id,
                price,
            });
        }

        Ok(Self {
            id,
            name: name.into(),
            price,
            stock,
        })
    }

    pub fn id(&self) -> &ProductId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    /// Returns true if `quantity` units are currently available.
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    /// Removes `quantity` units, rechecking availability at the moment of mutation.
    pub fn take_stock(&mut self, quantity: u32) -> Result<(), ProductError> {
        if !self.has_stock(quantity) {
            return Err(ProductError::InsufficientStock {
                product_id: self.id.clone(),
                requested: quantity,
                available: self.stock,
            });
        }
        self.stock -= quantity;
        Ok(())
    }

    /// Puts `quantity` units back (rollback or restock).
    pub fn return_stock(&mut self, quantity: u32) -> Result<(), ProductError> {
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| ProductError::StockOverflow {
                product_id: self.id.clone(),
                current: self.stock,
                amount: quantity,
            })?;
        Ok(())
    }
}
