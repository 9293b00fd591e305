//! Domain layer for the storefront.
//!
//! This crate holds the pure model, with no I/O:
//! - `Aggregate` / `DomainEvent` traits shared by the cart and order
//! - `Cart` aggregate with line-merge semantics
//! - `Order` aggregate with line snapshots and a status state machine
//! - `Product` and `Money`

pub mod aggregate;
pub mod cart;
pub mod money;
pub mod order;
pub mod product;

pub use aggregate::{Aggregate, DomainEvent, Version};
pub use cart::{Cart, CartError, CartEvent, CartLine, Quantity};
pub use money::Money;
pub use order::{
    Order, OrderError, OrderEvent, OrderLine, OrderPlaced, OrderStatus, ShippingAddress,
    StatusChange,
};
pub use product::{Product, ProductError};
