//! Repository contracts for the storefront and their implementations.
//!
//! - [`CatalogStore`]: products and atomic stock adjustments
//! - [`CartStore`]: per-user carts with optimistic concurrency
//! - [`OrderStore`]: immutable orders and their status history
//!
//! Each contract has an in-memory implementation (with fault injection for
//! tests) and a PostgreSQL implementation sharing one `sqlx` pool.

pub mod carts;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod orders;
pub mod postgres;

pub use carts::CartStore;
pub use catalog::CatalogStore;
pub use error::{Result, StoreError};
pub use memory::{InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore};
pub use orders::OrderStore;
pub use postgres::{PostgresCartStore, PostgresCatalog, PostgresOrderStore};
