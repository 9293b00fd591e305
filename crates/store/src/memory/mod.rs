//! In-memory stores for tests and single-process use.
//!
//! Every store is a cheap `Clone` handle over shared state, and exposes
//! `set_fail_on_*` switches so tests can inject backend failures.

mod carts;
mod catalog;
mod orders;

pub use carts::InMemoryCartStore;
pub use catalog::InMemoryCatalog;
pub use orders::InMemoryOrderStore;
