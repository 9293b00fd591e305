//! Cart, checkout and order services for the storefront.
//!
//! This crate provides:
//! - [`CartService`]: per-user cart edits with merge semantics
//! - [`CheckoutEngine`]: the validate, reserve and commit protocol with
//!   compensating rollback
//! - [`OrderService`]: order lookups and the administrator status lifecycle
//! - [`Storefront`]: wires the three over shared stores and locks
//!
//! # Example
//!
//! ```rust,no_run
//! use checkout::{Checkout, Config, InMemoryStorefront};
//! use common::UserId;
//! use store::InMemoryCatalog;
//!
//! # async fn example() -> checkout::Result<()> {
//! let storefront = InMemoryStorefront::in_memory(InMemoryCatalog::new(), &Config::from_env());
//! let user = UserId::new();
//!
//! storefront.carts().add_line(user, "SKU-001".into(), 2).await?;
//! let order = storefront
//!     .checkout()
//!     .checkout(Checkout::new(user, "1 Main St"))
//!     .await?;
//! println!("placed {} for {}", order.id(), order.total_price());
//! # Ok(())
//! # }
//! ```

pub mod cart_service;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod order_service;
pub mod state;
pub mod storefront;
pub mod telemetry;

pub use cart_service::{CartService, CartView, CartViewLine, ProductSummary};
pub use config::{CartConfig, CheckoutConfig, ConcurrentCheckoutPolicy, Config, LogFormat};
pub use engine::{Checkout, CheckoutEngine};
pub use error::{CheckoutError, Result};
pub use locks::{KeyedGuard, KeyedLocks};
pub use order_service::OrderService;
pub use state::{CheckoutRun, CheckoutState};
pub use storefront::{InMemoryStorefront, PostgresStorefront, Storefront};
