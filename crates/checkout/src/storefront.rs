//! Wiring of the storefront services over one set of stores.

use common::UserId;
use store::{
    CartStore, CatalogStore, InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore, OrderStore,
    PostgresCartStore, PostgresCatalog, PostgresOrderStore,
};

use crate::{
    cart_service::CartService,
    config::Config,
    engine::CheckoutEngine,
    error::{CheckoutError, Result},
    locks::KeyedLocks,
    order_service::OrderService,
};

/// The presentation-facing entry point.
///
/// The cart service and the checkout engine share one per-user lock registry,
/// so a running checkout and cart edits for the same user never interleave.
#[derive(Clone)]
pub struct Storefront<C, S, O> {
    catalog: C,
    carts: CartService<C, S>,
    checkout: CheckoutEngine<C, S, O>,
    orders: OrderService<O>,
}

pub type InMemoryStorefront = Storefront<InMemoryCatalog, InMemoryCartStore, InMemoryOrderStore>;
pub type PostgresStorefront = Storefront<PostgresCatalog, PostgresCartStore, PostgresOrderStore>;

impl<C, S, O> Storefront<C, S, O>
where
    C: CatalogStore + Clone + 'static,
    S: CartStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    pub fn new(catalog: C, carts: S, orders: O, config: &Config) -> Self {
        let cart_locks: KeyedLocks<UserId> = KeyedLocks::new();

        Self {
            carts: CartService::new(
                catalog.clone(),
                carts.clone(),
                cart_locks.clone(),
                config.cart_config(),
            ),
            checkout: CheckoutEngine::new(
                catalog.clone(),
                carts,
                orders.clone(),
                cart_locks,
                config.checkout_config(),
            ),
            orders: OrderService::new(orders, config.max_conflict_retries),
            catalog,
        }
    }

    pub fn carts(&self) -> &CartService<C, S> {
        &self.carts
    }

    pub fn checkout(&self) -> &CheckoutEngine<C, S, O> {
        &self.checkout
    }

    pub fn orders(&self) -> &OrderService<O> {
        &self.orders
    }

    /// Direct catalog access, for seeding and restocking.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

impl InMemoryStorefront {
    /// Builds a storefront over fresh in-memory stores seeded with `catalog`.
    pub fn in_memory(catalog: InMemoryCatalog, config: &Config) -> Self {
        Self::new(
            catalog,
            InMemoryCartStore::new(),
            InMemoryOrderStore::new(),
            config,
        )
    }
}

impl PostgresStorefront {
    /// Connects to `DATABASE_URL`, applies migrations and wires the services.
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            CheckoutError::InvalidArgument("DATABASE_URL is not set".to_string())
        })?;

        let pool = store::postgres::connect(url, config.database_max_connections).await?;
        store::postgres::run_migrations(&pool).await?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres"
        );

        Ok(Self::new(
            PostgresCatalog::new(pool.clone()),
            PostgresCartStore::new(pool.clone()),
            PostgresOrderStore::new(pool),
            config,
        ))
    }
}
