//! Cart operations exposed to the presentation layer.

use common::{ProductId, UserId};
use domain::{Aggregate, Cart, CartEvent, Money, Product, Quantity, Version};
use serde::Serialize;
use store::{CartStore, CatalogStore, catalog::PRODUCT};

use crate::{
    config::CartConfig,
    error::{CheckoutError, Result},
    locks::KeyedLocks,
};

/// A read-only snapshot of a cart for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub user_id: UserId,
    pub version: Version,
    pub lines: Vec<CartViewLine>,
    /// Sum of the resolved line totals. Unresolved lines contribute nothing.
    /// Display totals clamp at the `Money` bounds.
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartViewLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Current catalog data, when it was requested and could be read.
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub name: String,
    pub unit_price: Money,
    pub stock: u32,
    pub line_total: Money,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Service for per-user cart mutations.
///
/// Mutations for one user are serialized through a per-user lock shared with
/// the checkout engine; different users never contend.
#[derive(Clone)]
pub struct CartService<C, S> {
    catalog: C,
    carts: S,
    locks: KeyedLocks<UserId>,
    config: CartConfig,
}

impl<C, S> CartService<C, S>
where
    C: CatalogStore,
    S: CartStore,
{
    pub fn new(catalog: C, carts: S, locks: KeyedLocks<UserId>, config: CartConfig) -> Self {
        Self {
            catalog,
            carts,
            locks,
            config,
        }
    }

    /// Adds `quantity` units of a product, merging into an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart> {
        let quantity = Quantity::new(quantity)?;
        let product = self.require_product(&product_id).await?;

        self.mutate(user_id, "add_line", |cart| {
            let events = cart.add_line(product_id.clone(), quantity)?;
            if self.config.enforce_stock_on_add {
                let wanted = cart
                    .quantity_of(&product_id)
                    .map_or(Ok(quantity), |existing| existing.checked_add(quantity))?;
                ensure_stock(&product, wanted)?;
            }
            Ok(events)
        })
        .await
    }

    /// Removes a product's line. Removing an absent line leaves the cart as is.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<Cart> {
        self.mutate(user_id, "remove_line", |cart| {
            Ok(cart.remove_line(&product_id))
        })
        .await
    }

    /// Replaces a line's quantity. Zero is rejected; use [`Self::remove_line`].
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart> {
        let quantity = Quantity::new(quantity)?;
        let product = if self.config.enforce_stock_on_add {
            Some(self.require_product(&product_id).await?)
        } else {
            None
        };

        self.mutate(user_id, "set_quantity", |cart| {
            let events = cart.set_quantity(product_id.clone(), quantity)?;
            if let Some(product) = &product {
                ensure_stock(product, quantity)?;
            }
            Ok(events)
        })
        .await
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<Cart> {
        self.mutate(user_id, "clear", |cart| Ok(cart.clear())).await
    }

    /// Returns the cart, optionally decorated with current product data.
    ///
    /// Product resolution is best effort: a missing product or a failed read
    /// leaves that line unresolved.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, user_id: UserId, resolve: bool) -> Result<CartView> {
        let cart = self.carts.load(user_id).await?;

        let mut lines = Vec::with_capacity(cart.line_count());
        for line in cart.lines() {
            let product = if resolve {
                self.summarize(&line.product_id, line.quantity).await
            } else {
                None
            };
            lines.push(CartViewLine {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                product,
            });
        }

        let subtotal = lines
            .iter()
            .filter_map(|line| line.product.as_ref())
            .fold(Money::zero(), |acc, product| acc.saturating_add(product.line_total));

        Ok(CartView {
            user_id,
            version: cart.version(),
            lines,
            subtotal,
        })
    }

    async fn summarize(&self, product_id: &ProductId, quantity: Quantity) -> Option<ProductSummary> {
        match self.catalog.get_product(product_id).await {
            Ok(Some(product)) => Some(ProductSummary {
                name: product.name().to_string(),
                unit_price: product.price(),
                stock: product.stock(),
                line_total: product.price().saturating_multiply(quantity.get()),
            }),
            Ok(None) => {
                tracing::warn!(%product_id, "cart references a product missing from the catalog");
                None
            }
            Err(error) => {
                tracing::warn!(%product_id, %error, "could not resolve cart line");
                None
            }
        }
    }

    async fn require_product(&self, product_id: &ProductId) -> Result<Product> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found(PRODUCT, product_id))
    }

    /// Runs a cart command under the user's lock and persists its events.
    ///
    /// Commands producing no events leave the stored cart untouched. A save
    /// that loses an optimistic-concurrency race is retried against a fresh
    /// load.
    async fn mutate<F>(&self, user_id: UserId, op: &'static str, command: F) -> Result<Cart>
    where
        F: Fn(&Cart) -> Result<Vec<CartEvent>>,
    {
        let _guard = self.locks.lock(user_id).await;

        let mut retries = 0;
        loop {
            let mut cart = self.carts.load(user_id).await?;
            let expected = cart.version();

            let events = command(&cart)?;
            if events.is_empty() {
                return Ok(cart);
            }
            cart.apply_events(events);

            match self.carts.save(&cart, expected).await {
                Ok(_) => {
                    metrics::counter!("cart_operations_total", "op" => op).increment(1);
                    return Ok(cart);
                }
                Err(error) if error.is_conflict() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    tracing::debug!(%user_id, retries, "cart save conflicted, retrying");
                }
                Err(error) if error.is_conflict() => {
                    return Err(CheckoutError::InvalidState(format!(
                        "cart of {user_id} kept changing, gave up after {retries} retries"
                    )));
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

fn ensure_stock(product: &Product, wanted: Quantity) -> Result<()> {
    if product.has_stock(wanted.get()) {
        return Ok(());
    }
    Err(CheckoutError::InsufficientStock {
        product_id: product.id().clone(),
        requested: wanted.get(),
        available: product.stock(),
    })
}
