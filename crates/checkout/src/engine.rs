//! Checkout engine: turns a cart into an order while keeping stock consistent.

use std::time::Instant;

use chrono::Utc;
use common::{IdempotencyKey, OrderId, ProductId, UserId};
use domain::{Aggregate, CartLine, Order, OrderLine, OrderPlaced, ShippingAddress};
use store::{CartStore, CatalogStore, OrderStore, StoreError, catalog::PRODUCT, orders::IDEMPOTENCY_KEY};
use tracing::Instrument;

use crate::{
    config::{CheckoutConfig, ConcurrentCheckoutPolicy},
    error::{CheckoutError, Result},
    locks::KeyedLocks,
    state::{CheckoutRun, CheckoutState},
};

/// A request to check out a user's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub user_id: UserId,
    pub shipping_address: String,
    pub idempotency_key: Option<String>,
}

impl Checkout {
    pub fn new(user_id: UserId, shipping_address: impl Into<String>) -> Self {
        Self {
            user_id,
            shipping_address: shipping_address.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Runs the validate, reserve and commit protocol for checkouts.
///
/// Each run moves through [`CheckoutState`]: lines are validated against fresh
/// catalog reads, stock is decremented line by line in ascending product
/// order, and the order is persisted. A failure after the first decrement
/// restores every decrement of the run before the error is returned.
///
/// Once a run has acquired the user's checkout guard it executes on its own
/// task, so dropping the returned future does not interrupt it halfway.
#[derive(Clone)]
pub struct CheckoutEngine<C, S, O> {
    catalog: C,
    carts: S,
    orders: O,
    cart_locks: KeyedLocks<UserId>,
    checkout_guards: KeyedLocks<UserId>,
    config: CheckoutConfig,
}

impl<C, S, O> CheckoutEngine<C, S, O>
where
    C: CatalogStore + Clone + 'static,
    S: CartStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    /// Creates an engine. `cart_locks` must be the registry the cart service
    /// uses, so carts cannot change while a checkout reads and clears them.
    pub fn new(
        catalog: C,
        carts: S,
        orders: O,
        cart_locks: KeyedLocks<UserId>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            catalog,
            carts,
            orders,
            cart_locks,
            checkout_guards: KeyedLocks::new(),
            config,
        }
    }

    /// Checks out the requester's cart and returns the created order.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout(&self, request: Checkout) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.guarded(request).await;

        match &result {
            Ok(_) => metrics::counter!("checkout_committed_total").increment(1),
            Err(error) => {
                metrics::counter!("checkout_rejected_total", "reason" => error.reason())
                    .increment(1)
            }
        }
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }

    async fn guarded(&self, request: Checkout) -> Result<Order> {
        let user_id = request.user_id;
        let address = ShippingAddress::parse(&request.shipping_address)?;
        let key = request
            .idempotency_key
            .as_deref()
            .map(IdempotencyKey::new)
            .transpose()?;

        let guard = match self.config.policy {
            ConcurrentCheckoutPolicy::Reject => {
                self.checkout_guards.try_lock(user_id).ok_or_else(|| {
                    CheckoutError::InvalidState(format!(
                        "a checkout is already in progress for user {user_id}"
                    ))
                })?
            }
            ConcurrentCheckoutPolicy::Wait => self.checkout_guards.lock(user_id).await,
        };

        let engine = self.clone();
        let run = async move {
            let _guard = guard;
            engine.run(user_id, address, key).await
        };

        tokio::spawn(run.in_current_span())
            .await
            .map_err(|error| CheckoutError::Storage(format!("checkout task failed: {error}")))?
    }

    async fn run(
        &self,
        user_id: UserId,
        address: ShippingAddress,
        key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        if let Some(key) = &key
            && let Some(existing) = self.orders.find_by_idempotency_key(user_id, key).await?
        {
            tracing::info!(order_id = %existing.id(), "checkout replayed for idempotency key");
            return Ok(existing);
        }

        let _cart_guard = self.cart_locks.lock(user_id).await;

        let cart = self.carts.load(user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::InvalidState(format!(
                "cart of user {user_id} is empty"
            )));
        }

        let mut lines = cart.lines().to_vec();
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let mut run = CheckoutRun::new(user_id);
        tracing::debug!(run_id = %run.id(), lines = lines.len(), "checkout started");

        // Validating
        let placed = match self.prepare(user_id, &lines, address).await {
            Ok(placed) => placed.with_idempotency_key(key.clone()),
            Err(error) => {
                run.advance(CheckoutState::Rejected)?;
                tracing::warn!(run_id = %run.id(), %error, "checkout rejected");
                return Err(error);
            }
        };

        // Reserving
        run.advance(CheckoutState::Reserving)?;
        for line in &lines {
            match self
                .catalog
                .decrement_stock(&line.product_id, line.quantity)
                .await
            {
                Ok(_) => run.record_reservation(line.product_id.clone(), line.quantity),
                Err(error) => {
                    let error = CheckoutError::from(error);
                    return Err(self.abort(&mut run, error, "reserve").await);
                }
            }
        }

        // Commit
        let order = Order::place(placed);

        if let Err(error) = self.orders.create_order(&order).await {
            return self.resolve_failed_commit(&mut run, error, key).await;
        }

        run.advance(CheckoutState::Committed)?;
        self.clear_cart(user_id, &lines).await;

        tracing::info!(
            run_id = %run.id(),
            order_id = %order.id(),
            total = %order.total_price(),
            "checkout committed"
        );
        Ok(order)
    }

    /// Builds the order the run will place: fresh product reads, snapshots
    /// and total. Runs before any stock is touched.
    async fn prepare(
        &self,
        user_id: UserId,
        lines: &[CartLine],
        address: ShippingAddress,
    ) -> Result<OrderPlaced> {
        let snapshots = self.validate(lines).await?;
        Ok(OrderPlaced::new(
            OrderId::new(),
            user_id,
            snapshots,
            address,
            Utc::now(),
        )?)
    }

    /// Re-reads every line's product and snapshots it for the order.
    async fn validate(&self, lines: &[CartLine]) -> Result<Vec<OrderLine>> {
        let mut snapshots = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .catalog
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| CheckoutError::not_found(PRODUCT, &line.product_id))?;

            if !product.has_stock(line.quantity.get()) {
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity.get(),
                    available: product.stock(),
                });
            }
            snapshots.push(OrderLine::snapshot(&product, line.quantity));
        }
        Ok(snapshots)
    }

    /// Handles a failed `create_order`. A duplicate idempotency key means a
    /// concurrent request already placed this order, so that order is returned.
    async fn resolve_failed_commit(
        &self,
        run: &mut CheckoutRun,
        error: StoreError,
        key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let duplicate_key = matches!(
            &error,
            StoreError::AlreadyExists { entity, .. } if *entity == IDEMPOTENCY_KEY
        );

        if duplicate_key && let Some(key) = &key {
            let cause = CheckoutError::from(error);
            self.roll_back(run, &cause, "duplicate_key").await?;
            return self
                .orders
                .find_by_idempotency_key(run.user_id(), key)
                .await?
                .ok_or(cause);
        }

        let cause = CheckoutError::Storage(format!("order could not be persisted: {error}"));
        Err(self.abort(run, cause, "commit").await)
    }

    /// Rolls the run back and returns the error to surface for `cause`.
    async fn abort(
        &self,
        run: &mut CheckoutRun,
        cause: CheckoutError,
        reason: &'static str,
    ) -> CheckoutError {
        match self.roll_back(run, &cause, reason).await {
            Ok(()) => cause,
            Err(error) => error,
        }
    }

    /// Reverses the run's decrements, newest first.
    ///
    /// Fails with `Storage` naming every product whose stock could not be
    /// restored.
    async fn roll_back(
        &self,
        run: &mut CheckoutRun,
        cause: &CheckoutError,
        reason: &'static str,
    ) -> Result<()> {
        let mut unrestored: Vec<ProductId> = Vec::new();
        for (product_id, quantity) in run.reserved().iter().rev() {
            if let Err(error) = self.catalog.increment_stock(product_id, *quantity).await {
                tracing::error!(
                    run_id = %run.id(),
                    %product_id,
                    quantity = quantity.get(),
                    %error,
                    "failed to restore stock"
                );
                metrics::counter!("checkout_compensation_failed_total").increment(1);
                unrestored.push(product_id.clone());
            }
        }

        if let Err(error) = run.advance(CheckoutState::RolledBack) {
            tracing::error!(%error, "rollback from unexpected state");
        }
        metrics::counter!("checkout_rolled_back_total", "reason" => reason).increment(1);
        tracing::warn!(
            run_id = %run.id(),
            reason,
            restored = run.reserved().len() - unrestored.len(),
            error = %cause,
            "checkout rolled back"
        );

        if unrestored.is_empty() {
            return Ok(());
        }

        let products = unrestored
            .iter()
            .map(ProductId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Err(CheckoutError::Storage(format!(
            "{cause}; stock could not be restored for: {products}"
        )))
    }

    /// Removes the ordered lines from the cart after a commit. The order is
    /// already durable, so a failure here is logged and counted rather than
    /// returned.
    async fn clear_cart(&self, user_id: UserId, ordered: &[CartLine]) {
        for attempt in 1..=self.config.cart_clear_attempts {
            match self.try_clear_cart(user_id, ordered).await {
                Ok(()) => return,
                Err(error) => {
                    tracing::warn!(%user_id, attempt, %error, "failed to clear cart after checkout")
                }
            }
        }

        tracing::error!(
            %user_id,
            attempts = self.config.cart_clear_attempts,
            "cart left populated after committed checkout"
        );
        metrics::counter!("checkout_cart_clear_failed_total").increment(1);
    }

    /// Only lines still holding exactly the ordered quantity are removed, so
    /// edits another process saved in the meantime survive.
    async fn try_clear_cart(&self, user_id: UserId, ordered: &[CartLine]) -> store::Result<()> {
        let mut cart = self.carts.load(user_id).await?;
        let expected = cart.version();

        let unchanged: Vec<&CartLine> = ordered
            .iter()
            .filter(|line| cart.quantity_of(&line.product_id) == Some(line.quantity))
            .collect();
        let events = if unchanged.len() == cart.line_count() {
            cart.clear()
        } else {
            unchanged
                .iter()
                .flat_map(|line| cart.remove_line(&line.product_id))
                .collect()
        };
        if events.is_empty() {
            return Ok(());
        }

        cart.apply_events(events);
        self.carts.save(&cart, expected).await?;
        Ok(())
    }
}
