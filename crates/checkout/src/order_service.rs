//! Order lookups and administrative status changes.

use common::{OrderId, Requester};
use domain::{Aggregate, Order, OrderStatus};
use store::{OrderStore, orders::ORDER};

use crate::error::{CheckoutError, Result};

/// Read access to orders plus the administrator-only status lifecycle.
#[derive(Clone)]
pub struct OrderService<O> {
    orders: O,
    max_conflict_retries: u32,
}

impl<O: OrderStore> OrderService<O> {
    pub fn new(orders: O, max_conflict_retries: u32) -> Self {
        Self {
            orders,
            max_conflict_retries,
        }
    }

    /// Returns the requester's own orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for(&self, requester: Requester) -> Result<Vec<Order>> {
        Ok(self.orders.find_orders_by_user(requester.user_id).await?)
    }

    /// Returns one order if the requester owns it or is an administrator.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, requester: Requester, order_id: OrderId) -> Result<Order> {
        let order = self.load(order_id).await?;
        if !requester.can_access(order.user_id()) {
            return Err(CheckoutError::Forbidden(format!(
                "order {order_id} belongs to another user"
            )));
        }
        Ok(order)
    }

    /// Returns every order, newest first. Administrators only.
    #[tracing::instrument(skip(self))]
    pub async fn all_orders(&self, requester: Requester) -> Result<Vec<Order>> {
        require_admin(requester, "list all orders")?;
        Ok(self.orders.list_orders().await?)
    }

    /// Moves an order to `status`, appending to its history. Administrators only.
    ///
    /// A concurrent change to the same order is retried against a fresh load;
    /// the transition is re-validated each time.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        requester: Requester,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        require_admin(requester, "change order status")?;

        let mut retries = 0;
        loop {
            let order = self.load(order_id).await?;
            let change = order.transition(status, Some(requester.user_id))?;
            let from = change.from;

            match self
                .orders
                .append_status_change(order_id, change, order.version())
                .await
            {
                Ok(updated) => {
                    metrics::counter!("order_status_transitions_total", "to" => status.as_str())
                        .increment(1);
                    tracing::info!(%from, to = %status, "order status changed");
                    return Ok(updated);
                }
                Err(error) if error.is_conflict() && retries < self.max_conflict_retries => {
                    retries += 1;
                    tracing::debug!(retries, "order changed concurrently, retrying");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found(ORDER, order_id))
    }
}

fn require_admin(requester: Requester, action: &str) -> Result<()> {
    if requester.is_admin() {
        return Ok(());
    }
    Err(CheckoutError::Forbidden(format!(
        "only administrators may {action}"
    )))
}
