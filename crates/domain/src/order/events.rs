//! Order domain events.

use chrono::{DateTime, Utc};
use common::{IdempotencyKey, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::{Money, aggregate::DomainEvent};

use super::{OrderError, OrderLine, OrderStatus, ShippingAddress};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed by checkout.
    Placed(OrderPlaced),

    /// Order moved to a new status.
    StatusChanged(StatusChange),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
        }
    }
}

/// The fact that an order was placed. Carries everything the order is born with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total_price: Money,
    pub shipping_address: ShippingAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
    pub placed_at: DateTime<Utc>,
}

impl OrderPlaced {
    /// Builds the placement fact, computing the total from the lines.
    ///
    /// Fails with `NoLines` for an empty order and `TotalOverflow` naming the
    /// first line at which the total stops fitting in `Money`.
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        placed_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        let mut total_price = Money::zero();
        for line in &lines {
            total_price = line
                .line_total()?
                .checked_add(total_price)
                .ok_or_else(|| OrderError::TotalOverflow {
                    product_id: line.product_id.clone(),
                })?;
        }

        Ok(Self {
            order_id,
            user_id,
            lines,
            total_price,
            shipping_address,
            idempotency_key: None,
            placed_at,
        })
    }

    pub fn with_idempotency_key(mut self, key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = key;
        self
    }
}

/// One entry of an order's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// The administrator who made the change, if known.
    #[serde(default)]
    pub changed_by: Option<UserId>,
    pub changed_at: DateTime<Utc>,
}
