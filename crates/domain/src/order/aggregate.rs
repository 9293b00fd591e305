//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{IdempotencyKey, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    Money,
    aggregate::{Aggregate, Version},
};

use super::{
    OrderError, OrderEvent, OrderLine, OrderPlaced, OrderStatus, ShippingAddress, StatusChange,
};

/// Order aggregate root.
///
/// An order is immutable once placed except for its status, which only moves
/// through [`Order::transition`] and is recorded in an append-only history.
/// Fields are private so nothing outside this module can rewrite lines or
/// totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    lines: Vec<OrderLine>,

    /// Computed once at placement; never recomputed from lines.
    total_price: Money,

    shipping_address: ShippingAddress,
    status: OrderStatus,
    created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<IdempotencyKey>,

    history: Vec<StatusChange>,

    #[serde(default)]
    version: Version,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn version(&self) -> Version {
        self.version
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::Placed(placed) => {
                let version = self.version;
                *self = Self::from_placed(placed);
                self.version = version;
            }
            OrderEvent::StatusChanged(change) => {
                self.status = change.to;
                self.history.push(change);
            }
        }
        self.version = self.version.next();
    }
}

impl Order {
    /// Creates a pending order from its placement fact.
    pub fn place(placed: OrderPlaced) -> Self {
        let mut order = Self::from_placed(placed);
        order.version = order.version.next();
        order
    }

    /// Rebuilds an order from its placement and recorded status history.
    pub fn rehydrate(placed: OrderPlaced, history: impl IntoIterator<Item = StatusChange>) -> Self {
        let mut order = Self::place(placed);
        order.apply_events(history.into_iter().map(OrderEvent::StatusChanged));
        order
    }

    fn from_placed(placed: OrderPlaced) -> Self {
        Self {
            id: placed.order_id,
            user_id: placed.user_id,
            lines: placed.lines,
            total_price: placed.total_price,
            shipping_address: placed.shipping_address,
            status: OrderStatus::Pending,
            created_at: placed.placed_at,
            idempotency_key: placed.idempotency_key,
            history: Vec::new(),
            version: Version::initial(),
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    /// Returns every status change, oldest first.
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Returns the total number of units ordered.
    pub fn total_quantity(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity.get()))
            .sum()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Order {
    /// Validates a move to `to` and returns the history entry that records it.
    pub fn transition(
        &self,
        to: OrderStatus,
        changed_by: Option<UserId>,
    ) -> Result<StatusChange, OrderError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        Ok(StatusChange {
            from: self.status,
            to,
            changed_by,
            changed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Quantity;

    fn placed() -> OrderPlaced {
        OrderPlaced::new(
            OrderId::new(),
            UserId::new(),
            vec![OrderLine::new(
                "SKU-001",
                "Widget",
                Money::from_cents(1000),
                Quantity::new(2).unwrap(),
            )],
            ShippingAddress::parse("1 Main St").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    fn advance(order: &mut Order, to: OrderStatus) {
        let change = order.transition(to, None).unwrap();
        order.apply(OrderEvent::StatusChanged(change));
    }

    #[test]
    fn test_place_order() {
        let placed = placed();
        let order = Order::place(placed.clone());

        assert_eq!(order.id(), placed.order_id);
        assert_eq!(order.user_id(), placed.user_id);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_price(), Money::from_cents(2000));
        assert_eq!(order.created_at(), placed.placed_at);
        assert_eq!(order.total_quantity(), 2);
        assert!(order.history().is_empty());
        assert_eq!(order.version(), Version::new(1));
    }

    #[test]
    fn test_full_lifecycle_appends_history() {
        let mut order = Order::place(placed());
        advance(&mut order, OrderStatus::Confirmed);
        advance(&mut order, OrderStatus::Shipped);
        advance(&mut order, OrderStatus::Delivered);

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.is_terminal());
        let path: Vec<_> = order.history().iter().map(|c| (c.from, c.to)).collect();
        assert_eq!(
            path,
            vec![
                (OrderStatus::Pending, OrderStatus::Confirmed),
                (OrderStatus::Confirmed, OrderStatus::Shipped),
                (OrderStatus::Shipped, OrderStatus::Delivered),
            ]
        );
        assert_eq!(order.version(), Version::new(4));
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let order = Order::place(placed());
        assert_eq!(
            order.transition(OrderStatus::Shipped, None),
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            })
        );
    }

    #[test]
    fn test_cancelled_order_cannot_move() {
        let mut order = Order::place(placed());
        advance(&mut order, OrderStatus::Cancelled);

        for next in OrderStatus::ALL {
            assert!(order.transition(next, None).is_err());
        }
    }

    #[test]
    fn test_transition_records_actor() {
        let admin = UserId::new();
        let order = Order::place(placed());
        let change = order.transition(OrderStatus::Confirmed, Some(admin)).unwrap();
        assert_eq!(change.changed_by, Some(admin));
        assert_eq!(change.from, OrderStatus::Pending);
    }

    #[test]
    fn test_rehydrate_matches_live_order() {
        let placed = placed();
        let mut live = Order::place(placed.clone());
        advance(&mut live, OrderStatus::Confirmed);
        advance(&mut live, OrderStatus::Cancelled);

        let rebuilt = Order::rehydrate(placed, live.history().to_vec());
        assert_eq!(rebuilt, live);
    }

    #[test]
    fn test_total_is_not_recomputed() {
        let mut placed = placed();
        placed.total_price = Money::from_cents(1999);
        let order = Order::place(placed);
        assert_eq!(order.total_price(), Money::from_cents(1999));
    }

    #[test]
    fn test_serialization_roundtrip_keeps_history() {
        let mut order = Order::place(placed());
        advance(&mut order, OrderStatus::Confirmed);

        let json = serde_json::to_string(&order).unwrap();
        let restored: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, order);
    }
}
