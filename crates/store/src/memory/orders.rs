use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{IdempotencyKey, OrderId, UserId};
use domain::{Aggregate, Order, OrderEvent, StatusChange, Version};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    orders::{IDEMPOTENCY_KEY, ORDER, OrderStore},
};

#[derive(Debug, Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    by_key: HashMap<(UserId, IdempotencyKey), OrderId>,
    /// Insertion order, used to break ties between equal timestamps.
    sequence: Vec<OrderId>,
}

impl OrderTable {
    fn newest_first<'a>(&'a self, filter: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<(usize, &'a Order)> = self
            .sequence
            .iter()
            .enumerate()
            .filter_map(|(seq, id)| self.orders.get(id).map(|order| (seq, order)))
            .filter(|&(_, order)| filter(order))
            .collect();
        orders.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| seq_b.cmp(seq_a))
        });
        orders.into_iter().map(|(_, order)| order.clone()).collect()
    }
}

/// In-memory order store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
    fail_on_create: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create_order` call fail until switched off.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.table.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: &Order) -> Result<()> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "injected create failure for order {}",
                order.id()
            )));
        }

        let mut table = self.table.write().await;
        if table.orders.contains_key(&order.id()) {
            return Err(StoreError::already_exists(ORDER, order.id()));
        }

        if let Some(key) = order.idempotency_key() {
            let slot = (order.user_id(), key.clone());
            if table.by_key.contains_key(&slot) {
                return Err(StoreError::already_exists(IDEMPOTENCY_KEY, key));
            }
            table.by_key.insert(slot, order.id());
        }

        table.sequence.push(order.id());
        table.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.table.read().await.orders.get(&id).cloned())
    }

    async fn find_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self
            .table
            .read()
            .await
            .newest_first(|order| order.user_id() == user_id))
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &IdempotencyKey,
    ) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table
            .by_key
            .get(&(user_id, key.clone()))
            .and_then(|id| table.orders.get(id))
            .cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.table.read().await.newest_first(|_| true))
    }

    async fn append_status_change(
        &self,
        order_id: OrderId,
        change: StatusChange,
        expected_version: Version,
    ) -> Result<Order> {
        let mut table = self.table.write().await;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found(ORDER, order_id))?;

        if order.version() != expected_version {
            return Err(StoreError::conflict(
                ORDER,
                order_id,
                expected_version,
                order.version(),
            ));
        }

        order.apply(OrderEvent::StatusChanged(change));
        Ok(order.clone())
    }
}
