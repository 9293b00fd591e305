use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::UserId;
use domain::{Aggregate, Cart, Version};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    carts::{CART, CartStore},
};

/// In-memory cart store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
    fail_on_save: Arc<AtomicBool>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `save` call fail until switched off.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of users with a stored cart.
    pub async fn cart_count(&self) -> usize {
        self.carts.read().await.len()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, user_id: UserId) -> Result<Cart> {
        Ok(self
            .carts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    async fn save(&self, cart: &Cart, expected_version: Version) -> Result<Version> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "injected save failure for cart of {}",
                cart.user_id()
            )));
        }

        let mut carts = self.carts.write().await;
        let current = carts
            .get(&cart.user_id())
            .map(Aggregate::version)
            .unwrap_or_default();

        if current != expected_version {
            return Err(StoreError::conflict(
                CART,
                cart.user_id(),
                expected_version,
                current,
            ));
        }

        carts.insert(cart.user_id(), cart.clone());
        Ok(cart.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use domain::Quantity;

    fn with_line(cart: &Cart, id: &str) -> Cart {
        let mut next = cart.clone();
        let events = cart
            .add_line(ProductId::new(id), Quantity::new(1).unwrap())
            .unwrap();
        next.apply_events(events);
        next
    }

    #[tokio::test]
    async fn test_load_creates_empty_cart() {
        let store = InMemoryCartStore::new();
        let user = UserId::new();

        let cart = store.load(user).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.user_id(), user);
        assert_eq!(cart.version(), Version::initial());
        assert_eq!(store.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let store = InMemoryCartStore::new();
        let user = UserId::new();

        let loaded = store.load(user).await.unwrap();
        let updated = with_line(&loaded, "SKU-001");
        let version = store.save(&updated, loaded.version()).await.unwrap();
        assert_eq!(version, Version::new(1));

        let reloaded = store.load(user).await.unwrap();
        assert_eq!(reloaded, updated);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = InMemoryCartStore::new();
        let user = UserId::new();

        let base = store.load(user).await.unwrap();
        let first = with_line(&base, "SKU-001");
        let second = with_line(&base, "SKU-002");

        store.save(&first, base.version()).await.unwrap();
        let err = store.save(&second, base.version()).await.unwrap_err();
        assert!(err.is_conflict());

        let stored = store.load(user).await.unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_fail_on_save() {
        let store = InMemoryCartStore::new();
        let user = UserId::new();
        store.set_fail_on_save(true);

        let base = store.load(user).await.unwrap();
        let result = store.save(&with_line(&base, "SKU-001"), base.version()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
