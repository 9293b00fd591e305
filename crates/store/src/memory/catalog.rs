use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use domain::{Product, ProductError, Quantity};
use tokio::sync::{Mutex, RwLock};

use crate::{
    Result, StoreError,
    catalog::{CatalogStore, PRODUCT},
};

#[derive(Debug, Default)]
struct Faults {
    fail_on_get: bool,
    fail_on_decrement: Option<ProductId>,
    drain_on_decrement: Option<ProductId>,
    fail_on_increment: bool,
}

/// In-memory catalog.
///
/// Each product sits behind its own mutex; the map itself is only
/// write-locked to add or remove products, so stock adjustments on different
/// products never contend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, Arc<Mutex<Product>>>>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog seeded with `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products
            .into_iter()
            .map(|product| (product.id().clone(), Arc::new(Mutex::new(product))))
            .collect();
        Self {
            products: Arc::new(RwLock::new(map)),
            faults: Arc::default(),
        }
    }

    /// Returns the current stock of a product, if it exists.
    pub async fn stock_of(&self, id: &ProductId) -> Option<u32> {
        let entry = self.products.read().await.get(id).cloned()?;
        let product = entry.lock().await;
        Some(product.stock())
    }

    /// Makes every `get_product` call fail.
    pub async fn set_fail_on_get(&self, fail: bool) {
        self.faults.write().await.fail_on_get = fail;
    }

    /// Makes `decrement_stock` fail for one product.
    pub async fn set_fail_on_decrement(&self, product_id: Option<ProductId>) {
        self.faults.write().await.fail_on_decrement = product_id;
    }

    /// Empties a product's stock just before it is decremented, as if another
    /// buyer took the last units between validation and reservation.
    pub async fn set_drain_on_decrement(&self, product_id: Option<ProductId>) {
        self.faults.write().await.drain_on_decrement = product_id;
    }

    /// Makes every `increment_stock` call fail.
    pub async fn set_fail_on_increment(&self, fail: bool) {
        self.faults.write().await.fail_on_increment = fail;
    }

    async fn entry(&self, id: &ProductId) -> Result<Arc<Mutex<Product>>> {
        self.products
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(PRODUCT, id))
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        if self.faults.read().await.fail_on_get {
            return Err(StoreError::Unavailable(format!(
                "injected read failure for {id}"
            )));
        }

        let Some(entry) = self.products.read().await.get(id).cloned() else {
            return Ok(None);
        };
        let product = entry.lock().await;
        Ok(Some(product.clone()))
    }

    async fn decrement_stock(&self, id: &ProductId, amount: Quantity) -> Result<Product> {
        let (fail, drain) = {
            let faults = self.faults.read().await;
            (
                faults.fail_on_decrement.as_ref() == Some(id),
                faults.drain_on_decrement.as_ref() == Some(id),
            )
        };
        if fail {
            return Err(StoreError::Unavailable(format!(
                "injected decrement failure for {id}"
            )));
        }

        let entry = self.entry(id).await?;
        let mut product = entry.lock().await;

        if drain {
            let stock = product.stock();
            product
                .take_stock(stock)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        }

        product
            .take_stock(amount.get())
            .map_err(|e| match e {
                ProductError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                } => StoreError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                },
                other => StoreError::Corrupt(other.to_string()),
            })?;

        Ok(product.clone())
    }

    async fn increment_stock(&self, id: &ProductId, amount: Quantity) -> Result<Product> {
        if self.faults.read().await.fail_on_increment {
            return Err(StoreError::Unavailable(format!(
                "injected increment failure for {id}"
            )));
        }

        let entry = self.entry(id).await?;
        let mut product = entry.lock().await;
        product
            .return_stock(amount.get())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(product.clone())
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        match products.get(product.id()).cloned() {
            Some(entry) => *entry.lock().await = product,
            None => {
                products.insert(product.id().clone(), Arc::new(Mutex::new(product)));
            }
        }
        Ok(())
    }

    async fn remove_product(&self, id: &ProductId) -> Result<bool> {
        Ok(self.products.write().await.remove(id).is_some())
    }
}
