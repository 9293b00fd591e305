use async_trait::async_trait;
use common::ProductId;
use domain::{Money, Product, Quantity};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    catalog::{CatalogStore, PRODUCT},
};

use super::to_u32;

/// PostgreSQL-backed catalog.
///
/// Stock changes are single conditional `UPDATE`s, so atomicity comes from
/// the row lock Postgres takes for the statement.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        let id: String = row.try_get("id")?;
        let stock = to_u32("stock", row.try_get("stock")?)?;

        Product::new(
            id,
            row.try_get::<String, _>("name")?,
            Money::from_cents(row.try_get("price_cents")?),
            stock,
        )
        .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    #[tracing::instrument(skip_all, fields(product_id = %id, amount = amount.get()))]
    async fn decrement_stock(&self, id: &ProductId, amount: Quantity) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING id, name, price_cents, stock
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(amount.get()))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_product(&row);
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        tracing::debug!(?available, "conditional decrement matched no row");
        match available {
            None => Err(StoreError::not_found(PRODUCT, id)),
            Some(available) => Err(StoreError::InsufficientStock {
                product_id: id.clone(),
                requested: amount.get(),
                available: to_u32("stock", available)?,
            }),
        }
    }

    #[tracing::instrument(skip_all, fields(product_id = %id, amount = amount.get()))]
    async fn increment_stock(&self, id: &ProductId, amount: Quantity) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, price_cents, stock
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(amount.get()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(&row),
            None => Err(StoreError::not_found(PRODUCT, id)),
        }
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                updated_at = NOW()
            "#,
        )
        .bind(product.id().as_str())
        .bind(product.name())
        .bind(product.price().cents())
        .bind(i64::from(product.stock()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_product(&self, id: &ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
