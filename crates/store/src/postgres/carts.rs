use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::{Aggregate, Cart, CartLine, Quantity, Version};
use sqlx::{PgPool, Row};

use crate::{
    Result, StoreError,
    carts::{CART, CartStore},
};

/// PostgreSQL-backed cart store.
///
/// A cart is one `carts` row holding the version plus its `cart_lines`.
/// Saves replace the full line set inside a transaction that holds the cart
/// row lock.
#[derive(Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn load(&self, user_id: UserId) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM carts WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let Some(version) = version else {
            tx.commit().await?;
            return Ok(Cart::new(user_id));
        };

        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM cart_lines
            WHERE user_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let lines = rows
            .into_iter()
            .map(|row| {
                let product_id: String = row.try_get("product_id")?;
                let quantity = Quantity::new(row.try_get("quantity")?)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                Ok(CartLine::new(ProductId::new(product_id), quantity))
            })
            .collect::<Result<Vec<_>>>()?;

        Cart::restore(user_id, lines, Version::new(version))
            .map_err(|e| StoreError::Corrupt(format!("cart of {user_id}: {e}")))
    }

    async fn save(&self, cart: &Cart, expected_version: Version) -> Result<Version> {
        let user_id = cart.user_id();
        let mut tx = self.pool.begin().await?;

        // Make sure a row exists so concurrent first saves serialize on its lock.
        sqlx::query(
            "INSERT INTO carts (user_id, version) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        let current: i64 =
            sqlx::query_scalar("SELECT version FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;

        let actual = Version::new(current);
        if actual != expected_version {
            return Err(StoreError::conflict(
                CART,
                user_id,
                expected_version,
                actual,
            ));
        }

        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for (position, line) in cart.lines().iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Corrupt(format!("cart too large: {position} lines")))?;
            sqlx::query(
                r#"
                INSERT INTO cart_lines (user_id, position, product_id, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(position)
            .bind(line.product_id.as_str())
            .bind(i64::from(line.quantity.get()))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE carts SET version = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .bind(cart.version().as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(cart.version())
    }
}
