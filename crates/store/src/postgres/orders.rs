use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{IdempotencyKey, OrderId, UserId};
use domain::{
    Aggregate, Money, Order, OrderLine, OrderPlaced, OrderStatus, ShippingAddress, StatusChange,
    Version,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    orders::{IDEMPOTENCY_KEY, ORDER, OrderStore},
};

const ORDER_COLUMNS: &str =
    "id, user_id, lines, total_cents, shipping_address, idempotency_key, created_at";

/// PostgreSQL-backed order store.
///
/// The placement fact lives in `orders`; status changes are rows in
/// `order_status_changes`, and the order is rehydrated from both.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn corrupt(e: impl ToString) -> StoreError {
        StoreError::Corrupt(e.to_string())
    }

    fn row_to_placed(row: &PgRow) -> Result<OrderPlaced> {
        let lines_json: serde_json::Value = row.try_get("lines")?;
        let lines: Vec<OrderLine> = serde_json::from_value(lines_json)?;

        let idempotency_key = row
            .try_get::<Option<String>, _>("idempotency_key")?
            .map(IdempotencyKey::new)
            .transpose()
            .map_err(Self::corrupt)?;

        Ok(OrderPlaced {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            lines,
            total_price: Money::from_cents(row.try_get("total_cents")?),
            shipping_address: ShippingAddress::parse(
                row.try_get::<String, _>("shipping_address")?,
            )
            .map_err(Self::corrupt)?,
            idempotency_key,
            placed_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn row_to_change(row: &PgRow) -> Result<StatusChange> {
        let from: String = row.try_get("from_status")?;
        let to: String = row.try_get("to_status")?;

        Ok(StatusChange {
            from: from.parse::<OrderStatus>().map_err(Self::corrupt)?,
            to: to.parse::<OrderStatus>().map_err(Self::corrupt)?,
            changed_by: row
                .try_get::<Option<Uuid>, _>("changed_by")?
                .map(UserId::from_uuid),
            changed_at: row.try_get("changed_at")?,
        })
    }

    /// Rehydrates orders from their rows, fetching all histories in one query.
    async fn rehydrate_all(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        let change_rows = sqlx::query(
            r#"
            SELECT order_id, from_status, to_status, changed_by, changed_at
            FROM order_status_changes
            WHERE order_id = ANY($1)
            ORDER BY order_id, seq ASC
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut histories: HashMap<Uuid, Vec<StatusChange>> = HashMap::new();
        for row in &change_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            histories
                .entry(order_id)
                .or_default()
                .push(Self::row_to_change(row)?);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                let placed = Self::row_to_placed(row)?;
                let history = histories.remove(&id).unwrap_or_default();
                Ok(Order::rehydrate(placed, history))
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(
        skip_all,
        fields(order_id = %order.id(), user_id = %order.user_id())
    )]
    async fn create_order(&self, order: &Order) -> Result<()> {
        let lines = serde_json::to_value(order.lines())?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, lines, total_cents, shipping_address, status,
                 idempotency_key, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(lines)
        .bind(order.total_price().cents())
        .bind(order.shipping_address().as_str())
        .bind(order.status().as_str())
        .bind(order.idempotency_key().map(IdempotencyKey::as_str))
        .bind(order.version().as_i64())
        .bind(order.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("orders_pkey") => {
                        return StoreError::already_exists(ORDER, order.id());
                    }
                    Some("unique_user_idempotency_key") => {
                        let key = order.idempotency_key().map(IdempotencyKey::as_str);
                        return StoreError::already_exists(
                            IDEMPOTENCY_KEY,
                            key.unwrap_or_default(),
                        );
                    }
                    _ => {}
                }
            }
            StoreError::Database(e)
        })?;

        for (seq, change) in order.history().iter().enumerate() {
            insert_change(&mut tx, order.id(), seq as i64 + 1, change).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(self.rehydrate_all(row.into_iter().collect()).await?.pop())
    }

    async fn find_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        self.rehydrate_all(rows).await
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &IdempotencyKey,
    ) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND idempotency_key = $2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(self.rehydrate_all(row.into_iter().collect()).await?.pop())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        self.rehydrate_all(rows).await
    }

    async fn append_status_change(
        &self,
        order_id: OrderId,
        change: StatusChange,
        expected_version: Version,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let actual = current
            .map(Version::new)
            .ok_or_else(|| StoreError::not_found(ORDER, order_id))?;
        if actual != expected_version {
            return Err(StoreError::conflict(
                ORDER,
                order_id,
                expected_version,
                actual,
            ));
        }

        // Version 1 is the placement itself, so the next history entry is seq = version.
        insert_change(&mut tx, order_id, actual.as_i64(), &change).await?;

        sqlx::query("UPDATE orders SET status = $2, version = version + 1 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(change.to.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::not_found(ORDER, order_id))
    }
}

async fn insert_change(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: OrderId,
    seq: i64,
    change: &StatusChange,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_status_changes
            (order_id, seq, from_status, to_status, changed_by, changed_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(order_id.as_uuid())
    .bind(seq)
    .bind(change.from.as_str())
    .bind(change.to.as_str())
    .bind(change.changed_by.map(|user| user.as_uuid()))
    .bind(change.changed_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
