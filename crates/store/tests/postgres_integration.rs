//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{IdempotencyKey, OrderId, ProductId, UserId};
use domain::{
    Aggregate, Cart, Money, Order, OrderLine, OrderPlaced, OrderStatus, Product, Quantity,
    ShippingAddress, Version,
};
use sqlx::PgPool;
use store::{
    CartStore, CatalogStore, OrderStore, PostgresCartStore, PostgresCatalog, PostgresOrderStore,
    StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct Stores {
    catalog: PostgresCatalog,
    carts: PostgresCartStore,
    orders: PostgresOrderStore,
}

/// Get fresh stores with their own pool and cleared tables
async fn get_test_stores() -> Stores {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_status_changes, orders, cart_lines, carts, products")
        .execute(&pool)
        .await
        .unwrap();

    Stores {
        catalog: PostgresCatalog::new(pool.clone()),
        carts: PostgresCartStore::new(pool.clone()),
        orders: PostgresOrderStore::new(pool),
    }
}

fn qty(n: i64) -> Quantity {
    Quantity::new(n).unwrap()
}

fn widget(stock: u32) -> Product {
    Product::new("SKU-001", "Widget", Money::from_cents(1000), stock).unwrap()
}

fn order_for(user_id: UserId, key: Option<&str>) -> Order {
    let placed = OrderPlaced::new(
        OrderId::new(),
        user_id,
        vec![
            OrderLine::new("SKU-001", "Widget", Money::from_cents(1000), qty(2)),
            OrderLine::new("SKU-002", "Gadget", Money::from_cents(250), qty(1)),
        ],
        ShippingAddress::parse("1 Main St").unwrap(),
        Utc::now(),
    )
    .unwrap()
    .with_idempotency_key(key.map(|k| IdempotencyKey::new(k).unwrap()));
    Order::place(placed)
}

mod catalog {
    use super::*;

    #[tokio::test]
    async fn upsert_get_and_remove() {
        let stores = get_test_stores().await;
        let id = ProductId::new("SKU-001");

        stores.catalog.upsert_product(widget(5)).await.unwrap();
        let product = stores.catalog.get_product(&id).await.unwrap().unwrap();
        assert_eq!(product, widget(5));

        stores.catalog.upsert_product(widget(8)).await.unwrap();
        let product = stores.catalog.get_product(&id).await.unwrap().unwrap();
        assert_eq!(product.stock(), 8);

        assert!(stores.catalog.remove_product(&id).await.unwrap());
        assert!(!stores.catalog.remove_product(&id).await.unwrap());
        assert!(stores.catalog.get_product(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn decrement_is_conditional() {
        let stores = get_test_stores().await;
        let id = ProductId::new("SKU-001");
        stores.catalog.upsert_product(widget(2)).await.unwrap();

        let product = stores.catalog.decrement_stock(&id, qty(2)).await.unwrap();
        assert_eq!(product.stock(), 0);

        let err = stores.catalog.decrement_stock(&id, qty(1)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 1,
                available: 0,
                ..
            }
        ));

        let product = stores.catalog.increment_stock(&id, qty(3)).await.unwrap();
        assert_eq!(product.stock(), 3);
    }

    #[tokio::test]
    async fn decrement_missing_product() {
        let stores = get_test_stores().await;
        let err = stores
            .catalog
            .decrement_stock(&ProductId::new("nope"), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_decrements_never_oversell() {
        let stores = get_test_stores().await;
        let id = ProductId::new("SKU-001");
        stores.catalog.upsert_product(widget(5)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..12 {
            let catalog = stores.catalog.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                catalog.decrement_stock(&id, qty(1)).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        let product = stores.catalog.get_product(&id).await.unwrap().unwrap();
        assert_eq!(product.stock(), 0);
    }
}

mod carts {
    use super::*;

    #[tokio::test]
    async fn load_missing_cart_is_empty() {
        let stores = get_test_stores().await;
        let user = UserId::new();

        let cart = stores.carts.load(user).await.unwrap();
        assert_eq!(cart, Cart::new(user));
    }

    #[tokio::test]
    async fn save_and_reload_keeps_line_order() {
        let stores = get_test_stores().await;
        let user = UserId::new();

        let mut cart = stores.carts.load(user).await.unwrap();
        for (id, n) in [("SKU-C", 1), ("SKU-A", 2), ("SKU-B", 3)] {
            let events = cart.add_line(ProductId::new(id), qty(n)).unwrap();
            cart.apply_events(events);
        }

        let version = stores.carts.save(&cart, Version::initial()).await.unwrap();
        assert_eq!(version, Version::new(3));

        let reloaded = stores.carts.load(user).await.unwrap();
        assert_eq!(reloaded, cart);
    }

    #[tokio::test]
    async fn stale_save_conflicts() {
        let stores = get_test_stores().await;
        let user = UserId::new();

        let base = stores.carts.load(user).await.unwrap();
        let mut first = base.clone();
        first.apply_events(base.add_line(ProductId::new("SKU-A"), qty(1)).unwrap());
        let mut second = base.clone();
        second.apply_events(base.add_line(ProductId::new("SKU-B"), qty(1)).unwrap());

        stores.carts.save(&first, base.version()).await.unwrap();
        let err = stores.carts.save(&second, base.version()).await.unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(stores.carts.load(user).await.unwrap(), first);
    }

    #[tokio::test]
    async fn cleared_cart_persists_empty() {
        let stores = get_test_stores().await;
        let user = UserId::new();

        let mut cart = stores.carts.load(user).await.unwrap();
        cart.apply_events(cart.add_line(ProductId::new("SKU-A"), qty(1)).unwrap());
        stores.carts.save(&cart, Version::initial()).await.unwrap();

        let expected = cart.version();
        cart.apply_events(cart.clear());
        stores.carts.save(&cart, expected).await.unwrap();

        let reloaded = stores.carts.load(user).await.unwrap();
        assert!(reloaded.is_empty());
        assert_eq!(reloaded.version(), Version::new(2));
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let stores = get_test_stores().await;
        let order = order_for(UserId::new(), Some("key-1"));

        stores.orders.create_order(&order).await.unwrap();
        let loaded = stores.orders.get_order(order.id()).await.unwrap().unwrap();

        assert_eq!(loaded.id(), order.id());
        assert_eq!(loaded.lines(), order.lines());
        assert_eq!(loaded.total_price(), Money::from_cents(2250));
        assert_eq!(loaded.status(), OrderStatus::Pending);
        assert_eq!(loaded.idempotency_key(), order.idempotency_key());
        assert_eq!(loaded.version(), Version::new(1));
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_rejected() {
        let stores = get_test_stores().await;
        let user = UserId::new();

        let first = order_for(user, Some("key-1"));
        stores.orders.create_order(&first).await.unwrap();

        let err = stores
            .orders
            .create_order(&order_for(user, Some("key-1")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyExists {
                entity: "IdempotencyKey",
                ..
            }
        ));

        let key = IdempotencyKey::new("key-1").unwrap();
        let found = stores
            .orders
            .find_by_idempotency_key(user, &key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), first.id());
    }

    #[tokio::test]
    async fn orders_without_key_do_not_collide() {
        let stores = get_test_stores().await;
        let user = UserId::new();

        stores.orders.create_order(&order_for(user, None)).await.unwrap();
        stores.orders.create_order(&order_for(user, None)).await.unwrap();

        assert_eq!(stores.orders.find_orders_by_user(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn status_history_is_appended() {
        let stores = get_test_stores().await;
        let order = order_for(UserId::new(), None);
        stores.orders.create_order(&order).await.unwrap();

        let admin = UserId::new();
        let change = order
            .transition(OrderStatus::Confirmed, Some(admin))
            .unwrap();
        let confirmed = stores
            .orders
            .append_status_change(order.id(), change, order.version())
            .await
            .unwrap();
        assert_eq!(confirmed.status(), OrderStatus::Confirmed);

        let change = confirmed.transition(OrderStatus::Shipped, None).unwrap();
        let shipped = stores
            .orders
            .append_status_change(order.id(), change, confirmed.version())
            .await
            .unwrap();

        assert_eq!(shipped.history().len(), 2);
        assert_eq!(shipped.history()[0].changed_by, Some(admin));
        assert_eq!(shipped.version(), Version::new(3));

        let stale = order.transition(OrderStatus::Cancelled, None).unwrap();
        let err = stores
            .orders
            .append_status_change(order.id(), stale, order.version())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let stores = get_test_stores().await;
        let first = order_for(UserId::new(), None);
        stores.orders.create_order(&first).await.unwrap();
        let second = order_for(UserId::new(), None);
        stores.orders.create_order(&second).await.unwrap();

        let ids: Vec<_> = stores
            .orders
            .list_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id())
            .collect();
        assert_eq!(ids, vec![second.id(), first.id()]);
    }
}
