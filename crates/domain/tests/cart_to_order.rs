//! Integration tests for the cart and order aggregates working together.
//!
//! These tests drive the aggregates through their public API only, the way
//! the checkout layer does: cart commands produce events, lines become order
//! snapshots, and the order walks its status machine.

use chrono::Utc;
use common::{IdempotencyKey, OrderId, ProductId, UserId};
use domain::{
    Aggregate, Cart, DomainEvent, Money, Order, OrderError, OrderLine, OrderPlaced, OrderStatus,
    Product, Quantity, ShippingAddress,
};

fn qty(n: i64) -> Quantity {
    Quantity::new(n).unwrap()
}

fn catalog() -> Vec<Product> {
    vec![
        Product::new("SKU-A", "Widget A", Money::from_cents(1000), 5).unwrap(),
        Product::new("SKU-B", "Widget B", Money::from_cents(250), 10).unwrap(),
    ]
}

fn place_from_cart(cart: &Cart, products: &[Product]) -> Order {
    let lines = cart
        .lines()
        .iter()
        .map(|line| {
            let product = products
                .iter()
                .find(|p| p.id() == &line.product_id)
                .unwrap();
            OrderLine::snapshot(product, line.quantity)
        })
        .collect();

    let placed = OrderPlaced::new(
        OrderId::new(),
        cart.user_id(),
        lines,
        ShippingAddress::parse("1 Main St").unwrap(),
        Utc::now(),
    )
    .unwrap();
    Order::place(placed)
}

mod cart_flow {
    use super::*;

    #[test]
    fn add_merge_and_clear() {
        let mut cart = Cart::new(UserId::new());

        let events = cart.add_line(ProductId::new("SKU-A"), qty(1)).unwrap();
        assert_eq!(events[0].event_type(), "LineAdded");
        cart.apply_events(events);

        let events = cart.add_line(ProductId::new("SKU-A"), qty(1)).unwrap();
        assert_eq!(events[0].event_type(), "LineQuantityChanged");
        cart.apply_events(events);

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.quantity_of(&ProductId::new("SKU-A")), Some(qty(2)));

        let events = cart.clear();
        cart.apply_events(events);
        assert!(cart.is_empty());
        assert_eq!(cart.version().as_i64(), 3);
    }

    #[test]
    fn noop_commands_do_not_bump_version() {
        let mut cart = Cart::new(UserId::new());
        cart.apply_events(cart.remove_line(&ProductId::new("SKU-A")));
        cart.apply_events(cart.clear());
        assert_eq!(cart.version().as_i64(), 0);
    }
}

mod placement {
    use super::*;

    #[test]
    fn order_total_from_snapshots() {
        let products = catalog();
        let mut cart = Cart::new(UserId::new());
        cart.apply_events(cart.add_line(ProductId::new("SKU-A"), qty(2)).unwrap());
        cart.apply_events(cart.add_line(ProductId::new("SKU-B"), qty(4)).unwrap());

        let order = place_from_cart(&cart, &products);

        assert_eq!(order.user_id(), cart.user_id());
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.total_price(), Money::from_cents(3000));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn later_price_change_does_not_alter_order() {
        let mut products = catalog();
        let mut cart = Cart::new(UserId::new());
        cart.apply_events(cart.add_line(ProductId::new("SKU-A"), qty(1)).unwrap());

        let order = place_from_cart(&cart, &products);
        products[0] = Product::new("SKU-A", "Widget A v2", Money::from_cents(9999), 5).unwrap();

        assert_eq!(order.lines()[0].unit_price, Money::from_cents(1000));
        assert_eq!(order.lines()[0].product_name, "Widget A");
        assert_eq!(order.total_price(), Money::from_cents(1000));
    }

    #[test]
    fn idempotency_key_is_kept() {
        let key = IdempotencyKey::new("retry-1").unwrap();
        let placed = OrderPlaced::new(
            OrderId::new(),
            UserId::new(),
            vec![OrderLine::new(
                "SKU-A",
                "Widget A",
                Money::from_cents(1000),
                qty(1),
            )],
            ShippingAddress::parse("1 Main St").unwrap(),
            Utc::now(),
        )
        .unwrap()
        .with_idempotency_key(Some(key.clone()));

        let order = Order::place(placed);
        assert_eq!(order.idempotency_key(), Some(&key));
    }
}

mod status_lifecycle {
    use super::*;

    #[test]
    fn illegal_jump_leaves_order_untouched() {
        let products = catalog();
        let mut cart = Cart::new(UserId::new());
        cart.apply_events(cart.add_line(ProductId::new("SKU-A"), qty(1)).unwrap());
        let order = place_from_cart(&cart, &products);

        let err = order.transition(OrderStatus::Delivered, None).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
            }
        );
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.history().is_empty());
    }
}
