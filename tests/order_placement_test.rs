mod common;

use std::sync::Arc;

use storefront_orders::models::UserId;
use storefront_orders::{CartLineRequest, OrderError, OrderService, PlaceOrderRequest};

use common::{
    cleanup_database, create_category, create_product, create_user, install_failing_stock_trigger,
    new_product, price, put_on_sale, set_price, setup_database, snapshot, stock_of, unit_of_work,
};

fn cart(lines: &[(i64, i64)]) -> PlaceOrderRequest {
    PlaceOrderRequest::new(
        lines
            .iter()
            .map(|&(product_id, quantity)| CartLineRequest::new(product_id, quantity))
            .collect(),
        None,
    )
}

async fn insert_payment_method(pool: &sqlx::PgPool, user: UserId) -> i64 {
    use sqlx::Row;
    sqlx::query("INSERT INTO payment_methods (user_id, kind) VALUES ($1, 'paypal') RETURNING id")
        .bind(user.0)
        .fetch_one(pool)
        .await
        .expect("Failed to create payment method")
        .get("id")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_order_at_base_price() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "buyer").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;

    let order = service
        .place_order(user, &cart(&[(mug.id, 2)]))
        .await
        .expect("Failed to place order");

    assert_eq!(order.order.user_id, user);
    assert_eq!(order.order.total, price("20.00"));
    assert_eq!(order.order_items.len(), 1);
    assert_eq!(order.order_items[0].item.quantity, 2);
    assert_eq!(order.order_items[0].item.unit_price, price("10.00"));
    assert_eq!(order.order_items[0].product.id, mug.id);
    assert_eq!(order.order_items[0].product.stock, 3);
    assert_eq!(stock_of(&pool, mug.id).await, 3);

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_order_at_sale_price() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "bargain_hunter").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;
    put_on_sale(&pool, mug.id, "7.50").await;

    let order = service
        .place_order(user, &cart(&[(mug.id, 2)]))
        .await
        .expect("Failed to place order");

    assert_eq!(order.order.total, price("15.00"));
    assert_eq!(order.order_items[0].item.unit_price, price("7.50"));
    assert_eq!(order.items_total(), order.order.total);

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_only_ordered_products_lose_stock() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "buyer").await;
    let category = create_category(&pool, "Office").await;
    let pen = create_product(&pool, new_product("Pen", category, "1.25", 100)).await;
    let pad = create_product(&pool, new_product("Notepad", category, "3.40", 10)).await;
    let lamp = create_product(&pool, new_product("Lamp", category, "25.00", 2)).await;

    let order = service
        .place_order(user, &cart(&[(pen.id, 4), (pad.id, 3), (pen.id, 1)]))
        .await
        .expect("Failed to place order");

    // 5 x 1.25 + 3 x 3.40
    assert_eq!(order.order.total, price("16.45"));
    assert_eq!(order.order_items.len(), 3);
    assert_eq!(stock_of(&pool, pen.id).await, 95);
    assert_eq!(stock_of(&pool, pad.id).await, 7);
    assert_eq!(stock_of(&pool, lamp.id).await, 2);

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_line_prices_are_snapshots() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "buyer").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;

    let placed = service
        .place_order(user, &cart(&[(mug.id, 1)]))
        .await
        .expect("Failed to place order");
    set_price(&pool, mug.id, "99.00").await;

    let reloaded = service
        .get_order(user, placed.id())
        .await
        .expect("Failed to load order");

    assert_eq!(reloaded.order.total, price("10.00"));
    assert_eq!(reloaded.order_items[0].item.unit_price, price("10.00"));
    assert_eq!(reloaded.order_items[0].product.price, price("99.00"));

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_invalid_carts_leave_no_trace() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "buyer").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;

    let before = snapshot(&pool).await;

    let invalid = [
        (cart(&[]), "items"),
        (cart(&[(mug.id, 0)]), "items.0.quantity"),
        (cart(&[(mug.id, -1)]), "items.0.quantity"),
        (cart(&[(mug.id, 1), (mug.id + 1000, 1)]), "items.1.product_id"),
        (cart(&[(mug.id, 6)]), "items.0.quantity"),
        (
            PlaceOrderRequest::new(vec![CartLineRequest::new(mug.id, 1)], Some(4242)),
            "payment_method_id",
        ),
    ];

    for (request, field) in invalid {
        // Same error both times, no side effects either time
        for _ in 0..2 {
            match service.place_order(user, &request).await {
                Err(OrderError::Validation(errors)) => {
                    assert!(errors.get(field).is_some(), "expected error on {field}: {errors:?}");
                }
                other => panic!("expected validation error on {field}, got {other:?}"),
            }
            assert_eq!(snapshot(&pool).await, before);
        }
    }

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_stock_is_summed_across_lines() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "buyer").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;

    let err = service
        .place_order(user, &cart(&[(mug.id, 3), (mug.id, 3)]))
        .await
        .expect_err("Cart exceeding stock should fail");
    assert!(matches!(err, OrderError::Validation(_)));
    assert_eq!(stock_of(&pool, mug.id).await, 5);

    service
        .place_order(user, &cart(&[(mug.id, 3), (mug.id, 2)]))
        .await
        .expect("Cart matching stock should succeed");
    assert_eq!(stock_of(&pool, mug.id).await, 0);

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_payment_method_must_belong_to_buyer() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let buyer = create_user(&pool, "buyer").await;
    let stranger = create_user(&pool, "stranger").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;

    let own = insert_payment_method(&pool, buyer).await;
    let foreign = insert_payment_method(&pool, stranger).await;

    let err = service
        .place_order(
            buyer,
            &PlaceOrderRequest::new(vec![CartLineRequest::new(mug.id, 1)], Some(foreign)),
        )
        .await
        .expect_err("Foreign payment method should be rejected");
    match err {
        OrderError::Validation(errors) => assert!(errors.get("payment_method_id").is_some()),
        other => panic!("unexpected error: {other:?}"),
    }

    let order = service
        .place_order(
            buyer,
            &PlaceOrderRequest::new(vec![CartLineRequest::new(mug.id, 1)], Some(own)),
        )
        .await
        .expect("Own payment method should be accepted");
    assert_eq!(order.order.payment_method_id, Some(own));

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_failure_mid_commit_rolls_everything_back() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "buyer").await;
    let category = create_category(&pool, "Lab").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;
    let volatile = create_product(&pool, new_product("volatile", category, "2.00", 5)).await;
    install_failing_stock_trigger(&pool).await;

    let before = snapshot(&pool).await;

    // The order and both items are written, the mug stock is decremented,
    // then the second decrement raises inside the database.
    let err = service
        .place_order(user, &cart(&[(mug.id, 1), (volatile.id, 1)]))
        .await
        .expect_err("Simulated failure should abort the order");

    match &err {
        OrderError::Commit(cause) => {
            assert!(cause.to_string().contains("simulated storage failure"), "{cause}")
        }
        other => panic!("expected commit failure, got {other:?}"),
    }
    assert_eq!(snapshot(&pool).await, before);

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_orders_are_private_to_their_owner() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let alice = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;

    let order = service
        .place_order(alice, &cart(&[(mug.id, 1)]))
        .await
        .expect("Failed to place order");

    let own = service
        .get_order(alice, order.id())
        .await
        .expect("Owner should see the order");
    assert_eq!(own, order);

    let foreign = service.get_order(bob, order.id()).await;
    assert!(matches!(foreign, Err(OrderError::NotOwned)));

    let missing = service.get_order(bob, order.id() + 1000).await;
    assert!(matches!(missing, Err(OrderError::NotFound)));

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_order_history_is_scoped_and_newest_first() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let alice = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 10)).await;

    let first = service
        .place_order(alice, &cart(&[(mug.id, 1)]))
        .await
        .expect("Failed to place first order");
    let second = service
        .place_order(alice, &cart(&[(mug.id, 2)]))
        .await
        .expect("Failed to place second order");
    service
        .place_order(bob, &cart(&[(mug.id, 1)]))
        .await
        .expect("Failed to place bob's order");

    let history = service.list_orders(alice).await.expect("Failed to list orders");
    let ids: Vec<i64> = history.iter().map(|o| o.id()).collect();
    assert_eq!(ids, vec![second.id(), first.id()]);
    assert!(history.iter().all(|o| o.order_items.len() == 1));

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial_test::serial]
async fn test_concurrent_orders_never_oversell() {
    let pool = setup_database().await;
    let service = Arc::new(OrderService::new(unit_of_work(&pool)));
    let category = create_category(&pool, "Kitchen").await;
    let mug = create_product(&pool, new_product("Mug", category, "10.00", 5)).await;

    let mut buyers = Vec::new();
    for i in 0..8 {
        buyers.push(create_user(&pool, &format!("buyer_{i}")).await);
    }

    let handles: Vec<_> = buyers
        .into_iter()
        .map(|buyer| {
            let service = service.clone();
            let request = cart(&[(mug.id, 2)]);
            tokio::spawn(async move { service.place_order(buyer, &request).await })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.await.expect("Order task panicked") {
            Ok(_) => placed += 1,
            Err(OrderError::Validation(errors)) => {
                assert!(errors.get("items.0.quantity").is_some(), "{errors:?}")
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let remaining = stock_of(&pool, mug.id).await;
    assert_eq!(placed, 2);
    assert_eq!(remaining, 1);
    assert_eq!(i64::from(5 - remaining), placed * 2);
    assert_eq!(snapshot(&pool).await.orders, placed);

    cleanup_database(pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
async fn test_total_beyond_capacity_is_rejected() {
    let pool = setup_database().await;
    let service = OrderService::new(unit_of_work(&pool));
    let user = create_user(&pool, "whale").await;
    let category = create_category(&pool, "Yachts").await;
    let yacht = create_product(&pool, new_product("Yacht", category, "50000000.00", 3)).await;
    let before = snapshot(&pool).await;

    let err = service
        .place_order(user, &cart(&[(yacht.id, 2)]))
        .await
        .expect_err("Total above the column limit should fail");
    match err {
        OrderError::Validation(errors) => assert!(errors.get("items").is_some(), "{errors:?}"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(snapshot(&pool).await, before);

    service
        .place_order(user, &cart(&[(yacht.id, 1)]))
        .await
        .expect("Total at the limit should be accepted");
    assert_eq!(stock_of(&pool, yacht.id).await, 2);

    cleanup_database(pool).await;
}
