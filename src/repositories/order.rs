use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;

use super::product::{product_from_row, PRODUCT_COLUMNS};
use crate::models::{NewOrder, Order, OrderAggregate, OrderItem, OrderLine, Product, UserId};
use crate::pricing::PricedLine;
use crate::{Executor, TransactionResult};

const ORDER_COLUMNS: &str = "id, user_id, total, payment_method_id, created_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, created_at";

fn order_from_row(r: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        id: r.try_get("id")?,
        user_id: UserId(r.try_get("user_id")?),
        total: r.try_get("total")?,
        payment_method_id: r.try_get("payment_method_id")?,
        created_at: r.try_get("created_at")?,
    })
}

fn item_from_row(r: &PgRow) -> Result<OrderItem, sqlx::Error> {
    Ok(OrderItem {
        id: r.try_get("id")?,
        order_id: r.try_get("order_id")?,
        product_id: r.try_get("product_id")?,
        quantity: r.try_get("quantity")?,
        unit_price: r.try_get("unit_price")?,
        created_at: r.try_get("created_at")?,
    })
}

/// Orders and their line items. There is no update or delete path.
pub struct OrderRepository {
    executor: Executor,
}

impl OrderRepository {
    pub fn new(executor: Executor) -> Arc<Self> {
        Arc::new(Self { executor })
    }

    pub async fn create(&self, order: &NewOrder) -> TransactionResult<Order> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "INSERT INTO orders (user_id, total, payment_method_id) VALUES ($1, $2, $3) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(order.user_id.0)
            .bind(order.total)
            .bind(order.payment_method_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(order_from_row(&row)?)
    }

    /// Snapshots one priced line under the given order.
    pub async fn add_item(&self, order_id: i64, line: &PricedLine) -> TransactionResult<OrderItem> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price) \
             VALUES ($1, $2, $3, $4) RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .fetch_one(&mut **tx)
            .await?;
        Ok(item_from_row(&row)?)
    }

    /// Looks an order up by id regardless of owner.
    pub async fn find_by_id(&self, id: i64) -> TransactionResult<Option<Order>> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.as_ref().map(order_from_row).transpose()?)
    }

    /// Orders of one user, newest first.
    pub async fn find_by_user(&self, user: UserId) -> TransactionResult<Vec<Order>> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user.0)
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Attaches line items and their products to each order, keeping order.
    pub async fn load_aggregates(&self, orders: Vec<Order>) -> TransactionResult<Vec<OrderAggregate>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, id"
        );
        let items: Vec<OrderItem> = sqlx::query(&sql)
            .bind(&order_ids)
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(item_from_row)
            .collect::<Result<_, _>>()?;

        let mut product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let products: HashMap<i64, Product> = sqlx::query(&sql)
            .bind(&product_ids)
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(|r| product_from_row(r).map(|p| (p.id, p)))
            .collect::<Result<_, _>>()?;

        let mut lines_by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        for item in items {
            // order_items.product_id is a foreign key, so the product row exists
            if let Some(product) = products.get(&item.product_id) {
                lines_by_order.entry(item.order_id).or_default().push(OrderLine {
                    product: product.clone(),
                    item,
                });
            }
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderAggregate {
                order_items: lines_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    pub async fn load_aggregate(&self, id: i64) -> TransactionResult<Option<OrderAggregate>> {
        let Some(order) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        Ok(self.load_aggregates(vec![order]).await?.pop())
    }

    pub async fn count(&self) -> TransactionResult<i64> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let row = sqlx::query("SELECT COUNT(*) AS count FROM orders")
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.try_get("count")?)
    }

    pub async fn count_items(&self) -> TransactionResult<i64> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let row = sqlx::query("SELECT COUNT(*) AS count FROM order_items")
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.try_get("count")?)
    }
}
