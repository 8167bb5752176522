use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{NewProduct, Product};
use crate::{Executor, TransactionAware, TransactionError, TransactionResult};

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, name, description, price, sale_price, on_sale, stock, category_id, created_at";

pub(crate) fn product_from_row(r: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        price: r.try_get("price")?,
        sale_price: r.try_get("sale_price")?,
        on_sale: r.try_get("on_sale")?,
        stock: r.try_get("stock")?,
        category_id: r.try_get("category_id")?,
        created_at: r.try_get("created_at")?,
    })
}

/// A stock decrement applied inside a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    pub product_id: i64,
    pub quantity: i32,
    pub remaining: i32,
}

/// Product lookups and stock mutation.
///
/// Stock decrements are journaled until the session finishes: they become
/// `committed_movements` on commit and are discarded on rollback.
pub struct ProductRepository {
    executor: Executor,
    pending: RwLock<Vec<StockMovement>>,
    committed: RwLock<Vec<StockMovement>>,
}

impl ProductRepository {
    pub fn new(executor: Executor) -> Arc<Self> {
        Arc::new(Self {
            executor,
            pending: RwLock::new(Vec::new()),
            committed: RwLock::new(Vec::new()),
        })
    }

    pub async fn create(&self, product: &NewProduct) -> TransactionResult<Product> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "INSERT INTO products (name, description, price, sale_price, on_sale, stock, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.sale_price)
            .bind(product.on_sale)
            .bind(product.stock)
            .bind(product.category_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(product_from_row(&row)?)
    }

    pub async fn find_by_id(&self, id: i64) -> TransactionResult<Option<Product>> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.as_ref().map(product_from_row).transpose()?)
    }

    /// Reads the given products and row-locks them until the session ends.
    ///
    /// Rows are locked in id order so concurrent carts sharing products
    /// cannot deadlock each other. Missing ids are simply absent from the map.
    pub async fn lock_for_order(&self, ids: &[i64]) -> TransactionResult<HashMap<i64, Product>> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&mut **tx)
            .await?;

        let products: HashMap<i64, Product> = rows
            .iter()
            .map(|r| product_from_row(r).map(|p| (p.id, p)))
            .collect::<Result<_, _>>()?;
        debug!(requested = ids.len(), locked = products.len(), "product rows locked");
        Ok(products)
    }

    /// Relative decrement that refuses to take stock below zero.
    ///
    /// Returns the remaining stock, or `StockConflict` when the row is gone
    /// or holds fewer than `quantity` units.
    pub async fn decrement_stock(&self, product_id: i64, quantity: i32) -> TransactionResult<i32> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let row = sqlx::query(
            "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock",
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut **tx)
        .await?;

        let remaining: i32 = row
            .ok_or(TransactionError::StockConflict {
                product_id,
                requested: quantity,
            })?
            .try_get("stock")?;

        self.pending.write().push(StockMovement {
            product_id,
            quantity,
            remaining,
        });
        Ok(remaining)
    }

    pub fn committed_movements(&self) -> Vec<StockMovement> {
        self.committed.read().clone()
    }

    pub fn pending_movements(&self) -> Vec<StockMovement> {
        self.pending.read().clone()
    }
}

#[async_trait]
impl TransactionAware for ProductRepository {
    async fn on_commit(&self) -> TransactionResult<()> {
        let movements: Vec<StockMovement> = self.pending.write().drain(..).collect();
        for movement in &movements {
            info!(
                product_id = movement.product_id,
                quantity = movement.quantity,
                remaining = movement.remaining,
                "stock decremented"
            );
        }
        self.committed.write().extend(movements);
        Ok(())
    }

    async fn on_rollback(&self) -> TransactionResult<()> {
        let discarded = {
            let mut pending = self.pending.write();
            let count = pending.len();
            pending.clear();
            count
        };
        if discarded > 0 {
            debug!(discarded, "stock movements discarded by rollback");
        }
        Ok(())
    }
}
