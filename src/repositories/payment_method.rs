use sqlx::postgres::PgRow;
use sqlx::Row;
use std::sync::Arc;

use crate::models::{NewPaymentMethod, PaymentMethod, PaymentMethodType, UserId};
use crate::{Executor, TransactionResult};

const PAYMENT_METHOD_COLUMNS: &str =
    "id, user_id, kind, card_number, card_holder_name, expiration_date, is_default, created_at";

fn payment_method_from_row(r: &PgRow) -> Result<PaymentMethod, sqlx::Error> {
    let kind: String = r.try_get("kind")?;
    let kind = kind
        .parse::<PaymentMethodType>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(PaymentMethod {
        id: r.try_get("id")?,
        user_id: UserId(r.try_get("user_id")?),
        kind,
        card_number: r.try_get("card_number")?,
        card_holder_name: r.try_get("card_holder_name")?,
        expiration_date: r.try_get("expiration_date")?,
        is_default: r.try_get("is_default")?,
        created_at: r.try_get("created_at")?,
    })
}

/// Stored payment methods. Lookups are always scoped to the owning user.
pub struct PaymentMethodRepository {
    executor: Executor,
}

impl PaymentMethodRepository {
    pub fn new(executor: Executor) -> Arc<Self> {
        Arc::new(Self { executor })
    }

    pub async fn create(&self, method: &NewPaymentMethod) -> TransactionResult<PaymentMethod> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "INSERT INTO payment_methods \
             (user_id, kind, card_number, card_holder_name, expiration_date, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PAYMENT_METHOD_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(method.user_id.0)
            .bind(method.kind.as_str())
            .bind(&method.card_number)
            .bind(&method.card_holder_name)
            .bind(&method.expiration_date)
            .bind(method.is_default)
            .fetch_one(&mut **tx)
            .await?;
        Ok(payment_method_from_row(&row)?)
    }

    /// Clears the default flag on the methods of `user`, skipping `except`;
    /// returns how many changed.
    pub async fn clear_default(&self, user: UserId, except: Option<i64>) -> TransactionResult<u64> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let result = sqlx::query(
            "UPDATE payment_methods SET is_default = FALSE \
             WHERE user_id = $1 AND is_default AND ($2::BIGINT IS NULL OR id <> $2)",
        )
        .bind(user.0)
        .bind(except)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Rewrites the mutable fields of `method`, matched by id and owner.
    pub async fn update_owned(&self, method: &PaymentMethod) -> TransactionResult<Option<PaymentMethod>> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "UPDATE payment_methods SET kind = $3, card_number = $4, card_holder_name = $5, \
             expiration_date = $6, is_default = $7 \
             WHERE id = $1 AND user_id = $2 RETURNING {PAYMENT_METHOD_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(method.id)
            .bind(method.user_id.0)
            .bind(method.kind.as_str())
            .bind(&method.card_number)
            .bind(&method.card_holder_name)
            .bind(&method.expiration_date)
            .bind(method.is_default)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.as_ref().map(payment_method_from_row).transpose()?)
    }

    pub async fn find_owned(&self, id: i64, user: UserId) -> TransactionResult<Option<PaymentMethod>> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "SELECT {PAYMENT_METHOD_COLUMNS} FROM payment_methods WHERE id = $1 AND user_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user.0)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.as_ref().map(payment_method_from_row).transpose()?)
    }

    /// Methods of `user`, the default one first.
    pub async fn list_for_user(&self, user: UserId) -> TransactionResult<Vec<PaymentMethod>> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let sql = format!(
            "SELECT {PAYMENT_METHOD_COLUMNS} FROM payment_methods WHERE user_id = $1 \
             ORDER BY is_default DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(user.0)
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows
            .iter()
            .map(payment_method_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Deletes a method owned by `user`; `false` when there was none.
    pub async fn delete_owned(&self, id: i64, user: UserId) -> TransactionResult<bool> {
        let mut guard = self.executor.lock().await;
        let tx = guard.transaction()?;
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.0)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
