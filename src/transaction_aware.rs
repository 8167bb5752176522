use async_trait::async_trait;

/// Errors raised inside a unit of work: by the session itself or by the
/// repositories sharing its transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Transaction commit failed: {0}")]
    CommitFailed(#[source] sqlx::Error),

    #[error("Transaction rollback failed: {0}")]
    RollbackFailed(#[source] sqlx::Error),

    #[error("Transaction already finished")]
    SessionClosed,

    #[error("Stock for product {product_id} cannot cover {requested} more units")]
    StockConflict { product_id: i64, requested: i32 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

pub type TransactionResult<T> = Result<T, TransactionError>;

/// Components that hold state tied to the outcome of a unit of work.
///
/// Observers are notified only after the database has accepted the commit or
/// the rollback.
#[async_trait]
pub trait TransactionAware: Send + Sync {
    async fn on_commit(&self) -> TransactionResult<()>;

    async fn on_rollback(&self) -> TransactionResult<()>;
}
