use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Executor, TransactionAware, TransactionError, TransactionResult};

/// Factory for transaction sessions.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Session: UnitOfWorkSession;

    /// Opens a transaction and wraps it in a fresh session.
    async fn begin(&self) -> TransactionResult<Self::Session>;
}

/// One database transaction shared by the repositories of a single operation.
///
/// Dropping a session without calling `commit` or `rollback` rolls the
/// transaction back when the connection returns to the pool.
#[async_trait]
pub trait UnitOfWorkSession: Send + Sync {
    /// Handle on the open transaction, cloned into each repository.
    fn executor(&self) -> &Executor;

    /// Adds a component to notify once the session commits or rolls back.
    fn register_transaction_aware(&self, observer: Arc<dyn TransactionAware>);

    /// Commits, then notifies every registered observer.
    async fn commit(self) -> TransactionResult<()>;

    /// Rolls back, then notifies every registered observer.
    async fn rollback(self) -> TransactionResult<()>;
}

/// [`UnitOfWork`] over a PostgreSQL connection pool.
pub struct PostgresUnitOfWork {
    pool: Arc<PgPool>,
}

impl PostgresUnitOfWork {
    /// Creates a unit of work drawing connections from `pool`.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// The underlying pool, for queries that need no transaction.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    type Session = PostgresUnitOfWorkSession;

    async fn begin(&self) -> TransactionResult<Self::Session> {
        let tx = self.pool.begin().await?;
        debug!("unit of work started");
        Ok(PostgresUnitOfWorkSession::new(tx))
    }
}

/// [`UnitOfWorkSession`] holding one PostgreSQL transaction.
pub struct PostgresUnitOfWorkSession {
    executor: Executor,
    observers: Arc<RwLock<Vec<Arc<dyn TransactionAware>>>>,
}

impl PostgresUnitOfWorkSession {
    /// Wraps an already started transaction.
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            executor: Executor::new(tx),
            observers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn observers(&self) -> Vec<Arc<dyn TransactionAware>> {
        self.observers.read().clone()
    }
}

#[async_trait]
impl UnitOfWorkSession for PostgresUnitOfWorkSession {
    fn executor(&self) -> &Executor {
        &self.executor
    }

    fn register_transaction_aware(&self, observer: Arc<dyn TransactionAware>) {
        self.observers.write().push(observer);
    }

    async fn commit(self) -> TransactionResult<()> {
        let tx = self.executor.take_transaction().await?;
        tx.commit().await.map_err(TransactionError::CommitFailed)?;
        debug!("unit of work committed");

        for observer in self.observers() {
            observer.on_commit().await?;
        }
        Ok(())
    }

    async fn rollback(self) -> TransactionResult<()> {
        let tx = self.executor.take_transaction().await?;
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "unit of work rollback failed");
            return Err(TransactionError::RollbackFailed(e));
        }
        debug!("unit of work rolled back");

        for observer in self.observers() {
            observer.on_rollback().await?;
        }
        Ok(())
    }
}
