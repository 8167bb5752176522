use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::{TransactionError, TransactionResult};

type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// Shared handle on the transaction of one unit of work.
///
/// Every repository taking part in an order placement holds a clone, so the
/// order insert, the line items and the stock decrements all run on the same
/// connection and commit together.
#[derive(Clone, Debug)]
pub struct Executor {
    tx: SharedTransaction,
}

impl Executor {
    /// Takes ownership of a started transaction.
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Locks the transaction for the duration of one repository call.
    ///
    /// The guard must be dropped before the next call on the same executor;
    /// the lock is not reentrant.
    pub async fn lock(&self) -> TransactionGuard<'_> {
        TransactionGuard {
            inner: self.tx.lock().await,
        }
    }

    /// Whether the session still owns its transaction.
    pub async fn is_open(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Takes the transaction out for commit or rollback.
    pub(crate) async fn take_transaction(&self) -> TransactionResult<Transaction<'static, Postgres>> {
        self.tx.lock().await.take().ok_or(TransactionError::SessionClosed)
    }
}

/// Exclusive access to the shared transaction, released on drop.
pub struct TransactionGuard<'a> {
    inner: MutexGuard<'a, Option<Transaction<'static, Postgres>>>,
}

impl TransactionGuard<'_> {
    /// The live transaction, or `SessionClosed` once it was committed or rolled back.
    pub fn transaction(&mut self) -> TransactionResult<&mut Transaction<'static, Postgres>> {
        self.inner.as_mut().ok_or(TransactionError::SessionClosed)
    }
}
