pub mod orders;
pub mod payment_methods;

pub use orders::OrderService;
pub use payment_methods::{AddPaymentMethodRequest, PaymentMethodService, UpdatePaymentMethodRequest};

use tracing::warn;

use crate::{TransactionError, UnitOfWorkSession};

/// Commits the session when the operation succeeded, rolls it back otherwise.
///
/// A failed rollback is only logged; the operation's own error is what the
/// caller sees.
pub(crate) async fn finish<S, T, E>(session: S, outcome: Result<T, E>) -> Result<T, E>
where
    S: UnitOfWorkSession,
    E: From<TransactionError>,
{
    match outcome {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = session.rollback().await {
                warn!(error = %rollback, "rollback after failed operation did not complete");
            }
            Err(err)
        }
    }
}
