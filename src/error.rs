use serde::Serialize;
use std::collections::BTreeMap;

use crate::pricing::UnresolvedProduct;
use crate::TransactionError;

/// Per-field validation messages, keyed by request path (`items.0.quantity`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Copies the field-level failures of a `validator` report, prefixing
    /// each field name.
    pub fn extend_from_validator(&mut self, prefix: &str, errors: &validator::ValidationErrors) {
        for (field, failures) in errors.field_errors() {
            let key = format!("{prefix}{field}");
            for failure in failures.iter() {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("The {key} field is invalid ({}).", failure.code));
                self.add(key.clone(), message);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Err(self)` when any field failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("The given data was invalid: {0}")]
    Validation(FieldErrors),

    #[error("Order not found")]
    NotFound,

    /// The order exists but belongs to another user. Callers must report it
    /// exactly like `NotFound`.
    #[error("Order not found")]
    NotOwned,

    #[error("Error creating order: {0}")]
    Commit(#[from] TransactionError),
}

impl From<FieldErrors> for OrderError {
    fn from(errors: FieldErrors) -> Self {
        OrderError::Validation(errors)
    }
}

impl From<UnresolvedProduct> for OrderError {
    fn from(err: UnresolvedProduct) -> Self {
        let mut errors = FieldErrors::new();
        errors.add("items", err.to_string());
        OrderError::Validation(errors)
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

#[derive(Debug, thiserror::Error)]
pub enum PaymentMethodError {
    #[error("The given data was invalid: {0}")]
    Validation(FieldErrors),

    #[error("Payment method not found")]
    NotFound,

    #[error("Payment method storage failed: {0}")]
    Storage(#[from] TransactionError),
}

impl From<FieldErrors> for PaymentMethodError {
    fn from(errors: FieldErrors) -> Self {
        PaymentMethodError::Validation(errors)
    }
}
