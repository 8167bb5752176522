//! Stored payment methods. Nothing here charges anything.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::finish;
use crate::error::{FieldErrors, PaymentMethodError};
use crate::models::{NewPaymentMethod, PaymentMethod, PaymentMethodType, UserId};
use crate::repositories::PaymentMethodRepository;
use crate::{TransactionResult, UnitOfWork, UnitOfWorkSession};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AddPaymentMethodRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    #[validate(length(max = 16, message = "The card number may not be greater than 16 characters."))]
    pub card_number: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255, message = "The card holder name may not be greater than 255 characters."))]
    pub card_holder_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 7, message = "The expiration date may not be greater than 7 characters."))]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddPaymentMethodRequest {
    pub fn validate_shape(&self, user: UserId) -> Result<NewPaymentMethod, FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Err(report) = self.validate() {
            errors.extend_from_validator("", &report);
        }

        let kind = match self.kind.as_deref() {
            None | Some("") => {
                errors.add("type", "The type field is required.");
                None
            }
            Some(raw) => match raw.parse::<PaymentMethodType>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    errors.add("type", "The selected type is invalid.");
                    None
                }
            },
        };

        if kind.is_some_and(|k| k.requires_card_details()) {
            require_card_details(
                &mut errors,
                &self.card_number,
                &self.card_holder_name,
                &self.expiration_date,
            );
        }

        errors.into_result()?;
        let kind = kind.ok_or_else(FieldErrors::new)?;

        Ok(NewPaymentMethod {
            user_id: user,
            kind,
            card_number: self.card_number.clone(),
            card_holder_name: self.card_holder_name.clone(),
            expiration_date: self.expiration_date.clone(),
            is_default: self.is_default,
        })
    }
}

/// Partial update of a stored method. Absent or null fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePaymentMethodRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    #[validate(length(max = 16, message = "The card number may not be greater than 16 characters."))]
    pub card_number: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255, message = "The card holder name may not be greater than 255 characters."))]
    pub card_holder_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 7, message = "The expiration date may not be greater than 7 characters."))]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

impl UpdatePaymentMethodRequest {
    /// Merges the provided fields into `current`.
    ///
    /// A method that ends up as a credit card must still carry every card field.
    pub fn apply_to(&self, mut current: PaymentMethod) -> Result<PaymentMethod, FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Err(report) = self.validate() {
            errors.extend_from_validator("", &report);
        }

        if let Some(raw) = self.kind.as_deref() {
            match raw.parse::<PaymentMethodType>() {
                Ok(kind) => current.kind = kind,
                Err(_) => errors.add("type", "The selected type is invalid."),
            }
        }
        if let Some(card_number) = &self.card_number {
            current.card_number = Some(card_number.clone());
        }
        if let Some(card_holder_name) = &self.card_holder_name {
            current.card_holder_name = Some(card_holder_name.clone());
        }
        if let Some(expiration_date) = &self.expiration_date {
            current.expiration_date = Some(expiration_date.clone());
        }
        if let Some(is_default) = self.is_default {
            current.is_default = is_default;
        }

        if errors.get("type").is_none() && current.kind.requires_card_details() {
            require_card_details(
                &mut errors,
                &current.card_number,
                &current.card_holder_name,
                &current.expiration_date,
            );
        }

        errors.into_result()?;
        Ok(current)
    }
}

fn require_card_details(
    errors: &mut FieldErrors,
    card_number: &Option<String>,
    card_holder_name: &Option<String>,
    expiration_date: &Option<String>,
) {
    for (field, value) in [
        ("card_number", card_number),
        ("card_holder_name", card_holder_name),
        ("expiration_date", expiration_date),
    ] {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            let label = field.replace('_', " ");
            errors.add(
                field,
                format!("The {label} field is required when type is credit_card."),
            );
        }
    }
}

pub struct PaymentMethodService<U> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> PaymentMethodService<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    /// Stores a new method. A default method takes the flag from the
    /// user's previous default in the same transaction.
    #[instrument(skip(self, request), fields(user_id = %user))]
    pub async fn add(
        &self,
        user: UserId,
        request: &AddPaymentMethodRequest,
    ) -> Result<PaymentMethod, PaymentMethodError> {
        let new_method = request.validate_shape(user)?;

        let session = self.uow.begin().await?;
        let methods = PaymentMethodRepository::new(session.executor().clone());

        let outcome: TransactionResult<PaymentMethod> = async {
            if new_method.is_default {
                methods.clear_default(user, None).await?;
            }
            methods.create(&new_method).await
        }
        .await;

        let method = finish(session, outcome.map_err(PaymentMethodError::from)).await?;
        info!(payment_method_id = method.id, kind = method.kind.as_str(), "payment method added");
        Ok(method)
    }

    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list(&self, user: UserId) -> Result<Vec<PaymentMethod>, PaymentMethodError> {
        let session = self.uow.begin().await?;
        let methods = PaymentMethodRepository::new(session.executor().clone());
        let outcome = methods.list_for_user(user).await.map_err(PaymentMethodError::from);
        finish(session, outcome).await
    }

    /// Changes a method of `user`. Making it the default takes the flag from
    /// the user's other methods in the same transaction.
    #[instrument(skip(self, request), fields(user_id = %user))]
    pub async fn update(
        &self,
        user: UserId,
        id: i64,
        request: &UpdatePaymentMethodRequest,
    ) -> Result<PaymentMethod, PaymentMethodError> {
        let session = self.uow.begin().await?;
        let methods = PaymentMethodRepository::new(session.executor().clone());

        let outcome: Result<PaymentMethod, PaymentMethodError> = async {
            let current = methods
                .find_owned(id, user)
                .await?
                .ok_or(PaymentMethodError::NotFound)?;
            let changed = request.apply_to(current)?;
            if request.is_default == Some(true) {
                methods.clear_default(user, Some(id)).await?;
            }
            methods
                .update_owned(&changed)
                .await?
                .ok_or(PaymentMethodError::NotFound)
        }
        .await;

        let method = finish(session, outcome).await?;
        info!(payment_method_id = method.id, is_default = method.is_default, "payment method updated");
        Ok(method)
    }

    /// Deletes a method of `user`. Orders that used it keep no reference.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn remove(&self, user: UserId, id: i64) -> Result<(), PaymentMethodError> {
        let session = self.uow.begin().await?;
        let methods = PaymentMethodRepository::new(session.executor().clone());

        let outcome = match methods.delete_owned(id, user).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(PaymentMethodError::NotFound),
            Err(err) => Err(err.into()),
        };

        finish(session, outcome).await?;
        info!(payment_method_id = id, "payment method removed");
        Ok(())
    }
}
