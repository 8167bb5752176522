use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::auth::AuthenticatedUser;
use super::extract::JsonBody;
use super::response::{success, ApiError, Envelope, NoData};
use super::AppState;
use crate::models::PaymentMethod;
use crate::services::{AddPaymentMethodRequest, UpdatePaymentMethodRequest};

#[derive(Debug, Serialize)]
pub struct PaymentMethodData {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct PaymentMethodsData {
    pub payment_methods: Vec<PaymentMethod>,
}

type Reply<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

fn method_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Payment method not found"))
}

/// GET /user/payment-methods
pub async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Reply<PaymentMethodsData> {
    let payment_methods = state
        .payment_methods
        .list(user)
        .await
        .map_err(|e| ApiError::from_payment_method(e, "Error loading payment methods"))?;

    Ok(success(StatusCode::OK, None, PaymentMethodsData { payment_methods }))
}

/// POST /user/payment-methods
pub async fn add(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(request): JsonBody<AddPaymentMethodRequest>,
) -> Reply<PaymentMethodData> {
    let payment_method = state
        .payment_methods
        .add(user, &request)
        .await
        .map_err(|e| ApiError::from_payment_method(e, "Error adding payment method"))?;

    Ok(success(
        StatusCode::CREATED,
        Some("Payment method added successfully"),
        PaymentMethodData { payment_method },
    ))
}

/// PUT /user/payment-methods/{id}
pub async fn update(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    id: Result<Path<i64>, PathRejection>,
    JsonBody(request): JsonBody<UpdatePaymentMethodRequest>,
) -> Reply<PaymentMethodData> {
    let id = method_id(id)?;
    let payment_method = state
        .payment_methods
        .update(user, id, &request)
        .await
        .map_err(|e| ApiError::from_payment_method(e, "Error updating payment method"))?;

    Ok(success(
        StatusCode::OK,
        Some("Payment method updated successfully"),
        PaymentMethodData { payment_method },
    ))
}

/// DELETE /user/payment-methods/{id}
pub async fn remove(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    id: Result<Path<i64>, PathRejection>,
) -> Reply<NoData> {
    let id = method_id(id)?;
    state
        .payment_methods
        .remove(user, id)
        .await
        .map_err(|e| ApiError::from_payment_method(e, "Error deleting payment method"))?;

    Ok(success(
        StatusCode::OK,
        Some("Payment method deleted successfully"),
        NoData {},
    ))
}
