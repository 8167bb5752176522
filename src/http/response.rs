//! Response envelopes and error mapping.
//!
//! Success bodies are `{status: "success", message?, <data>}`; failures are
//! `{status: "error", ...}` with the shape depending on the kind of failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::error::{FieldErrors, OrderError, PaymentMethodError};

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(flatten)]
    pub data: T,
}

/// Empty payload for responses that only carry a message.
#[derive(Debug, Serialize)]
pub struct NoData {}

pub fn success<T: Serialize>(
    code: StatusCode,
    message: Option<&'static str>,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (
        code,
        Json(Envelope {
            status: "success",
            message,
            data,
        }),
    )
}

#[derive(Debug)]
pub enum ApiError {
    Validation(FieldErrors),
    NotFound(&'static str),
    Unauthenticated,
    /// Storage failure; the cause is surfaced to the caller.
    Internal { message: &'static str, cause: String },
}

impl ApiError {
    /// Maps a service error; `failure` names the operation for 500 responses.
    pub fn from_order(err: OrderError, failure: &'static str) -> Self {
        match err {
            OrderError::Validation(errors) => ApiError::Validation(errors),
            OrderError::NotFound | OrderError::NotOwned => ApiError::NotFound("Order not found"),
            OrderError::Commit(cause) => ApiError::Internal {
                message: failure,
                cause: cause.to_string(),
            },
        }
    }

    pub fn from_payment_method(err: PaymentMethodError, failure: &'static str) -> Self {
        match err {
            PaymentMethodError::Validation(errors) => ApiError::Validation(errors),
            PaymentMethodError::NotFound => ApiError::NotFound("Payment method not found"),
            PaymentMethodError::Storage(cause) => ApiError::Internal {
                message: failure,
                cause: cause.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!({ "status": "error", "errors": errors }),
            ApiError::NotFound(message) => json!({ "status": "error", "message": message }),
            ApiError::Unauthenticated => json!({ "status": "error", "message": "Unauthenticated." }),
            ApiError::Internal { message, cause } => {
                error!(%cause, "{message}");
                json!({ "status": "error", "message": message, "error": cause })
            }
        };
        (status, Json(body)).into_response()
    }
}
