//! Request body extraction with field-level rejections.
//!
//! A body that does not deserialize is answered like any other validation
//! failure: a 422 whose `errors` map is keyed by the offending field path
//! (`items.0.quantity`). Bodies that cannot be read at all are blamed on the
//! payload's root field.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_path_to_error::{Path, Segment};

use super::response::ApiError;
use crate::cart::PlaceOrderRequest;
use crate::error::FieldErrors;
use crate::services::{AddPaymentMethodRequest, UpdatePaymentMethodRequest};

/// Payloads accepted through [`JsonBody`].
pub trait JsonPayload: DeserializeOwned {
    /// Field reported when the body is missing or is not JSON.
    const ROOT_FIELD: &'static str;
}

impl JsonPayload for PlaceOrderRequest {
    const ROOT_FIELD: &'static str = "items";
}

impl JsonPayload for AddPaymentMethodRequest {
    const ROOT_FIELD: &'static str = "type";
}

impl JsonPayload for UpdatePaymentMethodRequest {
    const ROOT_FIELD: &'static str = "type";
}

pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: JsonPayload + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| unreadable(T::ROOT_FIELD, &rejection))?;

        serde_path_to_error::deserialize(value)
            .map(JsonBody)
            .map_err(|err| {
                let field = field_key(err.path()).unwrap_or_else(|| T::ROOT_FIELD.to_string());
                let mut errors = FieldErrors::new();
                errors.add(
                    field.clone(),
                    format!("The {field} field is invalid: {}.", err.inner()),
                );
                ApiError::Validation(errors)
            })
    }
}

fn unreadable(root: &str, rejection: &JsonRejection) -> ApiError {
    let message = match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "The request body must be sent as application/json.".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "The request body is not valid JSON.".to_string(),
        _ => format!("The {root} field is required."),
    };
    let mut errors = FieldErrors::new();
    errors.add(root, message);
    ApiError::Validation(errors)
}

/// Dotted field key of a deserialization path; `None` at the document root.
fn field_key(path: &Path) -> Option<String> {
    let segments: Vec<String> = path
        .iter()
        .filter_map(|segment| match segment {
            Segment::Seq { index } => Some(index.to_string()),
            Segment::Map { key } => Some(key.clone()),
            Segment::Enum { variant } => Some(variant.clone()),
            Segment::Unknown => None,
        })
        .collect();

    (!segments.is_empty()).then(|| segments.join("."))
}
