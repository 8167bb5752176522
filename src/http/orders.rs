use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::auth::AuthenticatedUser;
use super::extract::JsonBody;
use super::response::{success, ApiError, Envelope};
use super::AppState;
use crate::cart::PlaceOrderRequest;
use crate::models::OrderAggregate;

#[derive(Debug, Serialize)]
pub struct OrderData {
    pub order: OrderAggregate,
}

#[derive(Debug, Serialize)]
pub struct OrdersData {
    pub orders: Vec<OrderAggregate>,
}

type Reply<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

/// POST /orders
pub async fn place_order(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Reply<OrderData> {
    let order = state
        .orders
        .place_order(user, &request)
        .await
        .map_err(|e| ApiError::from_order(e, "Error creating order"))?;

    Ok(success(
        StatusCode::CREATED,
        Some("Order created successfully"),
        OrderData { order },
    ))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    order_id: Result<Path<i64>, PathRejection>,
) -> Reply<OrderData> {
    // A non-numeric id names no order
    let Path(order_id) = order_id.map_err(|_| ApiError::NotFound("Order not found"))?;
    let order = state
        .orders
        .get_order(user, order_id)
        .await
        .map_err(|e| ApiError::from_order(e, "Error loading order"))?;

    Ok(success(StatusCode::OK, None, OrderData { order }))
}

/// GET /user/orders
pub async fn order_history(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Reply<OrdersData> {
    let orders = state
        .orders
        .list_orders(user)
        .await
        .map_err(|e| ApiError::from_order(e, "Error loading orders"))?;

    Ok(success(StatusCode::OK, None, OrdersData { orders }))
}
