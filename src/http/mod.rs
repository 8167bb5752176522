//! HTTP surface: order placement, order reads and payment method bookkeeping.

pub mod auth;
pub mod extract;
pub mod orders;
pub mod payment_methods;
pub mod response;

use axum::{
    http::{header::InvalidHeaderName, HeaderName},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::{OrderService, PaymentMethodService};
use crate::PostgresUnitOfWork;

pub use auth::AuthenticatedUser;
pub use extract::{JsonBody, JsonPayload};
pub use response::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService<PostgresUnitOfWork>>,
    pub payment_methods: Arc<PaymentMethodService<PostgresUnitOfWork>>,
    /// Request header carrying the authenticated user id.
    pub user_header: HeaderName,
}

impl AppState {
    pub fn new(pool: PgPool, auth: &AuthConfig) -> Result<Self, InvalidHeaderName> {
        let uow = Arc::new(PostgresUnitOfWork::new(Arc::new(pool)));
        Ok(Self {
            orders: Arc::new(OrderService::new(uow.clone())),
            payment_methods: Arc::new(PaymentMethodService::new(uow)),
            user_header: HeaderName::try_from(auth.user_header.as_str())?,
        })
    }
}

/// Every route requires an authenticated user.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(orders::place_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/user/orders", get(orders::order_history))
        .route(
            "/user/payment-methods",
            get(payment_methods::list).post(payment_methods::add),
        )
        .route(
            "/user/payment-methods/{id}",
            put(payment_methods::update).delete(payment_methods::remove),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_user))
        .with_state(state)
}
