//! Storefront order placement.
//!
//! Carts become orders inside a single PostgreSQL unit of work: products are
//! locked and checked, priced once, and the order, its line items and the
//! stock decrements commit or roll back together.

pub mod cart;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod logging;
pub mod models;
pub mod pricing;
pub mod repositories;
pub mod services;
pub mod transaction_aware;
pub mod unit_of_work;

pub use cart::{Cart, CartLine, CartLineRequest, PlaceOrderRequest};
pub use error::{FieldErrors, OrderError, OrderResult, PaymentMethodError};
pub use executor::{Executor, TransactionGuard};
pub use pricing::{PricedLine, Quote};
pub use services::{
    AddPaymentMethodRequest, OrderService, PaymentMethodService, UpdatePaymentMethodRequest,
};
pub use transaction_aware::{TransactionAware, TransactionError, TransactionResult};
pub use unit_of_work::{PostgresUnitOfWork, PostgresUnitOfWorkSession, UnitOfWork, UnitOfWorkSession};
