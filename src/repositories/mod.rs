//! Transaction-scoped data access.
//!
//! Every repository is built from the [`Executor`](crate::Executor) of one
//! unit of work, so whatever it reads or writes commits or rolls back with
//! the rest of that session.

pub mod order;
pub mod payment_method;
pub mod product;

pub use order::OrderRepository;
pub use payment_method::PaymentMethodRepository;
pub use product::{ProductRepository, StockMovement};
