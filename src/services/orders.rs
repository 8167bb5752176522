//! Order placement and retrieval.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::finish;
use crate::cart::{Cart, PlaceOrderRequest};
use crate::error::{FieldErrors, OrderError, OrderResult};
use crate::models::{NewOrder, Order, OrderAggregate, OrderItem, OrderLine, Product, UserId};
use crate::pricing::{max_order_total, Quote};
use crate::repositories::{OrderRepository, PaymentMethodRepository, ProductRepository};
use crate::{UnitOfWork, UnitOfWorkSession};

pub struct OrderService<U> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> OrderService<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    /// Turns a cart into a committed order.
    ///
    /// Shape errors are reported before a transaction is opened. Referential
    /// and stock errors are found after the product rows are locked and
    /// before anything is written. Every write happens in one unit of work.
    #[instrument(skip(self, request), fields(user_id = %user, lines = request.items.len()))]
    pub async fn place_order(
        &self,
        user: UserId,
        request: &PlaceOrderRequest,
    ) -> OrderResult<OrderAggregate> {
        let cart = request.validate_shape().map_err(|errors| {
            debug!(%errors, "order request rejected before storage");
            OrderError::Validation(errors)
        })?;

        let session = self.uow.begin().await?;
        let products = ProductRepository::new(session.executor().clone());
        let orders = OrderRepository::new(session.executor().clone());
        let payment_methods = PaymentMethodRepository::new(session.executor().clone());
        session.register_transaction_aware(products.clone());

        let outcome = commit_pass(
            user,
            &cart,
            request.payment_method_id,
            &products,
            &orders,
            &payment_methods,
        )
        .await;

        match finish(session, outcome).await {
            Ok(aggregate) => {
                info!(order_id = aggregate.id(), total = %aggregate.order.total, "order placed");
                Ok(aggregate)
            }
            Err(OrderError::Validation(errors)) => {
                debug!(%errors, "order request rejected");
                Err(OrderError::Validation(errors))
            }
            Err(err) => {
                error!(error = %err, "order placement rolled back");
                Err(err)
            }
        }
    }

    /// Loads one order, only for its owner.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn get_order(&self, user: UserId, order_id: i64) -> OrderResult<OrderAggregate> {
        let session = self.uow.begin().await?;
        let orders = OrderRepository::new(session.executor().clone());

        let outcome: OrderResult<OrderAggregate> = async {
            let order = orders.find_by_id(order_id).await?.ok_or(OrderError::NotFound)?;
            authorize(&order, user)?;
            orders
                .load_aggregates(vec![order])
                .await?
                .pop()
                .ok_or(OrderError::NotFound)
        }
        .await;

        finish(session, outcome).await
    }

    /// Order history of one user, newest first.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list_orders(&self, user: UserId) -> OrderResult<Vec<OrderAggregate>> {
        let session = self.uow.begin().await?;
        let orders = OrderRepository::new(session.executor().clone());

        let outcome: OrderResult<Vec<OrderAggregate>> = async {
            let owned = orders.find_by_user(user).await?;
            Ok(orders.load_aggregates(owned).await?)
        }
        .await;

        finish(session, outcome).await
    }
}

/// Explicit ownership capability on a loaded order.
fn authorize(order: &Order, user: UserId) -> OrderResult<()> {
    if order.is_owned_by(user) {
        Ok(())
    } else {
        debug!(order_id = order.id, "order belongs to another user");
        Err(OrderError::NotOwned)
    }
}

async fn commit_pass(
    user: UserId,
    cart: &Cart,
    payment_method_id: Option<i64>,
    products: &ProductRepository,
    orders: &OrderRepository,
    payment_methods: &PaymentMethodRepository,
) -> OrderResult<OrderAggregate> {
    let mut locked = products.lock_for_order(&cart.product_ids()).await?;

    let mut errors = check_availability(cart, &locked);
    if let Some(id) = payment_method_id {
        if payment_methods.find_owned(id, user).await?.is_none() {
            errors.add(
                "payment_method_id",
                "The selected payment method id is invalid.",
            );
        }
    }
    errors.into_result()?;

    let quote = Quote::price(cart, &locked)?;
    if quote.exceeds_order_limit() {
        let mut errors = FieldErrors::new();
        errors.add(
            "items",
            format!("The order total may not be greater than {}.", max_order_total()),
        );
        return Err(errors.into());
    }

    let order = orders
        .create(&NewOrder {
            user_id: user,
            total: quote.total,
            payment_method_id,
        })
        .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(quote.lines.len());
    for line in &quote.lines {
        items.push(orders.add_item(order.id, line).await?);
    }

    for line in &quote.lines {
        let remaining = products.decrement_stock(line.product_id, line.quantity).await?;
        if let Some(product) = locked.get_mut(&line.product_id) {
            product.stock = remaining;
        }
    }

    Ok(assemble(order, items, &locked))
}

/// Reports unknown products and carts asking for more than is in stock.
///
/// Quantities for a product are summed across lines before comparing.
fn check_availability(cart: &Cart, products: &HashMap<i64, Product>) -> FieldErrors {
    let requested = cart.requested_quantities();
    let mut errors = FieldErrors::new();

    for (index, line) in cart.lines().iter().enumerate() {
        let Some(product) = products.get(&line.product_id) else {
            errors.add(
                format!("items.{index}.product_id"),
                format!("The selected items.{index}.product_id is invalid."),
            );
            continue;
        };

        let wanted = requested.get(&line.product_id).copied().unwrap_or(0);
        if wanted > i64::from(product.stock) {
            errors.add(
                format!("items.{index}.quantity"),
                format!(
                    "Only {} units of {} are available.",
                    product.stock, product.name
                ),
            );
        }
    }
    errors
}

fn assemble(order: Order, items: Vec<OrderItem>, products: &HashMap<i64, Product>) -> OrderAggregate {
    let order_items = items
        .into_iter()
        .filter_map(|item| {
            products.get(&item.product_id).map(|product| OrderLine {
                product: product.clone(),
                item,
            })
        })
        .collect();

    OrderAggregate { order, order_items }
}
