//! Single price-resolution step for a cart.
//!
//! Both the order total and the line item snapshots come from one [`Quote`],
//! so they cannot disagree.

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

use crate::cart::{Cart, CartLine};
use crate::models::Product;

/// Fractional digits kept for currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

impl Product {
    /// Price charged for one unit right now.
    ///
    /// A product flagged on sale without a sale price is charged its base price.
    pub fn effective_unit_price(&self) -> Decimal {
        match (self.on_sale, self.sale_price) {
            (true, Some(sale_price)) => sale_price,
            _ => self.price,
        }
    }
}

/// Largest amount an order total column holds (`NUMERIC(10, 2)`).
pub fn max_order_total() -> Decimal {
    Decimal::new(99_999_999_99, CURRENCY_SCALE)
}

pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("product {0} was not resolved before pricing")]
pub struct UnresolvedProduct(pub i64);

impl Quote {
    /// Prices every cart line against the given product snapshot, in cart order.
    pub fn price(cart: &Cart, products: &HashMap<i64, Product>) -> Result<Self, UnresolvedProduct> {
        let lines = cart
            .lines()
            .iter()
            .map(|line| price_line(line, products))
            .collect::<Result<Vec<_>, _>>()?;

        let total = round_currency(lines.iter().map(|line| line.line_total).sum());
        Ok(Self { lines, total })
    }

    pub fn exceeds_order_limit(&self) -> bool {
        self.total > max_order_total()
    }
}

fn price_line(line: &CartLine, products: &HashMap<i64, Product>) -> Result<PricedLine, UnresolvedProduct> {
    let product = products
        .get(&line.product_id)
        .ok_or(UnresolvedProduct(line.product_id))?;
    let unit_price = product.effective_unit_price();

    Ok(PricedLine {
        product_id: line.product_id,
        quantity: line.quantity,
        unit_price,
        line_total: unit_price * Decimal::from(line.quantity),
    })
}
