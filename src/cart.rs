//! Inbound order request and its shape validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::error::FieldErrors;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "The items field is required."))]
    pub items: Vec<CartLineRequest>,
    #[serde(default)]
    pub payment_method_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct CartLineRequest {
    #[serde(default)]
    #[validate(required(message = "The product id field is required."))]
    pub product_id: Option<i64>,
    #[serde(default)]
    #[validate(
        required(message = "The quantity field is required."),
        range(min = 1, max = 2147483647, message = "The quantity must be at least 1.")
    )]
    pub quantity: Option<i64>,
}

impl CartLineRequest {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self {
            product_id: Some(product_id),
            quantity: Some(quantity),
        }
    }
}

impl PlaceOrderRequest {
    pub fn new(items: Vec<CartLineRequest>, payment_method_id: Option<i64>) -> Self {
        Self {
            items,
            payment_method_id,
        }
    }

    /// Checks the request shape without touching storage.
    pub fn validate_shape(&self) -> Result<Cart, FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Err(report) = self.validate() {
            errors.extend_from_validator("", &report);
        }

        let mut lines = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            if let Err(report) = item.validate() {
                errors.extend_from_validator(&format!("items.{index}."), &report);
                continue;
            }
            if let (Some(product_id), Some(quantity)) = (item.product_id, item.quantity) {
                // range validation bounds the quantity to i32
                if let Ok(quantity) = i32::try_from(quantity) {
                    lines.push(CartLine { product_id, quantity });
                }
            }
        }

        errors.into_result()?;
        Ok(Cart { lines })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// A non-empty cart whose lines all passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[cfg(test)]
    pub(crate) fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Distinct product ids in ascending order, the order rows are locked in.
    pub fn product_ids(&self) -> Vec<i64> {
        self.requested_quantities().into_keys().collect()
    }

    /// Total quantity requested per product across all lines.
    pub fn requested_quantities(&self) -> BTreeMap<i64, i64> {
        let mut totals = BTreeMap::new();
        for line in &self.lines {
            *totals.entry(line.product_id).or_insert(0i64) += i64::from(line.quantity);
        }
        totals
    }
}
