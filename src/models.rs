//! Storage records and the order aggregate returned to callers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub on_sale: bool,
    pub stock: i32,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub on_sale: bool,
    pub stock: i32,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    pub user_id: UserId,
    pub total: Decimal,
    pub payment_method_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Capability check used by every read of a single order.
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }
}

/// Input for inserting an order header.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Decimal,
    pub payment_method_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A line item together with the product it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Product,
}

/// An order with its line items and their products.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAggregate {
    #[serde(flatten)]
    pub order: Order,
    pub order_items: Vec<OrderLine>,
}

impl OrderAggregate {
    pub fn id(&self) -> i64 {
        self.order.id
    }

    /// Sum of the snapshotted line prices.
    pub fn items_total(&self) -> Decimal {
        self.order_items
            .iter()
            .map(|line| line.item.unit_price * Decimal::from(line.item.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    CreditCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::CreditCard => "credit_card",
            PaymentMethodType::Paypal => "paypal",
            PaymentMethodType::BankTransfer => "bank_transfer",
        }
    }

    pub fn requires_card_details(&self) -> bool {
        matches!(self, PaymentMethodType::CreditCard)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment method type: {0}")]
pub struct UnknownPaymentMethodType(pub String);

impl FromStr for PaymentMethodType {
    type Err = UnknownPaymentMethodType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethodType::CreditCard),
            "paypal" => Ok(PaymentMethodType::Paypal),
            "bank_transfer" => Ok(PaymentMethodType::BankTransfer),
            other => Err(UnknownPaymentMethodType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: PaymentMethodType,
    pub card_number: Option<String>,
    pub card_holder_name: Option<String>,
    pub expiration_date: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a payment method.
#[derive(Debug, Clone)]
pub struct NewPaymentMethod {
    pub user_id: UserId,
    pub kind: PaymentMethodType,
    pub card_number: Option<String>,
    pub card_holder_name: Option<String>,
    pub expiration_date: Option<String>,
    pub is_default: bool,
}
