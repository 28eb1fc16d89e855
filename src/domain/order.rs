use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Shipped,
    Delivered,
    Refunded,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Open => "open",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Refunded => "refunded",
        };
        f.write_str(label)
    }
}

/// One (product, quantity) line belonging to exactly one order.
///
/// Checkout persists one row per purchased unit, so `quantity` is always 1
/// for rows it creates; the field exists because the row contract is
/// `quantity >= 1`, never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: u64,
    pub quantity: u32,
}

/// An order header with its owned item rows. Owns at most one transaction,
/// the purchase debit, linked by `transaction_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub notes: String,
    pub items: Vec<OrderItem>,
    pub transaction_id: Option<u64>,
}

/// Everything the store needs to commit a checkout atomically. Items are
/// already expanded one row per unit; `total` is the debit to record.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub user_id: i64,
    pub notes: String,
    pub items: Vec<OrderItem>,
    pub total: i64,
}
