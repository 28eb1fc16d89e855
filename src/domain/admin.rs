use serde::{Deserialize, Serialize};

/// A permission bundle keyed by user. Flags are independent and re-read
/// immediately before every privileged action, never cached across a
/// suspension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub user_id: i64,
    pub edit_products: bool,
    pub receive_orders: bool,
    pub create_transactions: bool,
    pub display_on_help: bool,
    pub is_owner: bool,
    /// Subscription to real-time order notifications.
    pub live_mode: bool,
}

impl Admin {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            edit_products: false,
            receive_orders: false,
            create_transactions: false,
            display_on_help: false,
            is_owner: false,
            live_mode: false,
        }
    }

    /// Full permissions, as granted to the first configured owner.
    pub fn owner(user_id: i64) -> Self {
        Self {
            user_id,
            edit_products: true,
            receive_orders: true,
            create_transactions: true,
            display_on_help: true,
            is_owner: true,
            live_mode: true,
        }
    }

    pub fn wants_live_orders(&self) -> bool {
        self.receive_orders && self.live_mode
    }
}
