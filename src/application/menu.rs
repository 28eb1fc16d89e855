use crate::error::{EngineError, Result};
use std::time::{Duration, Instant};

/// The finite set of conversation screens. Admin states are additionally
/// gated by permission flags at the point of entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Main,
    Order,
    OrderStatus,
    AddCredit,
    Language,
    Help,
    BotInfo,
    AdminProducts,
    AdminOrders,
    AdminTransactions,
    AdminRoster,
}

impl MenuState {
    /// Transition table: callback tokens to states.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "menu:order" => Some(MenuState::Order),
            "menu:order_status" => Some(MenuState::OrderStatus),
            "menu:add_credit" => Some(MenuState::AddCredit),
            "menu:language" => Some(MenuState::Language),
            "menu:help" => Some(MenuState::Help),
            "menu:bot_info" => Some(MenuState::BotInfo),
            "menu:back" => Some(MenuState::Main),
            "admin:products" => Some(MenuState::AdminProducts),
            "admin:orders" => Some(MenuState::AdminOrders),
            "admin:transactions" => Some(MenuState::AdminTransactions),
            "admin:roster" => Some(MenuState::AdminRoster),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            MenuState::AdminProducts
                | MenuState::AdminOrders
                | MenuState::AdminTransactions
                | MenuState::AdminRoster
        )
    }
}

/// Tracks the current screen and the session-activity clock. A session whose
/// clock exceeded the inactivity window is expired and must not silently
/// resume; the caller discards it and requires a fresh conversation start.
#[derive(Debug)]
pub struct MenuFlow {
    state: MenuState,
    previous: Option<MenuState>,
    last_activity: Instant,
    timeout: Duration,
}

impl MenuFlow {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: MenuState::Main,
            previous: None,
            last_activity: Instant::now(),
            timeout,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn is_expired(&self) -> bool {
        self.last_activity.elapsed() >= self.timeout
    }

    /// Refreshes the activity clock.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Applies a callback token. Unknown tokens are a `Validation` error and
    /// leave the state unchanged; a stale clock yields `SessionExpired`.
    pub fn transition(&mut self, token: &str) -> Result<MenuState> {
        if self.is_expired() {
            return Err(EngineError::SessionExpired);
        }
        let next = MenuState::from_token(token)
            .ok_or_else(|| EngineError::Validation(format!("unknown menu token {token:?}")))?;
        self.previous = Some(self.state);
        self.state = next;
        self.touch();
        Ok(next)
    }

    /// Returns to the screen the conversation came from, defaulting to Main.
    pub fn back(&mut self) -> MenuState {
        self.state = self.previous.take().unwrap_or(MenuState::Main);
        self.touch();
        self.state
    }
}
