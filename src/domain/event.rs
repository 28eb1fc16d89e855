use std::fmt;

pub type ChatId = i64;
pub type MessageId = i64;

/// Identity attached to inbound messages; used for lazy user creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl Contact {
    pub fn new(user_id: i64, first_name: impl Into<String>) -> Self {
        Self {
            user_id,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            language_code: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextMessage {
    pub chat: ChatId,
    pub from: Contact,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct PhotoMessage {
    pub chat: ChatId,
    pub largest: Vec<u8>,
    pub caption: Option<String>,
}

/// An inline button press, carrying the token that names the transition.
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub chat: ChatId,
    pub from: Contact,
    pub message: MessageId,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub chat: ChatId,
    pub payload: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone)]
pub struct PaymentNotice {
    pub chat: ChatId,
    pub payload: String,
    pub total_amount: i64,
    pub provider_charge_id: Option<String>,
    pub telegram_charge_id: Option<String>,
}

/// A typed inbound transport event. The router resolves the chat identity
/// and forwards the event to that chat's worker inbox.
#[derive(Debug, Clone)]
pub enum Event {
    Text(TextMessage),
    Photo(PhotoMessage),
    Callback(CallbackQuery),
    PreCheckout(PreCheckoutQuery),
    SuccessfulPayment(PaymentNotice),
}

impl Event {
    pub fn chat(&self) -> ChatId {
        match self {
            Event::Text(m) => m.chat,
            Event::Photo(m) => m.chat,
            Event::Callback(q) => q.chat,
            Event::PreCheckout(q) => q.chat,
            Event::SuccessfulPayment(n) => n.chat,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Text(_) => "text",
            Event::Photo(_) => "photo",
            Event::Callback(_) => "callback",
            Event::PreCheckout(_) => "pre_checkout",
            Event::SuccessfulPayment(_) => "successful_payment",
        }
    }
}

/// Why a worker was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A restart trigger arrived and a fresh worker replaces this one.
    Restarted,
    /// The process is draining for shutdown.
    Shutdown,
    /// The inactivity bound elapsed with nothing in the inbox.
    Timeout,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Restarted => write!(f, "restarted"),
            StopReason::Shutdown => write!(f, "shutdown"),
            StopReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// What actually travels through a worker's inbox.
#[derive(Debug, Clone)]
pub enum Signal {
    Event(Event),
    /// The user pressed a cancel button. Only waits that opted in react.
    Cancel,
    Stop(StopReason),
}
