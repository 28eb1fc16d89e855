//! Line-oriented console front end for running the engine interactively.
//!
//! Each stdin line becomes one inbound event. A line may start with a chat id
//! and a colon (`7: ...`); without it everything lands in chat 1. The rest of
//! the line selects the event:
//!
//! ```text
//! /start                      text message (here: the restart trigger)
//! hello                       text message
//! @cart:add 3                 callback with token "cart:add" on message 3
//! @menu:order                 callback, message id 0
//! #optional caption           photo upload
//! %<payload>                  pre-checkout confirmation for <payload>
//! $525 <payload>              successful payment of 525 for <payload>
//! ```

use crate::domain::event::{
    CallbackQuery, ChatId, Contact, Event, MessageId, PaymentNotice, PhotoMessage,
    PreCheckoutQuery, TextMessage,
};
use crate::domain::ports::{Invoice, Keyboard, Transport};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Parses one console line into an event, or `None` for blank lines.
pub fn parse_line(line: &str, from: &Contact) -> Option<Event> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (chat, rest) = split_chat(trimmed);

    if let Some(rest) = rest.strip_prefix('@') {
        let (token, message) = match rest.split_once(' ') {
            Some((token, id)) => (token, id.trim().parse::<MessageId>().unwrap_or(0)),
            None => (rest, 0),
        };
        return Some(Event::Callback(CallbackQuery {
            id: next_query_id(),
            chat,
            from: from.clone(),
            message,
            token: token.to_string(),
        }));
    }
    if let Some(rest) = rest.strip_prefix('#') {
        let caption = rest.trim();
        return Some(Event::Photo(PhotoMessage {
            chat,
            largest: vec![0u8; 16],
            caption: (!caption.is_empty()).then(|| caption.to_string()),
        }));
    }
    if let Some(rest) = rest.strip_prefix('%') {
        return Some(Event::PreCheckout(PreCheckoutQuery {
            id: next_query_id(),
            chat,
            payload: rest.trim().to_string(),
            total_amount: 0,
        }));
    }
    if let Some(rest) = rest.strip_prefix('$') {
        let (amount, payload) = rest.split_once(' ')?;
        return Some(Event::SuccessfulPayment(PaymentNotice {
            chat,
            payload: payload.trim().to_string(),
            total_amount: amount.trim().parse().ok()?,
            provider_charge_id: Some(next_query_id()),
            telegram_charge_id: None,
        }));
    }
    Some(Event::Text(TextMessage {
        chat,
        from: Contact {
            user_id: chat,
            ..from.clone()
        },
        text: rest.to_string(),
    }))
}

fn split_chat(line: &str) -> (ChatId, &str) {
    if let Some((head, tail)) = line.split_once(':') {
        if let Ok(chat) = head.trim().parse::<ChatId>() {
            return (chat, tail.trim_start());
        }
    }
    (1, line)
}

fn next_query_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("q{}", COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
}

/// A transport that renders every outbound call to stdout, for the console
/// front end.
#[derive(Default)]
pub struct ConsoleTransport {
    next_message_id: AtomicI64,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> MessageId {
        self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn render_keyboard(keyboard: &Keyboard) -> String {
    keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| format!("[{} @{}]", b.label, b.token))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageId> {
        let id = self.allocate_id();
        println!("({chat}) #{id} {text}");
        if let Some(keyboard) = keyboard {
            println!("{}", render_keyboard(&keyboard));
        }
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        println!("({chat}) #{message} (edited) {text}");
        if let Some(keyboard) = keyboard {
            println!("{}", render_keyboard(&keyboard));
        }
        Ok(())
    }

    async fn send_invoice(&self, chat: ChatId, invoice: Invoice) -> Result<MessageId> {
        let id = self.allocate_id();
        println!(
            "({chat}) #{id} INVOICE {} | total {} {} | confirm with: %{}",
            invoice.title,
            invoice.total(),
            invoice.currency,
            invoice.payload
        );
        Ok(id)
    }

    async fn answer_callback(&self, query_id: &str, text: Option<String>) -> Result<()> {
        if let Some(text) = text {
            println!("(callback {query_id}) {text}");
        }
        Ok(())
    }

    async fn answer_precheckout(
        &self,
        query_id: &str,
        ok: bool,
        error: Option<String>,
    ) -> Result<()> {
        match (ok, error) {
            (true, _) => println!("(pre-checkout {query_id}) approved"),
            (false, reason) => println!(
                "(pre-checkout {query_id}) rejected: {}",
                reason.unwrap_or_default()
            ),
        }
        Ok(())
    }

    async fn send_document(&self, chat: ChatId, name: String, bytes: Vec<u8>) -> Result<()> {
        println!("({chat}) DOCUMENT {name} ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> Contact {
        Contact::new(1, "Console")
    }

    #[test]
    fn test_parse_text_and_chat_prefix() {
        let event = parse_line("/start", &contact()).unwrap();
        assert!(matches!(&event, Event::Text(m) if m.text == "/start" && m.chat == 1));

        let event = parse_line("7: hello", &contact()).unwrap();
        assert!(matches!(&event, Event::Text(m) if m.text == "hello" && m.chat == 7));
    }

    #[test]
    fn test_parse_callback_with_message_id() {
        let event = parse_line("@cart:add 3", &contact()).unwrap();
        match event {
            Event::Callback(q) => {
                assert_eq!(q.token, "cart:add");
                assert_eq!(q.message, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_payment_events() {
        let event = parse_line("%tok-1", &contact()).unwrap();
        assert!(matches!(&event, Event::PreCheckout(q) if q.payload == "tok-1"));

        let event = parse_line("$525 tok-1", &contact()).unwrap();
        match event {
            Event::SuccessfulPayment(n) => {
                assert_eq!(n.total_amount, 525);
                assert_eq!(n.payload, "tok-1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_blank_and_malformed_lines() {
        assert!(parse_line("   ", &contact()).is_none());
        assert!(parse_line("$notanumber tok", &contact()).is_none());
    }
}
