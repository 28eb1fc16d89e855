use crate::application::Services;
use crate::application::worker::{Worker, WorkerHandle};
use crate::domain::event::{ChatId, Event, PreCheckoutQuery, Signal, StopReason, TextMessage};
use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::time::Duration;

const DRAIN_BOUND: Duration = Duration::from_secs(5);

/// Routes inbound events to per-chat workers.
///
/// The router never interprets a conversation; it only keeps the registry,
/// spawns and replaces workers on the restart trigger, maps the cancel
/// gesture to its signal, and rejects pre-checkout confirmations that do not
/// carry the chat's outstanding invoice token.
pub struct Router {
    services: Services,
    workers: HashMap<ChatId, WorkerHandle>,
}

impl Router {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            workers: HashMap::new(),
        }
    }

    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    pub async fn route(&mut self, event: Event) -> Result<()> {
        let chat = event.chat();
        let kind = event.kind();
        tracing::debug!(chat, kind, "routing inbound event");
        if let Err(err) = self.dispatch(event).await {
            tracing::error!(chat, kind, error = %err, "event dispatch failed");
            return Err(err);
        }
        Ok(())
    }

    async fn dispatch(&mut self, event: Event) -> Result<()> {
        self.workers.retain(|_, handle| !handle.is_finished());
        match event {
            Event::Text(message) if is_restart_trigger(&message.text) => {
                self.restart(message).await
            }
            Event::PreCheckout(query) => self.dispatch_precheckout(query).await,
            other => {
                let chat = other.chat();
                let signal = self.as_signal(other);
                let delivered = match self.workers.get(&chat) {
                    Some(handle) => handle.sender.send(signal).await.is_ok(),
                    None => false,
                };
                if !delivered {
                    self.workers.remove(&chat);
                    self.services
                        .transport
                        .send_message(chat, self.default_text("error_no_active_chat"), None)
                        .await?;
                }
                Ok(())
            }
        }
    }

    /// Stops any existing worker for the chat and spawns a fresh one. The
    /// replaced worker winds down silently; its greeting comes from the new
    /// one.
    async fn restart(&mut self, message: TextMessage) -> Result<()> {
        if let Some(handle) = self.workers.remove(&message.chat) {
            tracing::info!(chat = message.chat, "restart requested, replacing worker");
            let _ = handle
                .sender
                .send(Signal::Stop(StopReason::Restarted))
                .await;
            if tokio::time::timeout(DRAIN_BOUND, handle.join).await.is_err() {
                tracing::warn!(chat = message.chat, "replaced worker did not stop in time");
            }
        } else {
            tracing::info!(chat = message.chat, "starting worker");
        }
        let handle = Worker::spawn(self.services.clone(), message.chat, message.from);
        self.workers.insert(message.chat, handle);
        Ok(())
    }

    /// Pre-checkout confirmations are checked against the chat's outstanding
    /// invoice token before they ever reach the worker; anything stale or
    /// unknown is answered negatively here.
    async fn dispatch_precheckout(&mut self, query: PreCheckoutQuery) -> Result<()> {
        let accepted = match self.workers.get(&query.chat) {
            Some(handle) => {
                let expected = handle
                    .invoice_token
                    .lock()
                    .expect("invoice token poisoned")
                    .clone();
                expected.as_deref() == Some(query.payload.as_str())
            }
            None => false,
        };
        if !accepted {
            tracing::warn!(
                chat = query.chat,
                payload = %query.payload,
                "rejecting pre-checkout with no matching invoice"
            );
            self.services
                .transport
                .answer_precheckout(
                    &query.id,
                    false,
                    Some(self.default_text("error_invoice_expired")),
                )
                .await?;
            return Err(EngineError::PaymentMismatch(format!(
                "pre-checkout {:?} does not match the outstanding invoice of chat {}",
                query.payload, query.chat
            )));
        }
        if let Some(handle) = self.workers.get(&query.chat) {
            let _ = handle
                .sender
                .send(Signal::Event(Event::PreCheckout(query)))
                .await;
        }
        Ok(())
    }

    /// The cancel gesture arrives either as the dedicated callback token or
    /// as a text message matching the cancel button's caption.
    fn as_signal(&self, event: Event) -> Signal {
        let is_cancel = match &event {
            Event::Callback(query) => query.token == "cancel",
            Event::Text(message) => message.text.trim() == self.default_text("menu_cancel"),
            _ => false,
        };
        if is_cancel {
            Signal::Cancel
        } else {
            Signal::Event(event)
        }
    }

    fn default_text(&self, key: &str) -> String {
        self.services
            .catalog
            .text(&self.services.config.language.default, key, &[])
    }

    /// Stops every worker cooperatively and waits for each to finish its
    /// wind-down notice.
    pub async fn shutdown(&mut self) {
        tracing::info!(workers = self.workers.len(), "draining conversations");
        let handles: Vec<(ChatId, WorkerHandle)> = self.workers.drain().collect();
        for (_, handle) in &handles {
            let _ = handle.sender.send(Signal::Stop(StopReason::Shutdown)).await;
        }
        for (chat, handle) in handles {
            if tokio::time::timeout(DRAIN_BOUND, handle.join).await.is_err() {
                tracing::warn!(chat, "worker did not drain in time");
            }
        }
    }
}

fn is_restart_trigger(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed == "/start" || trimmed.starts_with("/start ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_trigger_shapes() {
        assert!(is_restart_trigger("/start"));
        assert!(is_restart_trigger("  /start  "));
        assert!(is_restart_trigger("/start deep-link"));
        assert!(!is_restart_trigger("/started"));
        assert!(!is_restart_trigger("start"));
    }
}
