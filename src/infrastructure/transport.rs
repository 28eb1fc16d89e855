use crate::domain::event::{ChatId, MessageId};
use crate::domain::ports::{Invoice, Keyboard, Transport};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Journal entry for one outbound transport call.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message {
        id: MessageId,
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat: ChatId,
        message: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Invoice {
        id: MessageId,
        chat: ChatId,
        invoice: Invoice,
    },
    CallbackAnswer {
        query_id: String,
        text: Option<String>,
    },
    PrecheckoutAnswer {
        query_id: String,
        ok: bool,
        error: Option<String>,
    },
    Document {
        chat: ChatId,
        name: String,
        bytes: Vec<u8>,
    },
}

/// A transport that records every outbound call and hands out sequential
/// message ids. Used by the test harness and anywhere a real transport is
/// not wired up.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Outbound>>,
    next_message_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Outbound> {
        self.calls.lock().expect("transport journal poisoned").clone()
    }

    pub fn take_calls(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.calls.lock().expect("transport journal poisoned"))
    }

    fn record(&self, call: Outbound) {
        self.calls
            .lock()
            .expect("transport journal poisoned")
            .push(call);
    }

    fn allocate_id(&self) -> MessageId {
        self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageId> {
        let id = self.allocate_id();
        self.record(Outbound::Message {
            id,
            chat,
            text,
            keyboard,
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.record(Outbound::Edit {
            chat,
            message,
            text,
            keyboard,
        });
        Ok(())
    }

    async fn send_invoice(&self, chat: ChatId, invoice: Invoice) -> Result<MessageId> {
        let id = self.allocate_id();
        self.record(Outbound::Invoice { id, chat, invoice });
        Ok(id)
    }

    async fn answer_callback(&self, query_id: &str, text: Option<String>) -> Result<()> {
        self.record(Outbound::CallbackAnswer {
            query_id: query_id.to_string(),
            text,
        });
        Ok(())
    }

    async fn answer_precheckout(
        &self,
        query_id: &str,
        ok: bool,
        error: Option<String>,
    ) -> Result<()> {
        self.record(Outbound::PrecheckoutAnswer {
            query_id: query_id.to_string(),
            ok,
            error,
        });
        Ok(())
    }

    async fn send_document(&self, chat: ChatId, name: String, bytes: Vec<u8>) -> Result<()> {
        self.record(Outbound::Document { chat, name, bytes });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_message_ids() {
        let transport = RecordingTransport::new();
        let a = transport.send_message(1, "a".into(), None).await.unwrap();
        let b = transport.send_message(1, "b".into(), None).await.unwrap();
        assert_eq!(b, a + 1);
        assert_eq!(transport.calls().len(), 2);

        let drained = transport.take_calls();
        assert_eq!(drained.len(), 2);
        assert!(transport.calls().is_empty());
    }
}
