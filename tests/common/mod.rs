use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tillbot::application::Services;
use tillbot::application::router::Router;
use tillbot::config::Config;
use tillbot::domain::event::{CallbackQuery, Contact, Event, MessageId, TextMessage};
use tillbot::domain::ports::ShopStore;
use tillbot::infrastructure::catalog::StaticCatalog;
use tillbot::infrastructure::in_memory::InMemoryStore;
use tillbot::infrastructure::transport::{Outbound, RecordingTransport};

pub fn default_config() -> Config {
    let raw = r#"{
        "language": { "enabled": ["en", "it"], "default": "en" },
        "payments": {
            "currency": "EUR",
            "currency_symbol": "€",
            "credit_card": {
                "enabled": true,
                "fee_percent": 5.0,
                "fee_fixed": 0,
                "min_amount": 100,
                "max_amount": 100000,
                "presets": [1000, 2500, 5000],
                "refill_on_checkout": true
            }
        },
        "session": { "timeout_secs": 1800 }
    }"#;
    serde_json::from_str(raw).expect("fixture config parses")
}

pub struct Harness {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub transport: Arc<RecordingTransport>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let services = Services {
            store: store.clone(),
            transport: transport.clone(),
            catalog: Arc::new(StaticCatalog::english()),
            config: Arc::new(config),
        };
        Self {
            router: Router::new(services),
            store,
            transport,
        }
    }

    pub async fn send_text(&mut self, chat: i64, text: &str) {
        let event = Event::Text(TextMessage {
            chat,
            from: Contact::new(chat, format!("user{chat}")),
            text: text.to_string(),
        });
        self.router.route(event).await.expect("route text");
    }

    pub async fn press(&mut self, chat: i64, token: &str, message: MessageId) {
        let event = Event::Callback(CallbackQuery {
            id: next_query_id(),
            chat,
            from: Contact::new(chat, format!("user{chat}")),
            message,
            token: token.to_string(),
        });
        self.router.route(event).await.expect("route callback");
    }

    /// Routes a pre-checkout confirmation, returning the router's verdict so
    /// tests can assert on rejected ones.
    pub async fn send_precheckout(
        &mut self,
        chat: i64,
        payload: &str,
        total_amount: i64,
    ) -> tillbot::error::Result<()> {
        let event = Event::PreCheckout(tillbot::domain::event::PreCheckoutQuery {
            id: next_query_id(),
            chat,
            payload: payload.to_string(),
            total_amount,
        });
        self.router.route(event).await
    }

    pub async fn send_payment(&mut self, chat: i64, payload: &str, total_amount: i64) {
        let event = Event::SuccessfulPayment(tillbot::domain::event::PaymentNotice {
            chat,
            payload: payload.to_string(),
            total_amount,
            provider_charge_id: Some("ch_test".to_string()),
            telegram_charge_id: None,
        });
        self.router.route(event).await.expect("route payment");
    }

    /// Waits until a sent message containing `needle` shows up in the
    /// journal, returning its text.
    pub async fn expect_message(&self, needle: &str) -> String {
        let outbound = self
            .wait_for_outbound(needle, |call| {
                matches!(call, Outbound::Message { text, .. } if text.contains(needle))
            })
            .await;
        match outbound {
            Outbound::Message { text, .. } => text,
            _ => unreachable!(),
        }
    }

    /// Waits for a sent message containing `needle` and returns its id, for
    /// pressing buttons attached to it.
    pub async fn message_id_of(&self, needle: &str) -> MessageId {
        let outbound = self
            .wait_for_outbound(needle, |call| {
                matches!(call, Outbound::Message { text, .. } if text.contains(needle))
            })
            .await;
        match outbound {
            Outbound::Message { id, .. } => id,
            _ => unreachable!(),
        }
    }

    /// Polls the transport journal until `pred` matches, or panics with the
    /// full journal after two seconds.
    pub async fn wait_for_outbound(
        &self,
        what: &str,
        pred: impl Fn(&Outbound) -> bool,
    ) -> Outbound {
        for _ in 0..200 {
            if let Some(found) = self.transport.calls().into_iter().find(|c| pred(c)) {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "no outbound call matching {what:?} within 2s; journal: {:#?}",
            self.transport.calls()
        );
    }

    /// Seeds a purchasable product and returns its assigned id.
    pub async fn seed_product(&self, name: &str, price: i64) -> u64 {
        let mut product = tillbot::domain::product::Product::new(0, name, format!("{name} desc"));
        product.price = Some(price);
        self.store
            .upsert_product(product)
            .await
            .expect("seed product")
            .id
    }
}

fn next_query_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("tq{}", COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
}
