use crate::application::Services;
use crate::application::cart::Cart;
use crate::application::menu::{MenuFlow, MenuState};
use crate::application::payment::{FeeSchedule, parse_amount, refill_invoice};
use crate::domain::admin::Admin;
use crate::domain::event::{
    CallbackQuery, ChatId, Contact, Event, MessageId, PaymentNotice, PhotoMessage,
    PreCheckoutQuery, Signal, StopReason,
};
use crate::domain::order::Order;
use crate::domain::ports::{Button, Keyboard};
use crate::domain::product::Product;
use crate::domain::transaction::ChargeIds;
use crate::domain::user::{User, format_price};
use crate::error::{EngineError, Result};
use regex::Regex;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Outcome of a typed wait that opted into cancellation.
#[derive(Debug, PartialEq, Eq)]
pub enum Wait<T> {
    Matched(T),
    Cancelled,
}

/// Whether a wait reacts to the user's cancel button. Non-cancellable waits
/// swallow the signal and keep waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellable {
    Yes,
    No,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TopUp {
    Paid,
    Cancelled,
}

/// What `next_signal` can yield; stop requests become errors before this.
enum Received {
    Event(Event),
    Cancel,
}

/// The router's grip on a live worker: its inbox, the shared outstanding
/// invoice token, and the join handle used to drain it.
pub struct WorkerHandle {
    pub sender: mpsc::Sender<Signal>,
    pub invoice_token: Arc<Mutex<Option<String>>>,
    pub join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// One chat's conversation engine.
///
/// The worker owns its inbox and consumes it only through the typed waits
/// below; those waits are the sole suspension points, so everything between
/// them runs to completion without interleaving. Non-matching events are
/// drained silently, which is what keeps a stray or duplicate event from
/// desynchronizing the conversation's position.
pub struct Worker {
    pub(crate) chat: ChatId,
    contact: Contact,
    inbox: mpsc::Receiver<Signal>,
    pub(crate) services: Services,
    pub(crate) lang: String,
    pub(crate) fees: FeeSchedule,
    menu: MenuFlow,
    invoice_token: Arc<Mutex<Option<String>>>,
}

impl Worker {
    pub fn new(
        services: Services,
        chat: ChatId,
        contact: Contact,
        inbox: mpsc::Receiver<Signal>,
    ) -> Self {
        let lang = services.config.language.default.clone();
        let fees = FeeSchedule::from_config(&services.config.payments.credit_card);
        let menu = MenuFlow::new(services.config.session_timeout());
        Self {
            chat,
            contact,
            inbox,
            services,
            lang,
            fees,
            menu,
            invoice_token: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawns the worker as its own task and returns the router's handle.
    pub fn spawn(services: Services, chat: ChatId, contact: Contact) -> WorkerHandle {
        let (sender, inbox) = mpsc::channel(32);
        let worker = Worker::new(services, chat, contact, inbox);
        let invoice_token = Arc::clone(&worker.invoice_token);
        let join = tokio::spawn(worker.run());
        WorkerHandle {
            sender,
            invoice_token,
            join,
        }
    }

    pub fn invoice_token_handle(&self) -> Arc<Mutex<Option<String>>> {
        Arc::clone(&self.invoice_token)
    }

    pub(crate) fn set_invoice_token(&self, token: Option<String>) {
        *self.invoice_token.lock().expect("invoice token poisoned") = token;
    }

    fn invoice_token_matches(&self, payload: &str) -> bool {
        self.invoice_token
            .lock()
            .expect("invoice token poisoned")
            .as_deref()
            == Some(payload)
    }

    /// Runs the conversation to completion, turning every wind-down path
    /// into the appropriate closing notice. Never panics the process: an
    /// engine-fatal error ends this chat only.
    pub async fn run(mut self) {
        tracing::debug!(chat = self.chat, "conversation started");
        let outcome = self.conversation().await;
        match outcome {
            Ok(()) => {}
            // The replacement worker greets immediately; stay silent.
            Err(EngineError::Stopped(StopReason::Restarted)) => {}
            Err(EngineError::Stopped(StopReason::Timeout)) | Err(EngineError::SessionExpired) => {
                self.notify(self.chat, self.t("conversation_expired", &[]))
                    .await;
            }
            Err(EngineError::Stopped(StopReason::Shutdown)) => {
                self.notify(self.chat, self.t("conversation_closed", &[]))
                    .await;
            }
            Err(err) => {
                tracing::error!(chat = self.chat, error = %err, "conversation failed");
                self.notify(self.chat, self.t("error_fatal", &[])).await;
            }
        }
        self.set_invoice_token(None);
        tracing::debug!(chat = self.chat, "conversation finished");
    }

    // ------------------------------------------------------------------
    // Wait primitives
    // ------------------------------------------------------------------

    /// Blocks on the inbox. Elapsing the inactivity bound synthesizes a stop
    /// with reason `Timeout`; explicit stop requests are honored here, at
    /// every suspension point. The session clock is refreshed only by input
    /// a wait accepts, so a stream of drained noise cannot keep a stale
    /// session alive past its window.
    async fn next_signal(&mut self) -> Result<Received> {
        let bound = self.services.config.session_timeout();
        let received = match tokio::time::timeout(bound, self.inbox.recv()).await {
            Ok(Some(Signal::Stop(reason))) => return Err(EngineError::Stopped(reason)),
            Ok(Some(Signal::Cancel)) => Received::Cancel,
            Ok(Some(Signal::Event(event))) => Received::Event(event),
            Ok(None) => return Err(EngineError::Stopped(StopReason::Shutdown)),
            Err(_) => return Err(EngineError::Stopped(StopReason::Timeout)),
        };
        if self.menu.is_expired() {
            return Err(EngineError::SessionExpired);
        }
        Ok(received)
    }

    /// Drains the inbox until `accept` matches an event, a stop arrives, or
    /// (for cancellable waits only) the user cancels. Accepted input
    /// refreshes the session clock; drained input does not.
    pub(crate) async fn wait_where<T>(
        &mut self,
        cancellable: Cancellable,
        mut accept: impl FnMut(Event) -> Option<T>,
    ) -> Result<Wait<T>> {
        loop {
            match self.next_signal().await? {
                Received::Cancel if cancellable == Cancellable::Yes => {
                    self.menu.touch();
                    return Ok(Wait::Cancelled);
                }
                Received::Cancel => {}
                Received::Event(event) => {
                    if let Some(value) = accept(event) {
                        self.menu.touch();
                        return Ok(Wait::Matched(value));
                    }
                }
            }
        }
    }

    pub async fn wait_for_message_in(
        &mut self,
        options: &[&str],
        cancellable: Cancellable,
    ) -> Result<Wait<String>> {
        let options: Vec<String> = options.iter().map(|s| s.to_string()).collect();
        self.wait_where(cancellable, move |event| match event {
            Event::Text(message) => {
                let text = message.text.trim().to_string();
                options.contains(&text).then_some(text)
            }
            _ => None,
        })
        .await
    }

    pub async fn wait_for_text(&mut self, cancellable: Cancellable) -> Result<Wait<String>> {
        self.wait_where(cancellable, |event| match event {
            Event::Text(message) => Some(message.text.trim().to_string()),
            _ => None,
        })
        .await
    }

    /// Waits for a text message matching `pattern`; yields the first capture
    /// group when present, the whole match otherwise.
    pub async fn wait_for_regex(
        &mut self,
        pattern: &Regex,
        cancellable: Cancellable,
    ) -> Result<Wait<String>> {
        let pattern = pattern.clone();
        self.wait_where(cancellable, move |event| match event {
            Event::Text(message) => pattern.captures(message.text.trim()).map(|captures| {
                captures
                    .get(1)
                    .or_else(|| captures.get(0))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            }),
            _ => None,
        })
        .await
    }

    pub async fn wait_for_photo(&mut self, cancellable: Cancellable) -> Result<Wait<PhotoMessage>> {
        self.wait_where(cancellable, |event| match event {
            Event::Photo(photo) => Some(photo),
            _ => None,
        })
        .await
    }

    /// A photo, or `None` when the user presses the skip button.
    pub async fn wait_for_photo_or_skip(
        &mut self,
        cancellable: Cancellable,
    ) -> Result<Wait<Option<PhotoMessage>>> {
        self.wait_where(cancellable, |event| match event {
            Event::Photo(photo) => Some(Some(photo)),
            Event::Callback(query) if query.token == "prompt:skip" => Some(None),
            _ => None,
        })
        .await
    }

    pub async fn wait_for_callback(
        &mut self,
        cancellable: Cancellable,
    ) -> Result<Wait<CallbackQuery>> {
        self.wait_where(cancellable, |event| match event {
            Event::Callback(query) => Some(query),
            _ => None,
        })
        .await
    }

    /// Waits for the pre-checkout confirmation of the outstanding invoice.
    /// Confirmations carrying any other token are answered negatively in
    /// place and the wait continues; they are never accepted.
    pub async fn wait_for_precheckout(&mut self) -> Result<Wait<PreCheckoutQuery>> {
        loop {
            match self.next_signal().await? {
                Received::Cancel => {
                    self.menu.touch();
                    return Ok(Wait::Cancelled);
                }
                Received::Event(Event::PreCheckout(query)) => {
                    if self.invoice_token_matches(&query.payload) {
                        self.menu.touch();
                        return Ok(Wait::Matched(query));
                    }
                    tracing::warn!(
                        chat = self.chat,
                        payload = %query.payload,
                        "pre-checkout token mismatch"
                    );
                    self.services
                        .transport
                        .answer_precheckout(
                            &query.id,
                            false,
                            Some(self.t("error_invoice_expired", &[])),
                        )
                        .await?;
                }
                Received::Event(_) => {}
            }
        }
    }

    /// Waits for the payment confirmation. Cancellation is swallowed: an
    /// in-flight payment is never abandoned by a cancel press.
    pub async fn wait_for_successful_payment(&mut self) -> Result<PaymentNotice> {
        loop {
            match self.next_signal().await? {
                Received::Cancel => {}
                Received::Event(Event::SuccessfulPayment(notice)) => {
                    if !self.invoice_token_matches(&notice.payload) {
                        tracing::warn!(
                            chat = self.chat,
                            payload = %notice.payload,
                            "ignoring payment notice for an unknown invoice"
                        );
                        continue;
                    }
                    self.menu.touch();
                    return Ok(notice);
                }
                Received::Event(_) => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Conversation flows
    // ------------------------------------------------------------------

    async fn conversation(&mut self) -> Result<()> {
        let default_language = self.services.config.language.default.clone();
        let mut user = self
            .services
            .store
            .ensure_user(&self.contact, &default_language)
            .await?;
        self.lang = self
            .services
            .config
            .language_or_default(Some(&user.language))
            .to_string();

        loop {
            if let Some(fresh) = self.services.store.find_user(user.id).await? {
                user = fresh;
            }
            let admin = self.services.store.find_admin(user.id).await?;
            let keyboard = self.main_menu_keyboard(admin.as_ref());
            self.services
                .transport
                .send_message(
                    self.chat,
                    self.t(
                        "conversation_open_user_menu",
                        &[("credit", self.price(user.credit))],
                    ),
                    Some(keyboard),
                )
                .await?;

            let Wait::Matched(query) = self.wait_for_callback(Cancellable::No).await? else {
                continue;
            };
            let state = match self.menu.transition(&query.token) {
                Ok(state) => state,
                Err(err) if !err.is_fatal() => {
                    self.answer(&query, Some(self.t("error_invalid_option", &[])))
                        .await;
                    continue;
                }
                Err(err) => return Err(err),
            };
            self.answer(&query, None).await;

            match state {
                MenuState::Main => {}
                MenuState::Order => self.order_flow(&mut user).await?,
                MenuState::OrderStatus => self.order_status_flow(&user).await?,
                MenuState::AddCredit => self.add_credit_flow(&mut user).await?,
                MenuState::Language => self.language_flow(&mut user).await?,
                MenuState::Help => self.help_flow().await?,
                MenuState::BotInfo => {
                    self.say("bot_info", &[]).await?;
                }
                MenuState::AdminProducts => self.admin_products_flow(&user).await?,
                MenuState::AdminOrders => self.admin_orders_flow(&user).await?,
                MenuState::AdminTransactions => self.admin_transactions_flow(&user).await?,
                MenuState::AdminRoster => self.admin_roster_flow(&user).await?,
            }
            self.menu.back();
        }
    }

    fn main_menu_keyboard(&self, admin: Option<&Admin>) -> Keyboard {
        let mut rows = vec![
            vec![
                Button::new(self.t("menu_order", &[]), "menu:order"),
                Button::new(self.t("menu_order_status", &[]), "menu:order_status"),
            ],
            vec![
                Button::new(self.t("menu_add_credit", &[]), "menu:add_credit"),
                Button::new(self.t("menu_language", &[]), "menu:language"),
            ],
            vec![
                Button::new(self.t("menu_help", &[]), "menu:help"),
                Button::new(self.t("menu_bot_info", &[]), "menu:bot_info"),
            ],
        ];
        if let Some(admin) = admin {
            let mut admin_row = Vec::new();
            if admin.edit_products {
                admin_row.push(Button::new(self.t("menu_admin_products", &[]), "admin:products"));
            }
            if admin.receive_orders {
                admin_row.push(Button::new(self.t("menu_admin_orders", &[]), "admin:orders"));
            }
            if admin.create_transactions {
                admin_row.push(Button::new(
                    self.t("menu_admin_transactions", &[]),
                    "admin:transactions",
                ));
            }
            if admin.is_owner {
                admin_row.push(Button::new(self.t("menu_admin_roster", &[]), "admin:roster"));
            }
            if !admin_row.is_empty() {
                rows.push(admin_row);
            }
        }
        rows
    }

    async fn order_flow(&mut self, user: &mut User) -> Result<()> {
        let products = self.services.store.list_products(false).await?;
        let mut cart = Cart::new();
        self.say("order_started", &[]).await?;
        for product in products.into_iter().filter(Product::purchasable) {
            let text = self.product_text(&product, 0);
            let message = self
                .services
                .transport
                .send_message(self.chat, text, Some(self.cart_line_keyboard()))
                .await?;
            cart.register(message, product);
        }
        let summary = self
            .services
            .transport
            .send_message(
                self.chat,
                self.t("order_cart_empty", &[]),
                Some(self.cart_summary_keyboard()),
            )
            .await?;

        loop {
            let query = match self.wait_for_callback(Cancellable::Yes).await? {
                Wait::Cancelled => {
                    self.say("order_cancelled", &[]).await?;
                    return Ok(());
                }
                Wait::Matched(query) => query,
            };
            match query.token.as_str() {
                "cart:add" => {
                    if cart.add(query.message).is_some() {
                        self.refresh_cart_line(&cart, query.message).await?;
                        self.refresh_cart_summary(&cart, summary).await?;
                    }
                    self.answer(&query, None).await;
                }
                "cart:remove" => {
                    if cart.remove(query.message).is_some() {
                        self.refresh_cart_line(&cart, query.message).await?;
                        self.refresh_cart_summary(&cart, summary).await?;
                    }
                    self.answer(&query, None).await;
                }
                "cart:done" => {
                    if cart.is_empty() {
                        self.answer(&query, Some(self.t("order_cart_empty", &[])))
                            .await;
                        continue;
                    }
                    self.answer(&query, None).await;
                    return self.checkout(user, cart).await;
                }
                _ => {
                    self.answer(&query, Some(self.t("error_invalid_option", &[])))
                        .await;
                }
            }
        }
    }

    /// The atomic end of the order flow. Any failure before the store commit
    /// leaves the ledger untouched; the commit itself is all-or-nothing.
    async fn checkout(&mut self, user: &mut User, cart: Cart) -> Result<()> {
        let total = cart.total();
        let credit = self.services.store.credit_of(user.id).await?;
        let shortfall = total - credit;
        if shortfall > 0 {
            let cc = self.services.config.payments.credit_card.clone();
            if cc.enabled
                && cc.refill_on_checkout
                && (cc.min_amount..=cc.max_amount).contains(&shortfall)
            {
                // Top up exactly the shortfall; the commit below re-checks
                // the balance either way.
                self.card_top_up(user, shortfall).await?;
            }
        }

        let draft = cart.into_draft(user.id, String::new());
        match self.services.store.commit_checkout(draft).await {
            Ok((order, credit)) => {
                user.credit = credit;
                self.say(
                    "order_confirmed",
                    &[
                        ("order_id", order.id.to_string()),
                        ("total", self.price(total)),
                        ("credit", self.price(credit)),
                    ],
                )
                .await?;
                self.fan_out_order(&order, user, total).await;
                Ok(())
            }
            Err(EngineError::InsufficientCredit { shortfall }) => {
                self.say(
                    "order_insufficient_credit",
                    &[("shortfall", self.price(shortfall))],
                )
                .await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Notifies every admin subscribed to live order delivery. Transport
    /// failures are logged and never unwind the committed order.
    async fn fan_out_order(&self, order: &Order, buyer: &User, total: i64) {
        if !self.services.config.orders.live_notifications {
            return;
        }
        let admins = match self.services.store.list_admins().await {
            Ok(admins) => admins,
            Err(err) => {
                tracing::error!(error = %err, "could not load admin roster for order fan-out");
                return;
            }
        };
        for admin in admins.iter().filter(|a| a.wants_live_orders()) {
            let text = self.t(
                "order_live_notification",
                &[
                    ("order_id", order.id.to_string()),
                    ("user", buyer.display_name()),
                    ("total", self.price(total)),
                ],
            );
            self.notify(admin.user_id, text).await;
        }
    }

    async fn order_status_flow(&mut self, user: &User) -> Result<()> {
        let orders = self.services.store.orders_for_user(user.id).await?;
        if orders.is_empty() {
            self.say("order_status_empty", &[]).await?;
            return Ok(());
        }
        let transactions = self.services.store.list_transactions().await?;
        let lines: Vec<String> = orders
            .iter()
            .map(|order| {
                let total = order
                    .transaction_id
                    .and_then(|id| transactions.iter().find(|tx| tx.id == id))
                    .map(|tx| -tx.value)
                    .unwrap_or(0);
                self.t(
                    "order_status_line",
                    &[
                        ("order_id", order.id.to_string()),
                        ("status", order.status.to_string()),
                        ("total", self.price(total)),
                    ],
                )
            })
            .collect();
        self.services
            .transport
            .send_message(self.chat, lines.join("\n"), None)
            .await?;
        Ok(())
    }

    async fn add_credit_flow(&mut self, user: &mut User) -> Result<()> {
        let cc = self.services.config.payments.credit_card.clone();
        if !cc.enabled {
            self.say("error_invalid_option", &[]).await?;
            return Ok(());
        }
        let mut keyboard: Keyboard = cc
            .presets
            .iter()
            .map(|amount| vec![Button::new(self.price(*amount), format!("credit:{amount}"))])
            .collect();
        keyboard.push(vec![Button::new(self.t("menu_cancel", &[]), "cancel")]);
        self.services
            .transport
            .send_message(self.chat, self.t("add_credit_prompt", &[]), Some(keyboard))
            .await?;

        enum Pick {
            Preset(CallbackQuery),
            Typed(String),
        }
        loop {
            let wait = self
                .wait_where(Cancellable::Yes, |event| match event {
                    Event::Callback(query) if query.token.starts_with("credit:") => {
                        Some(Pick::Preset(query))
                    }
                    Event::Text(message) => Some(Pick::Typed(message.text)),
                    _ => None,
                })
                .await?;
            let amount = match wait {
                Wait::Cancelled => {
                    self.say("payment_cancelled", &[]).await?;
                    return Ok(());
                }
                Wait::Matched(Pick::Preset(query)) => {
                    self.answer(&query, None).await;
                    query
                        .token
                        .strip_prefix("credit:")
                        .and_then(|raw| raw.parse::<i64>().ok())
                }
                Wait::Matched(Pick::Typed(text)) => parse_amount(&text).ok(),
            };
            match amount {
                Some(amount) if (cc.min_amount..=cc.max_amount).contains(&amount) => {
                    self.card_top_up(user, amount).await?;
                    return Ok(());
                }
                _ => {
                    self.say(
                        "error_invalid_amount",
                        &[
                            ("min", self.price(cc.min_amount)),
                            ("max", self.price(cc.max_amount)),
                        ],
                    )
                    .await?;
                }
            }
        }
    }

    /// Issues an invoice for `amount`, correlates the confirmation by token,
    /// and commits the *confirmed* charged amount, which is authoritative
    /// even when it diverges from the request.
    pub(crate) async fn card_top_up(&mut self, user: &mut User, amount: i64) -> Result<TopUp> {
        let fee = self.fees.fee(amount);
        let token = Uuid::new_v4().simple().to_string();
        self.set_invoice_token(Some(token.clone()));

        let invoice = refill_invoice(
            self.t("payment_invoice_title", &[]),
            self.t(
                "payment_invoice_description",
                &[("amount", self.price(amount))],
            ),
            token,
            self.services.config.payments.currency.clone(),
            self.t("payment_base_label", &[]),
            amount,
            self.t("payment_fee_label", &[]),
            fee,
        );
        self.services
            .transport
            .send_invoice(self.chat, invoice)
            .await?;

        let query = match self.wait_for_precheckout().await? {
            Wait::Cancelled => {
                self.set_invoice_token(None);
                self.say("payment_cancelled", &[]).await?;
                return Ok(TopUp::Cancelled);
            }
            Wait::Matched(query) => query,
        };
        self.services
            .transport
            .answer_precheckout(&query.id, true, None)
            .await?;

        let notice = self.wait_for_successful_payment().await?;
        let charges = ChargeIds {
            provider: Some("card".to_string()),
            provider_charge_id: notice.provider_charge_id,
            telegram_charge_id: notice.telegram_charge_id,
        };
        let credit = self
            .services
            .store
            .commit_payment(user.id, notice.total_amount, charges)
            .await?;
        user.credit = credit;
        self.set_invoice_token(None);
        self.say("payment_success", &[("credit", self.price(credit))])
            .await?;
        Ok(TopUp::Paid)
    }

    async fn language_flow(&mut self, user: &mut User) -> Result<()> {
        let enabled = self.services.config.language.enabled.clone();
        let mut keyboard: Keyboard = enabled
            .iter()
            .map(|lang| vec![Button::new(lang.clone(), format!("lang:{lang}"))])
            .collect();
        keyboard.push(vec![Button::new(self.t("menu_cancel", &[]), "cancel")]);
        self.services
            .transport
            .send_message(self.chat, self.t("language_prompt", &[]), Some(keyboard))
            .await?;

        loop {
            let query = match self.wait_for_callback(Cancellable::Yes).await? {
                Wait::Cancelled => return Ok(()),
                Wait::Matched(query) => query,
            };
            let Some(picked) = query.token.strip_prefix("lang:") else {
                self.answer(&query, Some(self.t("error_invalid_option", &[])))
                    .await;
                continue;
            };
            if !enabled.iter().any(|lang| lang == picked) {
                self.answer(&query, Some(self.t("error_invalid_option", &[])))
                    .await;
                continue;
            }
            self.answer(&query, None).await;
            user.language = picked.to_string();
            self.services.store.update_user(user.clone()).await?;
            self.lang = picked.to_string();
            self.say("language_set", &[("language", picked.to_string())])
                .await?;
            return Ok(());
        }
    }

    async fn help_flow(&mut self) -> Result<()> {
        let admins = self.services.store.list_admins().await?;
        let mut contacts = Vec::new();
        for admin in admins.iter().filter(|a| a.display_on_help) {
            if let Some(user) = self.services.store.find_user(admin.user_id).await? {
                contacts.push(user.display_name());
            }
        }
        if contacts.is_empty() {
            self.say("help_no_contacts", &[]).await?;
        } else {
            self.say("help_text", &[("contacts", contacts.join("\n"))])
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Small helpers shared with the admin branch
    // ------------------------------------------------------------------

    pub(crate) fn t(&self, key: &str, params: &[(&str, String)]) -> String {
        self.services.catalog.text(&self.lang, key, params)
    }

    pub(crate) fn price(&self, value: i64) -> String {
        format_price(value, &self.services.config.payments.currency_symbol)
    }

    pub(crate) async fn say(&self, key: &str, params: &[(&str, String)]) -> Result<MessageId> {
        self.services
            .transport
            .send_message(self.chat, self.t(key, params), None)
            .await
    }

    /// Best-effort outbound message: transport failures are logged and the
    /// conversation continues.
    pub(crate) async fn notify(&self, chat: ChatId, text: String) {
        if let Err(err) = self
            .services
            .transport
            .send_message(chat, text, None)
            .await
        {
            tracing::warn!(chat, error = %err, "outbound notification failed");
        }
    }

    pub(crate) async fn answer(&self, query: &CallbackQuery, text: Option<String>) {
        if let Err(err) = self
            .services
            .transport
            .answer_callback(&query.id, text)
            .await
        {
            tracing::warn!(chat = self.chat, error = %err, "callback answer failed");
        }
    }

    /// Re-reads the Admin row and checks one flag; called immediately before
    /// every privileged action, never cached across a suspension point.
    pub(crate) async fn require_permission(
        &self,
        user_id: i64,
        allowed: fn(&Admin) -> bool,
    ) -> Result<Admin> {
        match self.services.store.find_admin(user_id).await? {
            Some(admin) if allowed(&admin) => Ok(admin),
            _ => Err(EngineError::Validation("permission denied".to_string())),
        }
    }

    pub(crate) fn cancel_keyboard(&self) -> Keyboard {
        vec![vec![Button::new(self.t("menu_cancel", &[]), "cancel")]]
    }

    pub(crate) fn skip_or_cancel_keyboard(&self) -> Keyboard {
        vec![
            vec![Button::new(self.t("menu_skip", &[]), "prompt:skip")],
            vec![Button::new(self.t("menu_cancel", &[]), "cancel")],
        ]
    }

    fn cart_line_keyboard(&self) -> Keyboard {
        vec![vec![
            Button::new(self.t("menu_add", &[]), "cart:add"),
            Button::new(self.t("menu_remove", &[]), "cart:remove"),
        ]]
    }

    fn cart_summary_keyboard(&self) -> Keyboard {
        vec![vec![
            Button::new(self.t("menu_done", &[]), "cart:done"),
            Button::new(self.t("menu_cancel", &[]), "cancel"),
        ]]
    }

    fn product_text(&self, product: &Product, quantity: u32) -> String {
        let price = self.price(product.price.unwrap_or(0));
        if quantity == 0 {
            self.t(
                "order_product_line",
                &[
                    ("name", product.name.clone()),
                    ("description", product.description.clone()),
                    ("price", price),
                ],
            )
        } else {
            self.t(
                "order_product_in_cart",
                &[
                    ("name", product.name.clone()),
                    ("description", product.description.clone()),
                    ("price", price),
                    ("quantity", quantity.to_string()),
                ],
            )
        }
    }

    async fn refresh_cart_line(&self, cart: &Cart, message: MessageId) -> Result<()> {
        let Some(line) = cart.line(message) else {
            return Ok(());
        };
        let text = self.product_text(&line.product, line.quantity);
        self.services
            .transport
            .edit_message(self.chat, message, text, Some(self.cart_line_keyboard()))
            .await
    }

    async fn refresh_cart_summary(&self, cart: &Cart, message: MessageId) -> Result<()> {
        let text = if cart.is_empty() {
            self.t("order_cart_empty", &[])
        } else {
            let items: Vec<String> = cart
                .selection()
                .iter()
                .map(|line| format!("{}× {}", line.quantity, line.product.name))
                .collect();
            self.t(
                "order_cart_summary",
                &[
                    ("items", items.join("\n")),
                    ("total", self.price(cart.total())),
                ],
            )
        };
        self.services
            .transport
            .edit_message(self.chat, message, text, Some(self.cart_summary_keyboard()))
            .await
    }
}
