//! Privileged conversation flows. Every flow re-reads the caller's Admin row
//! and checks the relevant flag again immediately before each privileged
//! write, so a permission revoked mid-conversation takes effect at once.

use crate::application::payment::parse_signed_amount;
use crate::application::worker::{Cancellable, Wait, Worker};
use crate::domain::admin::Admin;
use crate::domain::event::Event;
use crate::domain::ports::{Button, Keyboard};
use crate::domain::product::Product;
use crate::domain::user::User;
use crate::error::{EngineError, Result};
use crate::interfaces::csv::transaction_export::export_transactions;
use regex::Regex;
use std::sync::LazyLock;

static USER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,16})$").expect("valid pattern"));

impl Worker {
    pub(crate) async fn admin_products_flow(&mut self, user: &User) -> Result<()> {
        if self.require_permission(user.id, |a| a.edit_products).await.is_err() {
            self.say("error_permission_denied", &[]).await?;
            return Ok(());
        }
        loop {
            let products = self.services.store.list_products(false).await?;
            let mut keyboard: Keyboard = products
                .iter()
                .map(|p| vec![Button::new(p.name.clone(), format!("prod:{}", p.id))])
                .collect();
            keyboard.push(vec![Button::new(
                self.t("admin_product_new", &[]),
                "prod:new",
            )]);
            keyboard.push(vec![Button::new(self.t("menu_cancel", &[]), "cancel")]);
            self.services
                .transport
                .send_message(
                    self.chat,
                    self.t("admin_products_prompt", &[]),
                    Some(keyboard),
                )
                .await?;

            let query = match self.wait_for_callback(Cancellable::Yes).await? {
                Wait::Cancelled => return Ok(()),
                Wait::Matched(query) => query,
            };
            self.answer(&query, None).await;
            if query.token == "prod:new" {
                self.edit_product_flow(user, Product::new(0, "", "")).await?;
                continue;
            }
            let picked = query
                .token
                .strip_prefix("prod:")
                .and_then(|raw| raw.parse::<u64>().ok());
            let product = match picked {
                Some(id) => self.services.store.find_product(id).await?,
                None => None,
            };
            let Some(product) = product else {
                self.say("error_invalid_option", &[]).await?;
                continue;
            };
            self.product_detail_flow(user, product).await?;
        }
    }

    async fn product_detail_flow(&mut self, user: &User, product: Product) -> Result<()> {
        let keyboard = vec![
            vec![
                Button::new(self.t("admin_product_edit", &[]), "prod:edit"),
                Button::new(self.t("admin_product_delete", &[]), "prod:delete"),
            ],
            vec![Button::new(self.t("menu_cancel", &[]), "cancel")],
        ];
        let text = format!(
            "{}\n{}\n{}",
            product.name,
            product.description,
            product.price.map(|p| self.price(p)).unwrap_or_default()
        );
        self.services
            .transport
            .send_message(self.chat, text, Some(keyboard))
            .await?;

        let query = match self.wait_for_callback(Cancellable::Yes).await? {
            Wait::Cancelled => return Ok(()),
            Wait::Matched(query) => query,
        };
        self.answer(&query, None).await;
        match query.token.as_str() {
            "prod:edit" => self.edit_product_flow(user, product).await,
            "prod:delete" => {
                if self.require_permission(user.id, |a| a.edit_products).await.is_err() {
                    self.say("error_permission_denied", &[]).await?;
                    return Ok(());
                }
                let mut product = product;
                product.deleted = true;
                let name = product.name.clone();
                self.services.store.upsert_product(product).await?;
                self.say("admin_product_deleted", &[("name", name)]).await?;
                Ok(())
            }
            _ => {
                self.say("error_invalid_option", &[]).await?;
                Ok(())
            }
        }
    }

    /// Asks for name, description, price (skippable) and image (skippable),
    /// then persists. Any cancel along the way discards all edits.
    async fn edit_product_flow(&mut self, user: &User, mut product: Product) -> Result<()> {
        self.services
            .transport
            .send_message(
                self.chat,
                self.t("admin_ask_product_name", &[]),
                Some(self.cancel_keyboard()),
            )
            .await?;
        product.name = match self.wait_for_text(Cancellable::Yes).await? {
            Wait::Cancelled => return Ok(()),
            Wait::Matched(name) => name,
        };

        self.services
            .transport
            .send_message(
                self.chat,
                self.t("admin_ask_product_description", &[]),
                Some(self.cancel_keyboard()),
            )
            .await?;
        product.description = match self.wait_for_text(Cancellable::Yes).await? {
            Wait::Cancelled => return Ok(()),
            Wait::Matched(description) => description,
        };

        self.services
            .transport
            .send_message(
                self.chat,
                self.t("admin_ask_product_price", &[]),
                Some(self.skip_or_cancel_keyboard()),
            )
            .await?;
        product.price = loop {
            let wait = self
                .wait_where(Cancellable::Yes, |event| match event {
                    Event::Text(message) => Some(Some(message.text)),
                    Event::Callback(query) if query.token == "prompt:skip" => Some(None),
                    _ => None,
                })
                .await?;
            match wait {
                Wait::Cancelled => return Ok(()),
                Wait::Matched(None) => break None,
                Wait::Matched(Some(text)) => {
                    match crate::application::payment::parse_amount(&text) {
                        Ok(price) => break Some(price),
                        Err(_) => {
                            self.say("admin_credit_invalid", &[]).await?;
                        }
                    }
                }
            }
        };

        self.services
            .transport
            .send_message(
                self.chat,
                self.t("admin_ask_product_image", &[]),
                Some(self.skip_or_cancel_keyboard()),
            )
            .await?;
        match self.wait_for_photo_or_skip(Cancellable::Yes).await? {
            Wait::Cancelled => return Ok(()),
            Wait::Matched(Some(photo)) => product.image = Some(photo.largest),
            Wait::Matched(None) => {}
        }

        if self.require_permission(user.id, |a| a.edit_products).await.is_err() {
            self.say("error_permission_denied", &[]).await?;
            return Ok(());
        }
        let stored = self.services.store.upsert_product(product).await?;
        self.say("admin_product_saved", &[("name", stored.name)])
            .await?;
        Ok(())
    }

    pub(crate) async fn admin_orders_flow(&mut self, user: &User) -> Result<()> {
        if self.require_permission(user.id, |a| a.receive_orders).await.is_err() {
            self.say("error_permission_denied", &[]).await?;
            return Ok(());
        }
        loop {
            let orders = self.services.store.open_orders().await?;
            if orders.is_empty() {
                self.say("admin_orders_empty", &[]).await?;
                return Ok(());
            }
            let transactions = self.services.store.list_transactions().await?;
            let mut lines = Vec::new();
            let mut keyboard: Keyboard = Vec::new();
            for order in &orders {
                let buyer = self
                    .services
                    .store
                    .find_user(order.user_id)
                    .await?
                    .map(|u| u.display_name())
                    .unwrap_or_else(|| order.user_id.to_string());
                let total = order
                    .transaction_id
                    .and_then(|id| transactions.iter().find(|tx| tx.id == id))
                    .map(|tx| -tx.value)
                    .unwrap_or(0);
                lines.push(self.t(
                    "admin_order_line",
                    &[
                        ("order_id", order.id.to_string()),
                        ("user", buyer),
                        ("total", self.price(total)),
                    ],
                ));
                keyboard.push(vec![
                    Button::new(
                        self.t("admin_order_ship", &[("order_id", order.id.to_string())]),
                        format!("order:ship:{}", order.id),
                    ),
                    Button::new(
                        self.t("admin_order_refund", &[("order_id", order.id.to_string())]),
                        format!("order:refund:{}", order.id),
                    ),
                ]);
            }
            keyboard.push(vec![Button::new(self.t("menu_cancel", &[]), "cancel")]);
            self.services
                .transport
                .send_message(self.chat, lines.join("\n"), Some(keyboard))
                .await?;

            let query = match self.wait_for_callback(Cancellable::Yes).await? {
                Wait::Cancelled => return Ok(()),
                Wait::Matched(query) => query,
            };
            self.answer(&query, None).await;

            if let Some(raw) = query.token.strip_prefix("order:ship:") {
                let Ok(order_id) = raw.parse::<u64>() else {
                    continue;
                };
                if self.require_permission(user.id, |a| a.receive_orders).await.is_err() {
                    self.say("error_permission_denied", &[]).await?;
                    return Ok(());
                }
                // The board may be stale; a press on an order that is no
                // longer open is refused by the store, not by this flow.
                let order = match self.services.store.mark_shipped(order_id).await {
                    Ok(order) => order,
                    Err(EngineError::Persistence(reason)) => {
                        tracing::warn!(chat = self.chat, order_id, %reason, "ship refused");
                        self.say("error_invalid_option", &[]).await?;
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                self.say(
                    "admin_order_shipped",
                    &[("order_id", order.id.to_string())],
                )
                .await?;
                let notice = self.services.catalog.text(
                    &self.lang,
                    "order_shipped_notice",
                    &[("order_id", order.id.to_string())],
                );
                self.notify(order.user_id, notice).await;
            } else if let Some(raw) = query.token.strip_prefix("order:refund:") {
                let Ok(order_id) = raw.parse::<u64>() else {
                    continue;
                };
                if self.require_permission(user.id, |a| a.receive_orders).await.is_err() {
                    self.say("error_permission_denied", &[]).await?;
                    return Ok(());
                }
                let refunded_total = self
                    .services
                    .store
                    .find_order(order_id)
                    .await?
                    .and_then(|o| o.transaction_id)
                    .and_then(|id| transactions.iter().find(|tx| tx.id == id).map(|tx| -tx.value))
                    .unwrap_or(0);
                let order = match self.services.store.commit_refund(order_id).await {
                    Ok(order) => order,
                    Err(EngineError::Persistence(reason)) => {
                        tracing::warn!(chat = self.chat, order_id, %reason, "refund refused");
                        self.say("error_invalid_option", &[]).await?;
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                self.say(
                    "admin_order_refunded",
                    &[("order_id", order.id.to_string())],
                )
                .await?;
                let notice = self.services.catalog.text(
                    &self.lang,
                    "order_refunded_notice",
                    &[
                        ("order_id", order.id.to_string()),
                        ("total", self.price(refunded_total)),
                    ],
                );
                self.notify(order.user_id, notice).await;
            } else {
                self.say("error_invalid_option", &[]).await?;
            }
        }
    }

    pub(crate) async fn admin_transactions_flow(&mut self, user: &User) -> Result<()> {
        if self
            .require_permission(user.id, |a| a.create_transactions)
            .await
            .is_err()
        {
            self.say("error_permission_denied", &[]).await?;
            return Ok(());
        }
        let keyboard = vec![
            vec![
                Button::new(self.t("admin_tx_adjust", &[]), "tx:adjust"),
                Button::new(self.t("admin_tx_export", &[]), "tx:export"),
            ],
            vec![Button::new(self.t("menu_cancel", &[]), "cancel")],
        ];
        self.services
            .transport
            .send_message(self.chat, self.t("admin_tx_prompt", &[]), Some(keyboard))
            .await?;

        let query = match self.wait_for_callback(Cancellable::Yes).await? {
            Wait::Cancelled => return Ok(()),
            Wait::Matched(query) => query,
        };
        self.answer(&query, None).await;
        match query.token.as_str() {
            "tx:adjust" => self.admin_credit_flow(user).await,
            "tx:export" => self.admin_export_flow(user).await,
            _ => {
                self.say("error_invalid_option", &[]).await?;
                Ok(())
            }
        }
    }

    async fn admin_credit_flow(&mut self, user: &User) -> Result<()> {
        let Some(target) = self.ask_for_user_id("admin_credit_ask_user").await? else {
            return Ok(());
        };

        self.services
            .transport
            .send_message(
                self.chat,
                self.t("admin_credit_ask_amount", &[]),
                Some(self.cancel_keyboard()),
            )
            .await?;
        let value = loop {
            match self.wait_for_text(Cancellable::Yes).await? {
                Wait::Cancelled => return Ok(()),
                Wait::Matched(text) => match parse_signed_amount(&text) {
                    Ok(value) => break value,
                    Err(_) => {
                        self.say("admin_credit_invalid", &[]).await?;
                    }
                },
            }
        };

        if self
            .require_permission(user.id, |a| a.create_transactions)
            .await
            .is_err()
        {
            self.say("error_permission_denied", &[]).await?;
            return Ok(());
        }
        let credit = self
            .services
            .store
            .commit_adjustment(target.id, value)
            .await?;
        self.say(
            "admin_credit_done",
            &[
                ("user", target.display_name()),
                ("credit", self.price(credit)),
            ],
        )
        .await?;
        let notice = self.services.catalog.text(
            &self.lang,
            "credit_adjusted_notice",
            &[
                ("amount", self.price(value)),
                ("credit", self.price(credit)),
            ],
        );
        self.notify(target.id, notice).await;
        Ok(())
    }

    async fn admin_export_flow(&mut self, user: &User) -> Result<()> {
        if self
            .require_permission(user.id, |a| a.create_transactions)
            .await
            .is_err()
        {
            self.say("error_permission_denied", &[]).await?;
            return Ok(());
        }
        let transactions = self.services.store.list_transactions().await?;
        let bytes = export_transactions(&transactions)?;
        self.services
            .transport
            .send_document(self.chat, "transactions.csv".to_string(), bytes)
            .await?;
        self.say("admin_csv_sent", &[]).await?;
        Ok(())
    }

    pub(crate) async fn admin_roster_flow(&mut self, user: &User) -> Result<()> {
        if self.require_permission(user.id, |a| a.is_owner).await.is_err() {
            self.say("error_permission_denied", &[]).await?;
            return Ok(());
        }
        let Some(target) = self.ask_for_user_id("admin_roster_ask_user").await? else {
            return Ok(());
        };
        let mut admin = self
            .services
            .store
            .find_admin(target.id)
            .await?
            .unwrap_or_else(|| Admin::new(target.id));

        loop {
            let keyboard = roster_keyboard(self, &admin);
            self.services
                .transport
                .send_message(
                    self.chat,
                    self.t("admin_roster_prompt", &[("user", target.display_name())]),
                    Some(keyboard),
                )
                .await?;
            let query = match self.wait_for_callback(Cancellable::Yes).await? {
                Wait::Cancelled => return Ok(()),
                Wait::Matched(query) => query,
            };
            self.answer(&query, None).await;
            match query.token.as_str() {
                "perm:edit_products" => admin.edit_products = !admin.edit_products,
                "perm:receive_orders" => admin.receive_orders = !admin.receive_orders,
                "perm:create_transactions" => {
                    admin.create_transactions = !admin.create_transactions
                }
                "perm:display_on_help" => admin.display_on_help = !admin.display_on_help,
                "perm:live_mode" => admin.live_mode = !admin.live_mode,
                "roster:done" => {
                    if self.require_permission(user.id, |a| a.is_owner).await.is_err() {
                        self.say("error_permission_denied", &[]).await?;
                        return Ok(());
                    }
                    self.services.store.upsert_admin(admin).await?;
                    self.say("admin_roster_saved", &[("user", target.display_name())])
                        .await?;
                    return Ok(());
                }
                _ => {
                    self.say("error_invalid_option", &[]).await?;
                }
            }
        }
    }

    /// Prompts for a numeric user id until it resolves to a known user or the
    /// admin cancels.
    async fn ask_for_user_id(&mut self, prompt_key: &str) -> Result<Option<User>> {
        self.services
            .transport
            .send_message(
                self.chat,
                self.t(prompt_key, &[]),
                Some(self.cancel_keyboard()),
            )
            .await?;
        loop {
            let raw = match self.wait_for_regex(&USER_ID_RE, Cancellable::Yes).await? {
                Wait::Cancelled => return Ok(None),
                Wait::Matched(raw) => raw,
            };
            let Ok(user_id) = raw.parse::<i64>() else {
                self.say("error_user_not_found", &[]).await?;
                continue;
            };
            match self.services.store.find_user(user_id).await? {
                Some(user) => return Ok(Some(user)),
                None => {
                    self.say("error_user_not_found", &[]).await?;
                }
            }
        }
    }
}

fn roster_keyboard(worker: &Worker, admin: &Admin) -> Keyboard {
    let flag = |on: bool| if on { "✅" } else { "☑️" };
    let mut rows: Keyboard = [
        ("perm_edit_products", "perm:edit_products", admin.edit_products),
        ("perm_receive_orders", "perm:receive_orders", admin.receive_orders),
        (
            "perm_create_transactions",
            "perm:create_transactions",
            admin.create_transactions,
        ),
        ("perm_display_on_help", "perm:display_on_help", admin.display_on_help),
        ("perm_live_mode", "perm:live_mode", admin.live_mode),
    ]
    .into_iter()
    .map(|(key, token, on)| {
        vec![Button::new(
            format!("{} {}", flag(on), worker.t(key, &[])),
            token,
        )]
    })
    .collect();
    rows.push(vec![
        Button::new(worker.t("menu_done", &[]), "roster:done"),
        Button::new(worker.t("menu_cancel", &[]), "cancel"),
    ]);
    rows
}
