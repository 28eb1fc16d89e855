use crate::domain::admin::Admin;
use crate::domain::event::{ChatId, Contact, MessageId};
use crate::domain::order::{Order, OrderDraft};
use crate::domain::product::Product;
use crate::domain::transaction::{ChargeIds, Transaction};
use crate::domain::user::User;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// One inline button: a caption plus the callback token it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

pub type Keyboard = Vec<Vec<Button>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub label: String,
    pub amount: i64,
}

/// An outbound invoice. `payload` is the correlation token the engine later
/// matches against pre-checkout confirmations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: String,
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    pub fn total(&self) -> i64 {
        self.lines.iter().map(|line| line.amount).sum()
    }
}

/// Outbound side of the messaging transport. The engine treats every call as
/// an opaque typed operation; delivery and wire formatting live elsewhere.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageId>;

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    async fn send_invoice(&self, chat: ChatId, invoice: Invoice) -> Result<MessageId>;

    async fn answer_callback(&self, query_id: &str, text: Option<String>) -> Result<()>;

    async fn answer_precheckout(
        &self,
        query_id: &str,
        ok: bool,
        error: Option<String>,
    ) -> Result<()>;

    async fn send_document(&self, chat: ChatId, name: String, bytes: Vec<u8>) -> Result<()>;
}

pub type TransportRef = Arc<dyn Transport>;

/// Localization lookup: `(language, key, named parameters)` to display text.
/// The core never embeds user-facing strings, only keys and parameters.
pub trait Catalog: Send + Sync {
    fn text(&self, language: &str, key: &str, params: &[(&str, String)]) -> String;
}

pub type CatalogRef = Arc<dyn Catalog>;

/// Typed CRUD plus the atomic multi-row commits over the five entities.
///
/// Every `commit_*` operation is one transaction boundary: either all of its
/// rows land and the affected user's credit is recomputed in the same commit,
/// or nothing is observable.
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Returns the existing user or creates one from the contact.
    async fn ensure_user(&self, contact: &Contact, default_language: &str) -> Result<User>;
    async fn find_user(&self, user_id: i64) -> Result<Option<User>>;
    async fn update_user(&self, user: User) -> Result<()>;

    async fn find_admin(&self, user_id: i64) -> Result<Option<Admin>>;
    async fn upsert_admin(&self, admin: Admin) -> Result<()>;
    async fn list_admins(&self) -> Result<Vec<Admin>>;

    async fn find_product(&self, product_id: u64) -> Result<Option<Product>>;
    /// Active products only unless `include_deleted` is set.
    async fn list_products(&self, include_deleted: bool) -> Result<Vec<Product>>;
    /// Inserts when `id == 0`, otherwise replaces. Returns the stored row.
    async fn upsert_product(&self, product: Product) -> Result<Product>;

    async fn find_order(&self, order_id: u64) -> Result<Option<Order>>;
    async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>>;
    async fn open_orders(&self) -> Result<Vec<Order>>;
    async fn mark_shipped(&self, order_id: u64) -> Result<Order>;

    async fn list_transactions(&self) -> Result<Vec<Transaction>>;
    /// Credit derived from the persisted ledger rows.
    async fn credit_of(&self, user_id: i64) -> Result<i64>;

    /// Atomically persists the order, its per-unit item rows and the linked
    /// negative transaction, re-checking the balance under the commit lock.
    /// Fails with `InsufficientCredit` without persisting anything.
    async fn commit_checkout(&self, draft: OrderDraft) -> Result<(Order, i64)>;

    /// Records a confirmed payment as a standalone positive transaction.
    /// Returns the recomputed credit.
    async fn commit_payment(&self, user_id: i64, value: i64, charges: ChargeIds) -> Result<i64>;

    /// Manual signed adjustment from the admin branch.
    async fn commit_adjustment(&self, user_id: i64, value: i64) -> Result<i64>;

    /// Flags an order's purchase transaction as refunded and recomputes the
    /// buyer's credit in the same commit.
    async fn commit_refund(&self, order_id: u64) -> Result<Order>;
}

pub type StoreRef = Arc<dyn ShopStore>;
