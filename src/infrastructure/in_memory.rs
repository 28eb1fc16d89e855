use crate::domain::admin::Admin;
use crate::domain::event::Contact;
use crate::domain::order::{Order, OrderDraft, OrderStatus};
use crate::domain::product::Product;
use crate::domain::ports::ShopStore;
use crate::domain::transaction::{ChargeIds, Transaction, ledger_balance};
use crate::domain::user::User;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Dataset {
    users: HashMap<i64, User>,
    products: HashMap<u64, Product>,
    orders: HashMap<u64, Order>,
    transactions: HashMap<u64, Transaction>,
    admins: HashMap<i64, Admin>,
    next_product_id: u64,
    next_order_id: u64,
    next_transaction_id: u64,
}

impl Dataset {
    /// Recomputes the materialized credit column from the ledger rows.
    /// Called inside every commit, under the same write lock.
    fn recompute_credit(&mut self, user_id: i64) -> i64 {
        let credit = ledger_balance(
            self.transactions
                .values()
                .filter(|tx| tx.user_id == user_id),
        );
        if let Some(user) = self.users.get_mut(&user_id) {
            user.credit = credit;
        }
        credit
    }

    fn push_transaction(
        &mut self,
        user_id: i64,
        value: i64,
        order_id: Option<u64>,
        charges: ChargeIds,
    ) -> u64 {
        self.next_transaction_id += 1;
        let id = self.next_transaction_id;
        self.transactions.insert(
            id,
            Transaction {
                id,
                user_id,
                value,
                order_id,
                provider: charges.provider,
                provider_charge_id: charges.provider_charge_id,
                telegram_charge_id: charges.telegram_charge_id,
                refunded: false,
                created_at: Utc::now(),
            },
        );
        id
    }
}

/// A thread-safe in-memory store over the five entities.
///
/// One `RwLock` guards the whole dataset, so every `commit_*` operation is a
/// single critical section: either all of its rows land or none do, and the
/// credit column is recomputed before the lock is released. Concurrent
/// workers touching the same user never observe a half-applied mutation.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    data: Arc<RwLock<Dataset>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShopStore for InMemoryStore {
    async fn ensure_user(&self, contact: &Contact, default_language: &str) -> Result<User> {
        let mut data = self.data.write().await;
        if let Some(user) = data.users.get(&contact.user_id) {
            return Ok(user.clone());
        }
        let language = contact
            .language_code
            .clone()
            .unwrap_or_else(|| default_language.to_string());
        let user = User::from_contact(contact, language);
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.data.read().await.users.get(&user_id).cloned())
    }

    async fn update_user(&self, user: User) -> Result<()> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&user.id) {
            return Err(EngineError::Persistence(format!(
                "no such user {}",
                user.id
            )));
        }
        // Credit is ledger-derived, never settable through this path.
        let credit = data.recompute_credit(user.id);
        data.users.insert(user.id, User { credit, ..user });
        Ok(())
    }

    async fn find_admin(&self, user_id: i64) -> Result<Option<Admin>> {
        Ok(self.data.read().await.admins.get(&user_id).cloned())
    }

    async fn upsert_admin(&self, admin: Admin) -> Result<()> {
        self.data.write().await.admins.insert(admin.user_id, admin);
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Admin>> {
        let data = self.data.read().await;
        let mut admins: Vec<Admin> = data.admins.values().cloned().collect();
        admins.sort_by_key(|a| a.user_id);
        Ok(admins)
    }

    async fn find_product(&self, product_id: u64) -> Result<Option<Product>> {
        Ok(self.data.read().await.products.get(&product_id).cloned())
    }

    async fn list_products(&self, include_deleted: bool) -> Result<Vec<Product>> {
        let data = self.data.read().await;
        let mut products: Vec<Product> = data
            .products
            .values()
            .filter(|p| include_deleted || !p.deleted)
            .cloned()
            .collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn upsert_product(&self, mut product: Product) -> Result<Product> {
        let mut data = self.data.write().await;
        if product.id == 0 {
            data.next_product_id += 1;
            product.id = data.next_product_id;
        }
        data.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_order(&self, order_id: u64) -> Result<Option<Order>> {
        Ok(self.data.read().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let data = self.data.read().await;
        let mut orders: Vec<Order> = data
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn open_orders(&self) -> Result<Vec<Order>> {
        let data = self.data.read().await;
        let mut orders: Vec<Order> = data
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Open)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn mark_shipped(&self, order_id: u64) -> Result<Order> {
        let mut data = self.data.write().await;
        let order = data
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| EngineError::Persistence(format!("no such order {order_id}")))?;
        // Stale ship buttons must not resurrect a refunded or already
        // shipped order.
        if order.status != OrderStatus::Open {
            return Err(EngineError::Persistence(format!(
                "order {order_id} is not open ({})",
                order.status
            )));
        }
        order.status = OrderStatus::Shipped;
        order.shipped_at = Some(Utc::now());
        Ok(order.clone())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let data = self.data.read().await;
        let mut rows: Vec<Transaction> = data.transactions.values().cloned().collect();
        rows.sort_by_key(|tx| tx.id);
        Ok(rows)
    }

    async fn credit_of(&self, user_id: i64) -> Result<i64> {
        let data = self.data.read().await;
        Ok(ledger_balance(
            data.transactions
                .values()
                .filter(|tx| tx.user_id == user_id),
        ))
    }

    async fn commit_checkout(&self, draft: OrderDraft) -> Result<(Order, i64)> {
        let mut data = self.data.write().await;
        if draft.items.is_empty() {
            return Err(EngineError::Persistence("empty order draft".into()));
        }
        // Balance is re-checked under the commit lock so two engines racing
        // on the same user cannot both pass the pre-check.
        let balance = ledger_balance(
            data.transactions
                .values()
                .filter(|tx| tx.user_id == draft.user_id),
        );
        if balance < draft.total {
            return Err(EngineError::InsufficientCredit {
                shortfall: draft.total - balance,
            });
        }

        data.next_order_id += 1;
        let order_id = data.next_order_id;
        let tx_id = data.push_transaction(
            draft.user_id,
            -draft.total,
            Some(order_id),
            ChargeIds::default(),
        );
        let order = Order {
            id: order_id,
            user_id: draft.user_id,
            created_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
            status: OrderStatus::Open,
            notes: draft.notes,
            items: draft.items,
            transaction_id: Some(tx_id),
        };
        data.orders.insert(order_id, order.clone());
        let credit = data.recompute_credit(draft.user_id);
        Ok((order, credit))
    }

    async fn commit_payment(&self, user_id: i64, value: i64, charges: ChargeIds) -> Result<i64> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&user_id) {
            return Err(EngineError::Persistence(format!("no such user {user_id}")));
        }
        data.push_transaction(user_id, value, None, charges);
        Ok(data.recompute_credit(user_id))
    }

    async fn commit_adjustment(&self, user_id: i64, value: i64) -> Result<i64> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&user_id) {
            return Err(EngineError::Persistence(format!("no such user {user_id}")));
        }
        data.push_transaction(user_id, value, None, ChargeIds::default());
        Ok(data.recompute_credit(user_id))
    }

    async fn commit_refund(&self, order_id: u64) -> Result<Order> {
        let mut data = self.data.write().await;
        let (user_id, tx_id) = {
            let order = data
                .orders
                .get(&order_id)
                .ok_or_else(|| EngineError::Persistence(format!("no such order {order_id}")))?;
            let tx_id = order.transaction_id.ok_or_else(|| {
                EngineError::Persistence(format!("order {order_id} has no transaction"))
            })?;
            (order.user_id, tx_id)
        };
        let tx = data
            .transactions
            .get_mut(&tx_id)
            .ok_or_else(|| EngineError::Persistence(format!("missing transaction {tx_id}")))?;
        if tx.refunded {
            return Err(EngineError::Persistence(format!(
                "order {order_id} already refunded"
            )));
        }
        tx.refunded = true;
        let order = data.orders.get_mut(&order_id).expect("checked above");
        order.status = OrderStatus::Refunded;
        let order = order.clone();
        data.recompute_credit(user_id);
        Ok(order)
    }
}
