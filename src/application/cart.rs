use crate::domain::event::MessageId;
use crate::domain::order::{OrderDraft, OrderItem};
use crate::domain::product::Product;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

/// The ephemeral pre-checkout selection: display-message identity mapped to
/// a product and its quantity. Never persisted; dropped on cancel or
/// insufficient funds.
#[derive(Debug, Default)]
pub struct Cart {
    lines: HashMap<MessageId, CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a displayed product message to the cart with quantity zero.
    pub fn register(&mut self, message: MessageId, product: Product) {
        self.lines.entry(message).or_insert(CartLine {
            product,
            quantity: 0,
        });
    }

    pub fn add(&mut self, message: MessageId) -> Option<&CartLine> {
        let line = self.lines.get_mut(&message)?;
        line.quantity += 1;
        Some(line)
    }

    /// Decrements, saturating at zero: removing from an empty line is a no-op.
    pub fn remove(&mut self, message: MessageId) -> Option<&CartLine> {
        let line = self.lines.get_mut(&message)?;
        line.quantity = line.quantity.saturating_sub(1);
        Some(line)
    }

    pub fn line(&self, message: MessageId) -> Option<&CartLine> {
        self.lines.get(&message)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.values().all(|line| line.quantity == 0)
    }

    pub fn total(&self) -> i64 {
        self.lines
            .values()
            .map(|line| line.product.price.unwrap_or(0) * i64::from(line.quantity))
            .sum()
    }

    /// Selected lines in a stable order for display.
    pub fn selection(&self) -> Vec<&CartLine> {
        let mut picked: Vec<&CartLine> = self
            .lines
            .values()
            .filter(|line| line.quantity > 0)
            .collect();
        picked.sort_by_key(|line| line.product.id);
        picked
    }

    /// Finalizes the cart into an order draft, expanding quantity N into N
    /// item rows of quantity 1. Zero-quantity lines are dropped, never
    /// persisted.
    pub fn into_draft(self, user_id: i64, notes: String) -> OrderDraft {
        let total = self.total();
        let mut lines: Vec<CartLine> = self
            .lines
            .into_values()
            .filter(|line| line.quantity > 0)
            .collect();
        lines.sort_by_key(|line| line.product.id);
        let items = lines
            .iter()
            .flat_map(|line| {
                std::iter::repeat_n(
                    OrderItem {
                        product_id: line.product.id,
                        quantity: 1,
                    },
                    line.quantity as usize,
                )
            })
            .collect();
        OrderDraft {
            user_id,
            notes,
            items,
            total,
        }
    }
}
