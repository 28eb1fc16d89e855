use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One signed ledger movement. A missing `order_id` marks a standalone
/// credit refill or a manual adjustment; the charge identifiers are kept
/// verbatim from the payment provider for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user_id: i64,
    pub value: i64,
    pub order_id: Option<u64>,
    pub provider: Option<String>,
    pub provider_charge_id: Option<String>,
    pub telegram_charge_id: Option<String>,
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
}

/// Provider identifiers attached to a confirmed card payment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChargeIds {
    pub provider: Option<String>,
    pub provider_charge_id: Option<String>,
    pub telegram_charge_id: Option<String>,
}

/// Sums the values of non-refunded transactions. This is the authoritative
/// definition of a user's credit.
pub fn ledger_balance<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> i64 {
    rows.into_iter()
        .filter(|tx| !tx.refunded)
        .map(|tx| tx.value)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64, value: i64, refunded: bool) -> Transaction {
        Transaction {
            id,
            user_id: 1,
            value,
            order_id: None,
            provider: None,
            provider_charge_id: None,
            telegram_charge_id: None,
            refunded,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ledger_balance_ignores_refunded() {
        let rows = [tx(1, 1000, false), tx(2, -300, false), tx(3, -500, true)];
        assert_eq!(ledger_balance(&rows), 700);
    }

    #[test]
    fn test_ledger_balance_empty() {
        assert_eq!(ledger_balance(&[]), 0);
    }
}
