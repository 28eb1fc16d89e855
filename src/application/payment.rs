use crate::config::CreditCardConfig;
use crate::domain::ports::{Invoice, InvoiceLine};
use crate::error::{EngineError, Result};

/// Pure fee computation for card refills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub percent: f64,
    pub fixed: i64,
}

impl FeeSchedule {
    pub fn from_config(cc: &CreditCardConfig) -> Self {
        Self {
            percent: cc.fee_percent,
            fixed: cc.fee_fixed,
        }
    }

    /// `max(0, floor(amount * percent / 100) + fixed)`. Deterministic for a
    /// fixed schedule and never negative.
    pub fn fee(&self, amount: i64) -> i64 {
        let percentage = ((amount as f64) * self.percent / 100.0).floor() as i64;
        (percentage + self.fixed).max(0)
    }
}

/// Builds the refill invoice: a base price line, plus a separate fee line
/// only when the fee is nonzero.
pub fn refill_invoice(
    title: String,
    description: String,
    payload: String,
    currency: String,
    base_label: String,
    amount: i64,
    fee_label: String,
    fee: i64,
) -> Invoice {
    let mut lines = vec![InvoiceLine {
        label: base_label,
        amount,
    }];
    if fee > 0 {
        lines.push(InvoiceLine {
            label: fee_label,
            amount: fee,
        });
    }
    Invoice {
        title,
        description,
        payload,
        currency,
        lines,
    }
}

/// Parses user-typed money like `12`, `12.5` or `12,50` into minor units
/// without going through floating point.
pub fn parse_amount(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    let (whole, frac) = match trimmed.split_once(['.', ',']) {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EngineError::Validation(format!("not an amount: {input:?}")));
    }
    if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EngineError::Validation(format!("not an amount: {input:?}")));
    }
    let whole: i64 = whole
        .parse()
        .map_err(|_| EngineError::Validation(format!("amount out of range: {input:?}")))?;
    let cents = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().unwrap_or(0) * 10,
        _ => frac.parse::<i64>().unwrap_or(0),
    };
    whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(|| EngineError::Validation(format!("amount out of range: {input:?}")))
}

/// Like [`parse_amount`] but accepts a leading sign, for manual credit
/// adjustments that may subtract.
pub fn parse_signed_amount(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    match trimmed.strip_prefix('-') {
        Some(rest) => parse_amount(rest).map(|v| -v),
        None => parse_amount(trimmed.strip_prefix('+').unwrap_or(trimmed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_floor_and_fixed() {
        let schedule = FeeSchedule {
            percent: 5.0,
            fixed: 0,
        };
        assert_eq!(schedule.fee(500), 25);
        assert_eq!(schedule.fee(0), 0);
        // 2.9% of 333 = 9.657, floored
        let stripe_like = FeeSchedule {
            percent: 2.9,
            fixed: 30,
        };
        assert_eq!(stripe_like.fee(333), 39);
    }

    #[test]
    fn test_fee_never_negative() {
        let schedule = FeeSchedule {
            percent: 0.0,
            fixed: -50,
        };
        assert_eq!(schedule.fee(10), 0);
    }

    #[test]
    fn test_fee_deterministic() {
        let schedule = FeeSchedule {
            percent: 2.9,
            fixed: 25,
        };
        assert_eq!(schedule.fee(12345), schedule.fee(12345));
    }

    #[test]
    fn test_invoice_fee_line_only_when_positive() {
        let with_fee = refill_invoice(
            "t".into(),
            "d".into(),
            "p".into(),
            "EUR".into(),
            "base".into(),
            500,
            "fee".into(),
            25,
        );
        assert_eq!(with_fee.lines.len(), 2);
        assert_eq!(with_fee.total(), 525);

        let no_fee = refill_invoice(
            "t".into(),
            "d".into(),
            "p".into(),
            "EUR".into(),
            "base".into(),
            500,
            "fee".into(),
            0,
        );
        assert_eq!(no_fee.lines.len(), 1);
        assert_eq!(no_fee.total(), 500);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12").unwrap(), 1200);
        assert_eq!(parse_amount("12.5").unwrap(), 1250);
        assert_eq!(parse_amount("12,50").unwrap(), 1250);
        assert_eq!(parse_amount(" 3.00 ").unwrap(), 300);
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("1.234").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_parse_signed_amount() {
        assert_eq!(parse_signed_amount("-5").unwrap(), -500);
        assert_eq!(parse_signed_amount("+5").unwrap(), 500);
        assert_eq!(parse_signed_amount("10.00").unwrap(), 1000);
        assert!(parse_signed_amount("--5").is_err());
    }
}
