use crate::domain::transaction::Transaction;
use crate::error::{EngineError, Result};
use std::io::Write;

/// Writes ledger rows as CSV.
///
/// Wraps `csv::Writer` over any `Write` sink; headers come from the
/// `Transaction` field names via serde.
pub struct TransactionExporter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TransactionExporter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_transactions<'a>(
        &mut self,
        rows: impl IntoIterator<Item = &'a Transaction>,
    ) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Convenience for the admin export: the whole ledger as in-memory CSV bytes.
pub fn export_transactions(rows: &[Transaction]) -> Result<Vec<u8>> {
    let mut exporter = TransactionExporter::new(Vec::new());
    exporter.write_transactions(rows)?;
    exporter
        .writer
        .into_inner()
        .map_err(|e| EngineError::Persistence(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tx(id: u64, value: i64) -> Transaction {
        Transaction {
            id,
            user_id: 42,
            value,
            order_id: None,
            provider: Some("card".to_string()),
            provider_charge_id: Some(format!("ch_{id}")),
            telegram_charge_id: None,
            refunded: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_export_has_header_and_rows() {
        let rows = [tx(1, 1000), tx(2, -300)];
        let bytes = export_transactions(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("user_id"));
        assert!(lines[0].contains("value"));
        assert!(lines[1].contains("1000"));
        assert!(lines[2].contains("-300"));
        assert!(lines[2].contains("ch_2"));
    }

    #[test]
    fn test_export_empty_ledger() {
        let bytes = export_transactions(&[]).unwrap();
        assert!(bytes.is_empty());
    }
}
