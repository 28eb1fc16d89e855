pub mod transaction_export;
