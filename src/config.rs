use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Engine configuration, loaded from a JSON file at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub language: LanguageConfig,
    pub payments: PaymentsConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageConfig {
    pub enabled: Vec<String>,
    pub default: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    pub currency: String,
    pub currency_symbol: String,
    pub credit_card: CreditCardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditCardConfig {
    pub enabled: bool,
    /// Fee percentage applied to refill amounts, e.g. `5.0`.
    pub fee_percent: f64,
    /// Fixed fee in minor currency units, added after the percentage.
    pub fee_fixed: i64,
    /// Smallest accepted refill, minor units.
    pub min_amount: i64,
    /// Largest accepted refill, minor units.
    pub max_amount: i64,
    /// Quick-pick refill amounts offered in the add-credit menu.
    pub presets: Vec<i64>,
    /// Offer an interactive top-up for the exact shortfall during checkout.
    pub refill_on_checkout: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Inactivity bound in seconds before a conversation expires.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    /// Master switch for live order notifications to subscribed admins.
    pub live_notifications: bool,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            live_notifications: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.enabled.is_empty() {
            return Err(EngineError::Config("no languages enabled".into()));
        }
        if !self.language.enabled.contains(&self.language.default) {
            return Err(EngineError::Config(format!(
                "default language {:?} is not among the enabled languages",
                self.language.default
            )));
        }
        let cc = &self.payments.credit_card;
        if cc.min_amount < 0 || cc.max_amount < cc.min_amount {
            return Err(EngineError::Config(
                "credit card amount range is empty or negative".into(),
            ));
        }
        if cc.fee_percent < 0.0 {
            return Err(EngineError::Config("fee percentage is negative".into()));
        }
        if self.session.timeout_secs == 0 {
            return Err(EngineError::Config("session timeout must be nonzero".into()));
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_secs)
    }

    pub fn language_or_default<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(lang) if self.language.enabled.iter().any(|l| l == lang) => lang,
            _ => &self.language.default,
        }
    }
}

/// Shared fixture for unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_config(timeout_secs: u64) -> Config {
    let mut config: Config =
        serde_json::from_str(tests::sample_json()).expect("fixture config parses");
    config.session.timeout_secs = timeout_secs;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_json() -> &'static str {
        r#"{
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
        }"#
    }

    #[test]
    fn test_parse_and_validate() {
        let config: Config = serde_json::from_str(sample_json()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.language.default, "en");
        assert_eq!(config.payments.credit_card.presets.len(), 3);
        assert!(config.orders.live_notifications);
        assert_eq!(config.session_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_default_language_must_be_enabled() {
        let mut config: Config = serde_json::from_str(sample_json()).unwrap();
        config.language.default = "fr".into();
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_inverted_card_range_rejected() {
        let mut config: Config = serde_json::from_str(sample_json()).unwrap();
        config.payments.credit_card.min_amount = 500;
        config.payments.credit_card.max_amount = 100;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_language_fallback() {
        let config: Config = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(config.language_or_default(Some("it")), "it");
        assert_eq!(config.language_or_default(Some("fr")), "en");
        assert_eq!(config.language_or_default(None), "en");
    }
}
