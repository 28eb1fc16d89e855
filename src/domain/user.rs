use crate::domain::event::Contact;
use serde::{Deserialize, Serialize};

/// A shopper. Created lazily on first contact.
///
/// `credit` is a materialized view: it always equals the sum of the user's
/// non-refunded transaction values, recomputed inside every ledger commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language: String,
    pub credit: i64,
}

impl User {
    pub fn from_contact(contact: &Contact, language: impl Into<String>) -> Self {
        Self {
            id: contact.user_id,
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            username: contact.username.clone(),
            language: language.into(),
            credit: 0,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.username, &self.last_name) {
            (Some(username), _) => format!("@{username}"),
            (None, Some(last)) => format!("{} {}", self.first_name, last),
            (None, None) => self.first_name.clone(),
        }
    }
}

/// Formats a minor-unit amount for display, e.g. `1350` -> `€13.50`.
pub fn format_price(value: i64, symbol: &str) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.abs();
    format!("{sign}{symbol}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1350, "€"), "€13.50");
        assert_eq!(format_price(5, "€"), "€0.05");
        assert_eq!(format_price(-1300, "$"), "-$13.00");
        assert_eq!(format_price(0, "€"), "€0.00");
    }

    #[test]
    fn test_display_name_prefers_username() {
        let mut contact = Contact::new(7, "Ada");
        contact.username = Some("ada".into());
        let user = User::from_contact(&contact, "en");
        assert_eq!(user.display_name(), "@ada");
    }
}
