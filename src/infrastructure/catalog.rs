use crate::domain::ports::Catalog;
use std::collections::HashMap;

/// Built-in English strings, enough to run the engine and its tests without
/// an external string pack. Real deployments layer more languages on top via
/// `add_language`.
const ENGLISH: &[(&str, &str)] = &[
    ("menu_cancel", "🔙 Cancel"),
    ("menu_done", "✅ Done"),
    ("menu_skip", "➡️ Skip"),
    ("menu_add", "➕ Add"),
    ("menu_remove", "➖ Remove"),
    ("menu_order", "🛒 Order"),
    ("menu_order_status", "❓ Order status"),
    ("menu_add_credit", "💵 Add credit"),
    ("menu_language", "🇬🇧 Language"),
    ("menu_help", "❓ Help"),
    ("menu_bot_info", "ℹ️ Info"),
    ("menu_admin_products", "📝 Products"),
    ("menu_admin_orders", "📦 Orders"),
    ("menu_admin_transactions", "💳 Transactions"),
    ("menu_admin_roster", "🔑 Admins"),
    ("conversation_open_user_menu", "What would you like to do?\nYour credit: {credit}"),
    ("conversation_expired", "This conversation expired after inactivity. Send /start to begin a new one."),
    ("conversation_closed", "The shop is closing, this conversation has ended. See you soon!"),
    ("error_no_active_chat", "No active conversation. Send /start to begin."),
    ("error_invalid_option", "Invalid option."),
    ("error_permission_denied", "You are not allowed to do that."),
    ("error_fatal", "Something went wrong and this conversation was closed. Send /start to try again."),
    ("order_started", "Add products to your cart, then press Done."),
    ("order_product_line", "{name}\n{description}\nPrice: {price}"),
    ("order_product_in_cart", "{name}\n{description}\nPrice: {price}\nIn cart: {quantity}"),
    ("order_cart_summary", "Your cart:\n{items}\nTotal: {total}"),
    ("order_cart_empty", "Your cart is empty."),
    ("order_cancelled", "Order cancelled."),
    ("order_confirmed", "Order #{order_id} confirmed! {total} was deducted, your credit is now {credit}."),
    ("order_insufficient_credit", "You do not have enough credit: missing {shortfall}. The order was not placed."),
    ("order_live_notification", "New order #{order_id} from {user}: total {total}"),
    ("order_status_empty", "You have not placed any orders yet."),
    ("order_status_line", "Order #{order_id}: {status}, total {total}"),
    ("add_credit_prompt", "Choose an amount to add, or type a custom one."),
    ("error_invalid_amount", "That is not a valid amount between {min} and {max}. Try again."),
    ("payment_invoice_title", "Credit top-up"),
    ("payment_invoice_description", "Add {amount} to your wallet"),
    ("payment_base_label", "Top-up"),
    ("payment_fee_label", "Card fee"),
    ("payment_success", "Payment received! Your credit is now {credit}."),
    ("payment_cancelled", "Top-up cancelled."),
    ("error_invoice_expired", "This payment request has expired. Start a new top-up."),
    ("language_prompt", "Choose your language."),
    ("language_set", "Language set to {language}."),
    ("help_text", "Shop staff you can contact:\n{contacts}"),
    ("help_no_contacts", "No staff contacts are listed right now."),
    ("bot_info", "This shop runs on tillbot, a conversational order-taking engine."),
    ("admin_products_prompt", "Select a product to edit, or add a new one."),
    ("admin_product_new", "✨ New product"),
    ("admin_product_edit", "✏️ Edit"),
    ("admin_product_delete", "🗑 Delete"),
    ("admin_ask_product_name", "Send the product name."),
    ("admin_ask_product_description", "Send the product description."),
    ("admin_ask_product_price", "Send the price, e.g. 5.00, or press Skip to make it not purchasable."),
    ("admin_ask_product_image", "Send a photo for the product, or press Skip."),
    ("admin_product_saved", "Product {name} saved."),
    ("admin_product_deleted", "Product {name} deleted."),
    ("admin_orders_empty", "No open orders."),
    ("admin_order_line", "Order #{order_id} by {user}, total {total}"),
    ("admin_order_ship", "📦 Ship #{order_id}"),
    ("admin_order_refund", "✴️ Refund #{order_id}"),
    ("admin_order_shipped", "Order #{order_id} marked as shipped."),
    ("admin_order_refunded", "Order #{order_id} refunded."),
    ("order_shipped_notice", "Your order #{order_id} has been shipped!"),
    ("order_refunded_notice", "Your order #{order_id} was refunded, {total} returned to your credit."),
    ("admin_tx_prompt", "Transactions: adjust a user's credit or export the ledger."),
    ("admin_tx_adjust", "💰 Adjust credit"),
    ("admin_tx_export", "📄 Export CSV"),
    ("admin_credit_ask_user", "Send the numeric id of the user whose credit you want to adjust."),
    ("admin_credit_ask_amount", "Send the adjustment, e.g. 10.00 or -5.00."),
    ("admin_credit_invalid", "That is not a valid adjustment, e.g. 10.00 or -5.00."),
    ("admin_credit_done", "Credit of user {user} adjusted; new balance {credit}."),
    ("credit_adjusted_notice", "An operator adjusted your credit by {amount}. New balance: {credit}."),
    ("error_user_not_found", "No user with that id."),
    ("admin_csv_sent", "Transaction export attached."),
    ("admin_roster_ask_user", "Send the numeric id of the user whose permissions you want to edit."),
    ("admin_roster_prompt", "Toggle permissions for user {user}, then press Done."),
    ("admin_roster_saved", "Permissions for user {user} saved."),
    ("perm_edit_products", "Edit products"),
    ("perm_receive_orders", "Receive orders"),
    ("perm_create_transactions", "Create transactions"),
    ("perm_display_on_help", "Show on help"),
    ("perm_live_mode", "Live orders"),
];

/// In-memory string catalog with `{param}` substitution and fallback to the
/// default language. Unknown keys render as the key itself so a missing
/// string is visible instead of silent.
pub struct StaticCatalog {
    tables: HashMap<String, HashMap<String, String>>,
    fallback: String,
}

impl StaticCatalog {
    pub fn english() -> Self {
        let mut catalog = Self {
            tables: HashMap::new(),
            fallback: "en".to_string(),
        };
        catalog.add_language("en", ENGLISH.iter().map(|(k, v)| (*k, *v)));
        catalog
    }

    pub fn add_language<'a>(
        &mut self,
        language: &str,
        strings: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let table = self.tables.entry(language.to_string()).or_default();
        for (key, value) in strings {
            table.insert(key.to_string(), value.to_string());
        }
    }

    fn lookup(&self, language: &str, key: &str) -> Option<&str> {
        self.tables
            .get(language)
            .and_then(|table| table.get(key))
            .or_else(|| {
                self.tables
                    .get(&self.fallback)
                    .and_then(|table| table.get(key))
            })
            .map(String::as_str)
    }
}

impl Catalog for StaticCatalog {
    fn text(&self, language: &str, key: &str, params: &[(&str, String)]) -> String {
        let mut text = match self.lookup(language, key) {
            Some(value) => value.to_string(),
            None => return key.to_string(),
        };
        for (name, value) in params {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }
}
