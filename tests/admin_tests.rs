mod common;

use common::{Harness, default_config};
use tillbot::domain::admin::Admin;
use tillbot::domain::event::Contact;
use tillbot::domain::order::OrderStatus;
use tillbot::domain::ports::ShopStore;
use tillbot::domain::transaction::ChargeIds;
use tillbot::infrastructure::transport::Outbound;

async fn seed_owner(h: &Harness, user_id: i64) {
    h.store
        .ensure_user(&Contact::new(user_id, format!("admin{user_id}")), "en")
        .await
        .unwrap();
    h.store.upsert_admin(Admin::owner(user_id)).await.unwrap();
}

/// A manual adjustment lands in the target's ledger and the target is told.
#[tokio::test]
async fn test_manual_credit_adjustment() {
    let mut h = Harness::new(default_config());
    seed_owner(&h, 1).await;
    h.store
        .ensure_user(&Contact::new(2, "buyer"), "en")
        .await
        .unwrap();

    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "admin:transactions", 0).await;
    h.expect_message("adjust a user's credit").await;
    h.press(1, "tx:adjust", 0).await;
    h.expect_message("numeric id of the user").await;
    h.send_text(1, "2").await;
    h.expect_message("Send the adjustment").await;
    h.send_text(1, "10.00").await;

    h.expect_message("new balance").await;
    assert_eq!(h.store.credit_of(2).await.unwrap(), 1000);

    // The target chat is told about the adjustment.
    h.wait_for_outbound("target notice", |call| {
        matches!(
            call,
            Outbound::Message { chat: 2, text, .. } if text.contains("adjusted your credit")
        )
    })
    .await;
}

/// Revoking a permission mid-conversation takes effect at the very next
/// privileged action: the product prompts finish, the save is refused.
#[tokio::test]
async fn test_permission_revoked_mid_flow_blocks_the_save() {
    let mut h = Harness::new(default_config());
    seed_owner(&h, 1).await;

    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "admin:products", 0).await;
    h.expect_message("Select a product").await;
    h.press(1, "prod:new", 0).await;
    h.expect_message("Send the product name").await;

    // Revoked between the prompt and the answers.
    let mut demoted = Admin::owner(1);
    demoted.edit_products = false;
    h.store.upsert_admin(demoted).await.unwrap();

    h.send_text(1, "Tea").await;
    h.expect_message("Send the product description").await;
    h.send_text(1, "Loose leaf").await;
    h.expect_message("Send the price").await;
    h.press(1, "prompt:skip", 0).await;
    h.expect_message("Send a photo").await;
    h.press(1, "prompt:skip", 0).await;

    h.expect_message("not allowed").await;
    assert!(h.store.list_products(true).await.unwrap().is_empty());
}

/// A non-admin pressing an admin token is refused outright.
#[tokio::test]
async fn test_admin_states_need_an_admin_row() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "admin:products", 0).await;
    h.expect_message("not allowed").await;
}

/// Shipping and refunding from the open-orders board, with buyer notices.
#[tokio::test]
async fn test_ship_and_refund_open_orders() {
    use tillbot::domain::order::{OrderDraft, OrderItem};

    let mut h = Harness::new(default_config());
    seed_owner(&h, 1).await;
    h.store
        .ensure_user(&Contact::new(2, "buyer"), "en")
        .await
        .unwrap();
    h.store
        .commit_payment(2, 2000, ChargeIds::default())
        .await
        .unwrap();
    let draft = |total| OrderDraft {
        user_id: 2,
        notes: String::new(),
        items: vec![OrderItem {
            product_id: 1,
            quantity: 1,
        }],
        total,
    };
    let (first, _) = h.store.commit_checkout(draft(600)).await.unwrap();
    let (second, _) = h.store.commit_checkout(draft(400)).await.unwrap();

    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "admin:orders", 0).await;
    h.expect_message("by buyer").await;

    h.press(1, &format!("order:ship:{}", first.id), 0).await;
    h.expect_message("marked as shipped").await;
    h.wait_for_outbound("shipped notice", |call| {
        matches!(
            call,
            Outbound::Message { chat: 2, text, .. } if text.contains("has been shipped")
        )
    })
    .await;
    assert_eq!(
        h.store.find_order(first.id).await.unwrap().unwrap().status,
        OrderStatus::Shipped
    );

    h.press(1, &format!("order:refund:{}", second.id), 0).await;
    h.expect_message("refunded").await;
    h.wait_for_outbound("refund notice", |call| {
        matches!(
            call,
            Outbound::Message { chat: 2, text, .. } if text.contains("€4.00 returned")
        )
    })
    .await;
    assert_eq!(h.store.credit_of(2).await.unwrap(), 1400);
}

/// A ship button left over from an earlier board cannot resurrect a
/// refunded order; the press is refused and the ledger stays consistent.
#[tokio::test]
async fn test_stale_ship_press_cannot_resurrect_a_refund() {
    use tillbot::domain::order::{OrderDraft, OrderItem};

    let mut h = Harness::new(default_config());
    seed_owner(&h, 1).await;
    h.store
        .ensure_user(&Contact::new(2, "buyer"), "en")
        .await
        .unwrap();
    h.store
        .commit_payment(2, 2000, ChargeIds::default())
        .await
        .unwrap();
    let draft = |total| OrderDraft {
        user_id: 2,
        notes: String::new(),
        items: vec![OrderItem {
            product_id: 1,
            quantity: 1,
        }],
        total,
    };
    let (first, _) = h.store.commit_checkout(draft(600)).await.unwrap();
    let (second, _) = h.store.commit_checkout(draft(400)).await.unwrap();

    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "admin:orders", 0).await;
    h.expect_message("by buyer").await;

    h.press(1, &format!("order:refund:{}", first.id), 0).await;
    h.expect_message("refunded").await;

    // The old keyboard is still pressable; the store refuses the ship.
    h.press(1, &format!("order:ship:{}", first.id), 0).await;
    h.expect_message("Invalid option").await;

    assert_eq!(
        h.store.find_order(first.id).await.unwrap().unwrap().status,
        OrderStatus::Refunded
    );
    assert_eq!(
        h.store.find_order(second.id).await.unwrap().unwrap().status,
        OrderStatus::Open
    );
    assert_eq!(h.store.credit_of(2).await.unwrap(), 1600);
}

/// The ledger export arrives as a CSV document with headers and rows.
#[tokio::test]
async fn test_transaction_csv_export() {
    let mut h = Harness::new(default_config());
    seed_owner(&h, 1).await;
    h.store
        .ensure_user(&Contact::new(2, "buyer"), "en")
        .await
        .unwrap();
    h.store
        .commit_payment(2, 1500, ChargeIds::default())
        .await
        .unwrap();

    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "admin:transactions", 0).await;
    h.expect_message("adjust a user's credit").await;
    h.press(1, "tx:export", 0).await;

    let document = h
        .wait_for_outbound("csv document", |call| {
            matches!(call, Outbound::Document { .. })
        })
        .await;
    let Outbound::Document { name, bytes, .. } = document else {
        unreachable!()
    };
    assert_eq!(name, "transactions.csv");
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.lines().next().unwrap().contains("user_id"));
    assert!(text.contains("1500"));
    h.expect_message("export attached").await;
}

/// The owner grants a permission through the roster editor.
#[tokio::test]
async fn test_roster_editor_grants_permissions() {
    let mut h = Harness::new(default_config());
    seed_owner(&h, 1).await;
    h.store
        .ensure_user(&Contact::new(2, "helper"), "en")
        .await
        .unwrap();

    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "admin:roster", 0).await;
    h.expect_message("whose permissions").await;
    h.send_text(1, "2").await;
    h.expect_message("Toggle permissions").await;
    h.press(1, "perm:edit_products", 0).await;
    h.press(1, "roster:done", 0).await;
    h.expect_message("saved").await;

    let admin = h.store.find_admin(2).await.unwrap().unwrap();
    assert!(admin.edit_products);
    assert!(!admin.is_owner);
}
