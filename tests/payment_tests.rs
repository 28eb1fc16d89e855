mod common;

use common::{Harness, default_config};
use tillbot::domain::ports::ShopStore;
use tillbot::error::EngineError;
use tillbot::infrastructure::transport::Outbound;

fn outstanding_invoice(h: &Harness) -> Option<(String, i64)> {
    h.transport.calls().into_iter().find_map(|call| match call {
        Outbound::Invoice { invoice, .. } => Some((invoice.payload.clone(), invoice.total())),
        _ => None,
    })
}

/// A 500 top-up with a 5% card fee invoices 525, and the confirmed charged
/// amount is recorded verbatim as the transaction value.
#[tokio::test]
async fn test_confirmed_amount_is_recorded_verbatim() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;

    h.press(1, "menu:add_credit", 0).await;
    h.expect_message("Choose an amount").await;
    h.send_text(1, "5.00").await;

    let invoice = h
        .wait_for_outbound("refill invoice", |call| {
            matches!(call, Outbound::Invoice { .. })
        })
        .await;
    let (payload, total) = match invoice {
        Outbound::Invoice { invoice, .. } => (invoice.payload.clone(), invoice.total()),
        _ => unreachable!(),
    };
    assert_eq!(total, 525);

    h.send_precheckout(1, &payload, total)
        .await
        .expect("matching pre-checkout accepted");
    h.wait_for_outbound("pre-checkout approval", |call| {
        matches!(call, Outbound::PrecheckoutAnswer { ok: true, .. })
    })
    .await;

    h.send_payment(1, &payload, 525).await;
    h.expect_message("Payment received").await;

    let ledger = h.store.list_transactions().await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].value, 525);
    assert_eq!(ledger[0].provider_charge_id.as_deref(), Some("ch_test"));
    assert_eq!(h.store.credit_of(1).await.unwrap(), 525);
}

/// A pre-checkout confirmation whose token does not match the outstanding
/// invoice is answered negatively and never recorded.
#[tokio::test]
async fn test_mismatched_precheckout_is_rejected() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;

    h.press(1, "menu:add_credit", 0).await;
    h.expect_message("Choose an amount").await;
    h.send_text(1, "10.00").await;
    h.wait_for_outbound("refill invoice", |call| {
        matches!(call, Outbound::Invoice { .. })
    })
    .await;
    assert!(outstanding_invoice(&h).is_some());

    let err = h.send_precheckout(1, "stale-token", 9999).await.unwrap_err();
    assert!(matches!(err, EngineError::PaymentMismatch(_)));
    h.wait_for_outbound("rejection", |call| {
        matches!(call, Outbound::PrecheckoutAnswer { ok: false, .. })
    })
    .await;
    assert!(h.store.list_transactions().await.unwrap().is_empty());
}

/// With no conversation at all, a pre-checkout confirmation is rejected at
/// the router.
#[tokio::test]
async fn test_precheckout_without_worker_is_rejected() {
    let mut h = Harness::new(default_config());
    let err = h.send_precheckout(7, "anything", 100).await.unwrap_err();
    assert!(matches!(err, EngineError::PaymentMismatch(_)));
    h.wait_for_outbound("rejection", |call| {
        matches!(call, Outbound::PrecheckoutAnswer { ok: false, .. })
    })
    .await;
}

/// Cancelling at the pre-checkout wait abandons the top-up cleanly.
#[tokio::test]
async fn test_top_up_cancelled_before_confirmation() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;

    h.press(1, "menu:add_credit", 0).await;
    h.expect_message("Choose an amount").await;
    h.press(1, "credit:1000", 0).await;
    h.wait_for_outbound("refill invoice", |call| {
        matches!(call, Outbound::Invoice { .. })
    })
    .await;

    h.press(1, "cancel", 0).await;
    h.expect_message("Top-up cancelled").await;
    assert!(h.store.list_transactions().await.unwrap().is_empty());

    // The stale invoice token no longer matches anything.
    let err = h.send_precheckout(1, "whatever", 1000).await.unwrap_err();
    assert!(matches!(err, EngineError::PaymentMismatch(_)));
    h.wait_for_outbound("rejection", |call| {
        matches!(call, Outbound::PrecheckoutAnswer { ok: false, .. })
    })
    .await;
}

/// Typed amounts outside the configured range are re-prompted, not invoiced.
#[tokio::test]
async fn test_out_of_range_amount_reprompted() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;

    h.press(1, "menu:add_credit", 0).await;
    h.expect_message("Choose an amount").await;
    h.send_text(1, "0.50").await;
    h.expect_message("not a valid amount").await;
    assert!(outstanding_invoice(&h).is_none());
}
