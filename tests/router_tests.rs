mod common;

use common::{Harness, default_config};
use tillbot::infrastructure::transport::Outbound;

fn greetings(h: &Harness) -> usize {
    h.transport
        .calls()
        .iter()
        .filter(|call| {
            matches!(
                call,
                Outbound::Message { text, .. } if text.contains("What would you like to do?")
            )
        })
        .count()
}

/// Events for a chat with no live conversation get a pointer to the restart
/// trigger instead of disappearing.
#[tokio::test]
async fn test_event_without_worker_gets_a_notice() {
    let mut h = Harness::new(default_config());
    h.send_text(3, "hello?").await;
    h.expect_message("No active conversation").await;
}

/// The restart trigger replaces the chat's worker; the old one winds down
/// silently and only the new greeting appears.
#[tokio::test]
async fn test_restart_replaces_the_worker() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;

    h.send_text(1, "/start").await;
    for _ in 0..200 {
        if greetings(&h) >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(greetings(&h), 2);
    assert_eq!(h.router.active_workers(), 1);

    // No wind-down notice from the replaced worker.
    assert!(!h.transport.calls().iter().any(|call| {
        matches!(call, Outbound::Message { text, .. } if text.contains("expired") || text.contains("closing"))
    }));
}

/// Restarts are per chat; another chat's conversation is untouched.
#[tokio::test]
async fn test_restart_is_scoped_to_one_chat() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.send_text(2, "/start").await;
    for _ in 0..200 {
        if greetings(&h) >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(h.router.active_workers(), 2);

    h.send_text(1, "/start").await;
    assert_eq!(h.router.active_workers(), 2);
}

/// Shutdown stops every worker cooperatively; each sends its closing notice
/// before the router returns.
#[tokio::test]
async fn test_shutdown_drains_all_workers() {
    let mut h = Harness::new(default_config());
    h.send_text(1, "/start").await;
    h.send_text(2, "/start").await;
    for _ in 0..200 {
        if greetings(&h) >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    h.router.shutdown().await;
    assert_eq!(h.router.active_workers(), 0);
    let closing = h
        .transport
        .calls()
        .iter()
        .filter(|call| {
            matches!(call, Outbound::Message { text, .. } if text.contains("closing"))
        })
        .count();
    assert_eq!(closing, 2);
}

/// A text message matching the cancel caption acts as the cancel gesture.
#[tokio::test]
async fn test_cancel_caption_text_cancels() {
    let mut h = Harness::new(default_config());
    h.seed_product("Widget", 500).await;
    h.send_text(1, "/start").await;
    h.expect_message("What would you like to do?").await;
    h.press(1, "menu:order", 0).await;
    h.message_id_of("Widget").await;

    h.send_text(1, "🔙 Cancel").await;
    h.expect_message("Order cancelled").await;
}
