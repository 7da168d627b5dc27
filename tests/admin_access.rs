mod common;

use common::{chat, settings, state_with, EchoProvider, ADMIN_ID};
use gemini_relay::bot::admin::{AdminAction, AdminReply, AdminView};
use gemini_relay::bot::{AdminPanel, DispatchController};
use gemini_relay::config::Settings;
use std::sync::Arc;

const STRANGER: i64 = 7;

const ALL_VIEWS: [AdminView; 8] = [
    AdminView::Home,
    AdminView::Stats,
    AdminView::Users,
    AdminView::System,
    AdminView::Settings,
    AdminView::Restart,
    AdminView::ClearLogs,
    AdminView::Closed,
];

#[tokio::test]
async fn non_admin_is_denied_everywhere() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));
    chat(&controller, STRANGER, "hello").await;
    let before = state.counters.snapshot();

    let panel = AdminPanel::new(state.clone());
    for action in AdminAction::ALL {
        let reply = panel.handle_callback(STRANGER, action.callback_data()).await;
        assert!(matches!(reply, AdminReply::Denied), "{action:?} was not denied");
    }
    assert!(matches!(
        panel.handle_callback(STRANGER, "admin_anything").await,
        AdminReply::Denied
    ));
    for view in ALL_VIEWS {
        assert!(matches!(
            panel.open(STRANGER, view).await,
            AdminReply::Denied
        ));
    }

    assert_eq!(state.counters.snapshot(), before);
    assert_eq!(state.conversations.history(STRANGER).await.len(), 2);
}

#[tokio::test]
async fn unset_admin_id_admits_nobody() {
    let state = state_with(Settings {
        admin_id: 0,
        ..settings()
    });
    let panel = AdminPanel::new(state);

    assert!(matches!(
        panel.handle_callback(0, "admin_stats").await,
        AdminReply::Denied
    ));
}

#[tokio::test]
async fn admin_sees_live_statistics() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));
    chat(&controller, 100, "one").await;
    chat(&controller, 100, "two").await;
    chat(&controller, 200, "three").await;

    let panel = AdminPanel::new(state);

    let AdminReply::Show(stats) = panel.handle_callback(ADMIN_ID, "admin_stats").await else {
        panic!("expected stats view");
    };
    assert!(stats.text.contains("Messages Processed: 3"));
    assert!(stats.text.contains("Active Users: 2"));
    assert!(stats.keyboard.is_some());

    let AdminReply::Show(users) = panel.open(ADMIN_ID, AdminView::Users).await else {
        panic!("expected users view");
    };
    let first = users.text.find("100").expect("user 100 listed");
    let second = users.text.find("200").expect("user 200 listed");
    assert!(first < second, "users not ordered by activity");
}

#[tokio::test]
async fn settings_view_shows_configured_limits() {
    let state = state_with(Settings {
        rate_limit_messages: 5,
        rate_limit_window: 30,
        ..settings()
    });
    let panel = AdminPanel::new(state);

    let AdminReply::Show(view) = panel.handle_callback(ADMIN_ID, "admin_settings").await else {
        panic!("expected settings view");
    };
    assert!(view.text.contains("Rate Limit: 5 msgs/30s"));
}
