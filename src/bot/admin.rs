//! Administrator control panel
//!
//! Inline-keyboard menu driven by callback payloads. Every callback is
//! checked against the configured admin ID before any view is rendered.

use crate::config::ALLOWED_IMAGE_TYPES;
use crate::state::AppState;
use crate::system::{HostMetrics, SystemInfoError};
use crate::utils::{format_duration_dhm, format_file_size_mb, progress_bar};
use html_escape::encode_text;
use std::sync::Arc;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{debug, info, warn};

/// Reply to anyone but the administrator
pub const ADMIN_DENIED_TEXT: &str = "❌ Access denied. Admin only.";

const TOP_USERS_LIMIT: usize = 10;
const BAR_WIDTH: usize = 10;

/// Callback payload sent by an admin keyboard button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    /// `admin_back`
    Back,
    /// `admin_stats`
    Stats,
    /// `admin_users`
    Users,
    /// `admin_system`
    System,
    /// `admin_settings`
    Settings,
    /// `admin_restart`
    Restart,
    /// `admin_clear_logs`
    ClearLogs,
    /// `admin_close`
    Close,
}

impl AdminAction {
    /// Every action, in menu order
    pub const ALL: [Self; 8] = [
        Self::Back,
        Self::Stats,
        Self::Users,
        Self::System,
        Self::Settings,
        Self::Restart,
        Self::ClearLogs,
        Self::Close,
    ];

    /// Parse a callback payload; unknown payloads yield `None`
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.callback_data() == data)
    }

    /// Payload carried by the button
    #[must_use]
    pub const fn callback_data(self) -> &'static str {
        match self {
            Self::Back => "admin_back",
            Self::Stats => "admin_stats",
            Self::Users => "admin_users",
            Self::System => "admin_system",
            Self::Settings => "admin_settings",
            Self::Restart => "admin_restart",
            Self::ClearLogs => "admin_clear_logs",
            Self::Close => "admin_close",
        }
    }
}

/// Screens of the admin panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminView {
    /// Main menu
    Home,
    /// Usage statistics
    Stats,
    /// Most active users
    Users,
    /// Host metrics
    System,
    /// Live configuration
    Settings,
    /// Restart instructions
    Restart,
    /// Log clearing instructions
    ClearLogs,
    /// Panel closed, no keyboard
    Closed,
}

/// Destination view of an action
#[must_use]
pub const fn transition(action: AdminAction) -> AdminView {
    match action {
        AdminAction::Back => AdminView::Home,
        AdminAction::Stats => AdminView::Stats,
        AdminAction::Users => AdminView::Users,
        AdminAction::System => AdminView::System,
        AdminAction::Settings => AdminView::Settings,
        AdminAction::Restart => AdminView::Restart,
        AdminAction::ClearLogs => AdminView::ClearLogs,
        AdminAction::Close => AdminView::Closed,
    }
}

/// HTML text plus optional inline keyboard
#[derive(Debug, Clone)]
pub struct RenderedView {
    /// Message text in HTML parse mode
    pub text: String,
    /// Keyboard; `None` removes it
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// Result of an admin interaction
#[derive(Debug, Clone)]
pub enum AdminReply {
    /// Caller is not the administrator
    Denied,
    /// Payload not understood; leave the message untouched
    Ignored,
    /// Show this view
    Show(RenderedView),
}

/// Main menu keyboard
#[must_use]
pub fn home_keyboard() -> InlineKeyboardMarkup {
    let button = |label: &str, action: AdminAction| {
        InlineKeyboardButton::callback(label.to_string(), action.callback_data())
    };
    InlineKeyboardMarkup::new(vec![
        vec![
            button("📊 Detailed Stats", AdminAction::Stats),
            button("👥 User Info", AdminAction::Users),
        ],
        vec![
            button("🔄 Restart Bot", AdminAction::Restart),
            button("🗑️ Clear Logs", AdminAction::ClearLogs),
        ],
        vec![
            button("⚙️ Bot Settings", AdminAction::Settings),
            button("📋 System Info", AdminAction::System),
        ],
        vec![button("❌ Close", AdminAction::Close)],
    ])
}

/// Single "back" button shown on every non-home view
#[must_use]
pub fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🔙 Back to Admin Panel",
        AdminAction::Back.callback_data(),
    )]])
}

/// Admin panel over the shared state
#[derive(Clone)]
pub struct AdminPanel {
    state: Arc<AppState>,
}

impl AdminPanel {
    /// Create a panel reading from `state`
    #[must_use]
    pub const fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a callback payload from `user_id`.
    pub async fn handle_callback(&self, user_id: i64, data: &str) -> AdminReply {
        if !self.state.settings.is_admin(user_id) {
            warn!("Admin callback '{data}' denied for user {user_id}");
            return AdminReply::Denied;
        }

        let Some(action) = AdminAction::parse(data) else {
            debug!("Ignoring unknown admin callback '{data}'");
            return AdminReply::Ignored;
        };

        let view = transition(action);
        info!("Admin {user_id} opened {view:?}");
        AdminReply::Show(self.render(view).await)
    }

    /// Open a view from a command, e.g. `/admin` or `/stats`.
    pub async fn open(&self, user_id: i64, view: AdminView) -> AdminReply {
        if !self.state.settings.is_admin(user_id) {
            warn!("Admin command denied for user {user_id}");
            return AdminReply::Denied;
        }
        AdminReply::Show(self.render(view).await)
    }

    /// Render `view` from current state
    pub async fn render(&self, view: AdminView) -> RenderedView {
        let text = match view {
            AdminView::Home => {
                return RenderedView {
                    text: "🔧 <b>Admin Control Panel</b>\n\nSelect an option to manage the bot:"
                        .to_string(),
                    keyboard: Some(home_keyboard()),
                }
            }
            AdminView::Closed => {
                return RenderedView {
                    text: "🔧 Admin panel closed.".to_string(),
                    keyboard: None,
                }
            }
            AdminView::Stats => self.stats_text().await,
            AdminView::Users => self.users_text().await,
            AdminView::System => system_text(&HostMetrics::collect().await),
            AdminView::Settings => self.settings_text(),
            AdminView::Restart => "🔄 <b>Restart Bot</b>\n\n\
                 ⚠️ Bot restart functionality requires manual intervention.\n\
                 Please restart the bot process manually."
                .to_string(),
            AdminView::ClearLogs => "🗑️ <b>Clear Logs</b>\n\n\
                 ⚠️ Log clearing requires manual file system access.\n\
                 Please clear log files manually if needed."
                .to_string(),
        };

        RenderedView {
            text,
            keyboard: Some(back_keyboard()),
        }
    }

    async fn stats_text(&self) -> String {
        let counters = &self.state.counters;
        let snapshot = counters.snapshot();
        let active_users = self.state.conversations.active_users().await;
        let total_turns = self.state.conversations.total_turns().await;

        format!(
            "📊 <b>Detailed Bot Statistics</b>\n\n\
             ⏰ <b>Uptime:</b> {}\n\
             🚀 <b>Started:</b> {}\n\n\
             📈 <b>Usage Statistics:</b>\n\
             • Messages Processed: {}\n\
             • Images Analyzed: {}\n\
             • Images Generated: {}\n\
             • Total Errors: {}\n\n\
             👥 <b>User Statistics:</b>\n\
             • Active Users: {active_users}\n\
             • Stored Turns: {total_turns}\n\n\
             💾 <b>Performance:</b>\n\
             • Error Rate: {:.2}%\n\
             • Avg Messages/User: {:.1}",
            format_duration_dhm(counters.uptime()),
            counters.started_at().format("%Y-%m-%d %H:%M:%S"),
            snapshot.messages_processed,
            snapshot.images_analyzed,
            snapshot.images_generated,
            snapshot.errors,
            snapshot.error_rate(),
            snapshot.avg_messages_per_user(active_users),
        )
    }

    async fn users_text(&self) -> String {
        let conversations = &self.state.conversations;
        let top = conversations.top_users(TOP_USERS_LIMIT).await;
        if top.is_empty() {
            return "👥 <b>User Information</b>\n\nNo active users found.".to_string();
        }

        let text = format!(
            "👥 <b>User Information</b>\n\n<b>Active Users:</b> {}\n\n",
            conversations.active_users().await
        );
        let rows: String = top
            .iter()
            .enumerate()
            .map(|(rank, (user_id, turns))| {
                format!(
                    "{}. User ID: <code>{user_id}</code> - {turns} messages\n",
                    rank + 1
                )
            })
            .collect();
        text + &rows
    }

    fn settings_text(&self) -> String {
        let settings = &self.state.settings;
        let formats = ALLOWED_IMAGE_TYPES
            .iter()
            .map(|mime| format_label(mime))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "⚙️ <b>Bot Settings</b>\n\n\
             🔧 <b>Current Configuration:</b>\n\
             • Max Message Length: {} chars\n\
             • Max Image Size: {}MB\n\
             • Rate Limit: {} msgs/{}s\n\
             • Supported Formats: {formats}\n\n\
             📝 <b>Note:</b> Settings are configured via environment variables.",
            settings.max_message_length,
            format_file_size_mb(settings.max_image_size),
            settings.rate_limit_messages,
            settings.rate_limit_window,
        )
    }
}

fn format_label(mime: &str) -> &str {
    match mime {
        "image/jpeg" => "JPEG",
        "image/png" => "PNG",
        "image/webp" => "WebP",
        other => other,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn system_text(metrics: &Result<HostMetrics, SystemInfoError>) -> String {
    let metrics = match metrics {
        Ok(m) => m,
        Err(e) => {
            return format!(
                "📋 <b>System Information</b>\n\nError retrieving system info: {}",
                encode_text(&e.to_string())
            )
        }
    };

    let kernel = metrics.kernel.as_deref().unwrap_or("unknown");
    let load = metrics.load_average.map_or_else(
        || "n/a".to_string(),
        |[one, five, fifteen]| format!("{one:.2} {five:.2} {fifteen:.2}"),
    );
    let memory = metrics.memory;
    let disk = metrics.disk.map_or_else(
        || "• Disk: n/a".to_string(),
        |disk| {
            format!(
                "• Disk: {:.1}% ({:.1}GB / {:.1}GB)\n<code>{}</code>",
                disk.percent,
                disk.used_gb,
                disk.total_gb,
                progress_bar(disk.percent.round() as u64, 100, BAR_WIDTH),
            )
        },
    );

    format!(
        "📋 <b>System Information</b>\n\n\
         🖥️ <b>System:</b>\n\
         • OS: {}\n\
         • Arch: {}\n\
         • Kernel: {}\n\
         • Bot Memory (RSS): {}MB\n\n\
         ⚡ <b>Performance:</b>\n\
         • CPU Usage: {:.1}%\n\
         <code>{}</code>\n\
         • Memory: {:.1}% ({}MB / {}MB)\n\
         <code>{}</code>\n\
         {disk}\n\
         • Load Average: {load}",
        encode_text(&metrics.os),
        metrics.arch,
        encode_text(kernel),
        metrics.process_rss_mb,
        metrics.cpu_percent,
        progress_bar(metrics.cpu_percent.round() as u64, 100, BAR_WIDTH),
        memory.percent,
        memory.used_mb,
        memory.total_mb,
        progress_bar(memory.used_mb, memory.total_mb, BAR_WIDTH),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::conversation::ConversationTurn;
    use crate::system::{DiskUsage, MemoryUsage};
    use teloxide::types::InlineKeyboardButtonKind;

    const ADMIN: i64 = 42;

    fn panel() -> AdminPanel {
        let settings = Settings {
            admin_id: ADMIN,
            ..Settings::default()
        };
        AdminPanel::new(Arc::new(AppState::new(Arc::new(settings))))
    }

    fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
        keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_every_payload_parses_and_transitions() {
        for action in AdminAction::ALL {
            assert_eq!(AdminAction::parse(action.callback_data()), Some(action));
        }
        assert_eq!(transition(AdminAction::Back), AdminView::Home);
        assert_eq!(transition(AdminAction::Close), AdminView::Closed);
        assert_eq!(AdminAction::parse("admin_unknown"), None);
    }

    #[test]
    fn test_home_keyboard_offers_every_destination() {
        let data = callback_data(&home_keyboard());
        assert_eq!(data.len(), 7);
        assert!(!data.contains(&"admin_back".to_string()));
        assert_eq!(callback_data(&back_keyboard()), vec!["admin_back"]);
    }

    #[tokio::test]
    async fn test_non_admin_is_denied() {
        let panel = panel();
        assert!(matches!(
            panel.handle_callback(7, "admin_stats").await,
            AdminReply::Denied
        ));
        assert!(matches!(
            panel.open(7, AdminView::Home).await,
            AdminReply::Denied
        ));
    }

    #[tokio::test]
    async fn test_unknown_payload_ignored() {
        assert!(matches!(
            panel().handle_callback(ADMIN, "something_else").await,
            AdminReply::Ignored
        ));
    }

    #[tokio::test]
    async fn test_back_and_close() {
        let panel = panel();
        let AdminReply::Show(home) = panel.handle_callback(ADMIN, "admin_back").await else {
            panic!("expected home view");
        };
        assert!(home.text.contains("Admin Control Panel"));
        assert!(home.keyboard.is_some());

        let AdminReply::Show(closed) = panel.handle_callback(ADMIN, "admin_close").await else {
            panic!("expected closed view");
        };
        assert_eq!(closed.text, "🔧 Admin panel closed.");
        assert!(closed.keyboard.is_none());
    }

    #[tokio::test]
    async fn test_users_view_lists_top_users() {
        let panel = panel();
        assert!(panel
            .render(AdminView::Users)
            .await
            .text
            .contains("No active users found."));

        let store = &panel.state.conversations;
        for _ in 0..3 {
            store.append(5, ConversationTurn::user("hi")).await;
        }
        store.append(9, ConversationTurn::user("hi")).await;

        let view = panel.render(AdminView::Users).await;
        assert!(view.text.contains("<b>Active Users:</b> 2"));
        assert!(view.text.contains("1. User ID: <code>5</code> - 3 messages"));
        assert!(view.text.contains("2. User ID: <code>9</code> - 1 messages"));
    }

    #[tokio::test]
    async fn test_stats_and_settings_views() {
        let panel = panel();
        panel.state.counters.record_message();
        panel.state.counters.record_error();

        let stats = panel.render(AdminView::Stats).await.text;
        assert!(stats.contains("Messages Processed: 1"));
        assert!(stats.contains("Error Rate: 100.00%"));

        let settings = panel.render(AdminView::Settings).await.text;
        assert!(settings.contains("Max Message Length: 4096 chars"));
        assert!(settings.contains("Max Image Size: 20MB"));
        assert!(settings.contains("Rate Limit: 10 msgs/60s"));
        assert!(settings.contains("JPEG, PNG, WebP"));
    }

    #[test]
    fn test_system_text_is_fail_soft() {
        let text = system_text(&Err(SystemInfoError::Parse("/proc/stat")));
        assert!(text.contains("Error retrieving system info"));

        let metrics = HostMetrics {
            os: "Debian <12>".to_string(),
            arch: "x86_64",
            kernel: Some("6.1.0".to_string()),
            cpu_percent: 50.0,
            memory: MemoryUsage {
                used_mb: 512,
                total_mb: 1024,
                percent: 50.0,
            },
            disk: Some(DiskUsage {
                used_gb: 30.0,
                total_gb: 40.0,
                percent: 75.0,
            }),
            load_average: Some([0.5, 0.25, 0.1]),
            process_rss_mb: 12,
        };
        let text = system_text(&Ok(metrics.clone()));
        assert!(text.contains("Debian &lt;12&gt;"));
        assert!(text.contains("█████░░░░░ 50%"));
        assert!(text.contains("• Disk: 75.0% (30.0GB / 40.0GB)"));
        assert!(text.contains("███████░░░ 75%"));
        assert!(text.contains("Load Average: 0.50 0.25 0.10"));

        let text = system_text(&Ok(HostMetrics {
            disk: None,
            ..metrics
        }));
        assert!(text.contains("• Disk: n/a"));
    }
}
