/// Admin control panel
pub mod admin;
/// Transport-agnostic event orchestration
pub mod dispatch;
/// Command and message handlers
pub mod handlers;
/// MarkdownV2 sending with plain-text fallback
pub mod messaging;
/// Dispatcher setup
pub mod runner;
/// Static texts
pub mod views;

pub use admin::AdminPanel;
pub use dispatch::DispatchController;
