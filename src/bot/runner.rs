use crate::bot;
use crate::bot::admin::{AdminPanel, AdminView};
use crate::bot::dispatch::DispatchController;
use crate::bot::handlers::Command;
use crate::llm::LlmProvider;
use crate::state::AppState;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info};

/// Run the Telegram long-polling dispatcher until Ctrl-C.
pub async fn run_bot(state: Arc<AppState>, llm: Arc<dyn LlmProvider>) {
    let bot = Bot::new(state.settings.telegram_bot_token.clone());
    let controller = DispatchController::new(state.clone(), llm);
    let panel = AdminPanel::new(state);
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller, panel])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot dispatcher stopped.");
}

/// Routing tree: admin callbacks, commands, photos, image documents, text.
#[must_use]
pub fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| {
                    q.data.as_deref().is_some_and(|d| d.starts_with("admin_"))
                })
                .endpoint(handle_admin_callback),
        )
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.photo().is_some())
                        .endpoint(handle_photo),
                )
                .branch(
                    dptree::filter(|msg: Message| {
                        msg.document()
                            .and_then(|d| d.mime_type.as_ref())
                            .is_some_and(|m| m.essence_str().starts_with("image/"))
                    })
                    .endpoint(handle_image_document),
                )
                .branch(dptree::filter(|msg: Message| is_chat_text(&msg)).endpoint(handle_text)),
        )
}

/// Plain text for the AI. Unknown `/commands` are left unhandled.
fn is_chat_text(msg: &Message) -> bool {
    msg.text().is_some_and(|text| !text.starts_with('/'))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    controller: DispatchController,
    panel: AdminPanel,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, controller).await,
        Command::Help => bot::handlers::help(bot, msg).await,
        Command::Generate(prompt) => bot::handlers::generate(bot, msg, controller, prompt).await,
        Command::Status => bot::handlers::status(bot, msg, controller).await,
        Command::Clear => bot::handlers::clear(bot, msg, controller).await,
        Command::Admin => bot::handlers::admin(bot, msg, panel, AdminView::Home).await,
        Command::Stats => bot::handlers::admin(bot, msg, panel, AdminView::Stats).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    controller: DispatchController,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_text(bot, msg, controller).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_photo(
    bot: Bot,
    msg: Message,
    controller: DispatchController,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_photo(bot, msg, controller).await {
        error!("Photo handler error: {}", e);
    }
    respond(())
}

async fn handle_image_document(
    bot: Bot,
    msg: Message,
    controller: DispatchController,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_image_document(bot, msg, controller).await {
        error!("Document handler error: {}", e);
    }
    respond(())
}

async fn handle_admin_callback(
    bot: Bot,
    q: CallbackQuery,
    panel: AdminPanel,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_admin_callback(bot, q, panel).await {
        error!("Admin callback handler error: {}", e);
    }
    respond(())
}
