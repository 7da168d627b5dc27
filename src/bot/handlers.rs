use crate::bot::admin::{AdminPanel, AdminReply, AdminView, RenderedView, ADMIN_DENIED_TEXT};
use crate::bot::dispatch::{DispatchController, ImageRequest, Outcome};
use crate::bot::messaging::{edit_markdown, edit_plain, send_markdown};
use crate::bot::views::{
    help_message, welcome_message, ANALYZING_PLACEHOLDER, GENERATING_PLACEHOLDER,
};
use crate::utils::truncate_text;
use anyhow::Result;
use teloxide::{
    net::Download,
    prelude::*,
    types::{ChatAction, ChatId, FileId, InputFile, MessageId, ParseMode},
    utils::command::BotCommands,
};
use tracing::{debug, info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage help
    #[command(description = "Show help.")]
    Help,
    /// Generate an image from the rest of the line
    #[command(description = "Generate an image.")]
    Generate(String),
    /// Show bot status
    #[command(description = "Show bot status.")]
    Status,
    /// Clear conversation context
    #[command(description = "Clear conversation context.")]
    Clear,
    /// Open the admin panel
    #[command(description = "Admin panel.")]
    Admin,
    /// Show detailed statistics (admin only)
    #[command(description = "Detailed statistics.")]
    Stats,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn get_first_name(msg: &Message) -> &str {
    msg.from
        .as_ref()
        .map_or("there", |u| u.first_name.as_str())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, controller: DispatchController) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} initiated /start command.");

    let is_admin = controller.state().settings.is_admin(user_id);
    bot.send_message(msg.chat.id, welcome_message(get_first_name(&msg), is_admin))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Help handler
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, help_message())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Status handler
///
/// # Errors
///
/// Returns an error if the status message cannot be sent.
pub async fn status(bot: Bot, msg: Message, controller: DispatchController) -> Result<()> {
    info!("Status command received from user {}.", get_user_id_safe(&msg));
    bot.send_message(msg.chat.id, controller.status_text()).await?;
    Ok(())
}

/// Clear context handler
///
/// # Errors
///
/// Returns an error if the confirmation cannot be sent.
pub async fn clear(bot: Bot, msg: Message, controller: DispatchController) -> Result<()> {
    let text = controller.clear(get_user_id_safe(&msg)).await;
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// `/admin` and `/stats` handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn admin(bot: Bot, msg: Message, panel: AdminPanel, view: AdminView) -> Result<()> {
    match panel.open(get_user_id_safe(&msg), view).await {
        AdminReply::Show(RenderedView { text, keyboard }) => {
            let request = bot
                .send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html);
            match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await?,
                None => request.await?,
            };
        }
        AdminReply::Denied => {
            bot.send_message(msg.chat.id, ADMIN_DENIED_TEXT).await?;
        }
        AdminReply::Ignored => {}
    }
    Ok(())
}

/// Text message handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_text(bot: Bot, msg: Message, controller: DispatchController) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let text = msg.text().unwrap_or_default();
    info!(
        "Handling message from user {user_id}. Text: '{}'",
        truncate_text(text, 100, "...")
    );

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    let outcome = controller.handle_text(user_id, text).await;
    controller
        .settle(user_id, outcome, |o| deliver(&bot, msg.chat.id, None, o))
        .await
}

/// Photo message handler
///
/// # Errors
///
/// Returns an error if the placeholder or the reply cannot be sent.
pub async fn handle_photo(bot: Bot, msg: Message, controller: DispatchController) -> Result<()> {
    let Some(photo) = msg.photo().and_then(<[_]>::last) else {
        return Ok(());
    };
    let request = ImageRequest {
        declared_size: Some(u64::from(photo.file.size)),
        mime_type: None,
        caption: msg.caption().map(ToString::to_string),
    };
    analyze(bot, &msg, controller, request, photo.file.id.clone()).await
}

/// Image sent as a document
///
/// # Errors
///
/// Returns an error if the placeholder or the reply cannot be sent.
pub async fn handle_image_document(
    bot: Bot,
    msg: Message,
    controller: DispatchController,
) -> Result<()> {
    let Some(document) = msg.document() else {
        return Ok(());
    };
    let request = ImageRequest {
        declared_size: Some(u64::from(document.file.size)),
        mime_type: document.mime_type.as_ref().map(ToString::to_string),
        caption: msg.caption().map(ToString::to_string),
    };
    analyze(bot, &msg, controller, request, document.file.id.clone()).await
}

async fn analyze(
    bot: Bot,
    msg: &Message,
    controller: DispatchController,
    request: ImageRequest,
    file_id: FileId,
) -> Result<()> {
    let user_id = get_user_id_safe(msg);
    info!("Image received from user {user_id}.");

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    let placeholder = bot
        .send_message(msg.chat.id, ANALYZING_PLACEHOLDER)
        .await?;

    let downloader = bot.clone();
    let outcome = controller
        .handle_image(user_id, request, move || async move {
            let file = downloader.get_file(file_id).await?;
            let mut buf = Vec::new();
            downloader.download_file(&file.path, &mut buf).await?;
            debug!("Downloaded {} bytes", buf.len());
            Ok::<_, anyhow::Error>(buf)
        })
        .await;

    controller
        .settle(user_id, outcome, |o| {
            deliver(&bot, msg.chat.id, Some(placeholder.id), o)
        })
        .await
}

/// `/generate` handler
///
/// # Errors
///
/// Returns an error if the placeholder or the reply cannot be sent.
pub async fn generate(
    bot: Bot,
    msg: Message,
    controller: DispatchController,
    prompt: String,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("Image generation requested by user {user_id}.");

    bot.send_chat_action(msg.chat.id, ChatAction::UploadPhoto)
        .await?;
    let placeholder = bot
        .send_message(msg.chat.id, GENERATING_PLACEHOLDER)
        .await?;

    let outcome = controller.handle_generate(user_id, &prompt).await;
    let is_photo = matches!(outcome, Outcome::Photo { .. });
    let delivered = controller
        .settle(user_id, outcome, |o| {
            deliver(&bot, msg.chat.id, Some(placeholder.id), o)
        })
        .await;

    match delivered {
        Ok(()) if is_photo => {
            if let Err(e) = bot.delete_message(msg.chat.id, placeholder.id).await {
                warn!("Could not remove generation placeholder: {e}");
            }
            Ok(())
        }
        Ok(()) => Ok(()),
        Err(e) if is_photo => {
            let text = format!("❌ Error generating image: {e}");
            edit_plain(&bot, msg.chat.id, placeholder.id, &text).await
        }
        Err(e) => Err(e),
    }
}

/// Send `outcome`, editing `placeholder` in place when given.
async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    placeholder: Option<MessageId>,
    outcome: Outcome,
) -> Result<()> {
    match (outcome, placeholder) {
        (
            Outcome::Reply(text) | Outcome::Analysis(text) | Outcome::Failed(text),
            Some(msg_id),
        ) => edit_markdown(bot, chat_id, msg_id, &text).await,
        (Outcome::Reply(text) | Outcome::Analysis(text) | Outcome::Failed(text), None) => {
            send_markdown(bot, chat_id, &text).await
        }
        (Outcome::Rejected(rejection), Some(msg_id)) => {
            edit_plain(bot, chat_id, msg_id, rejection.message()).await
        }
        (Outcome::Rejected(rejection), None) => {
            bot.send_message(chat_id, rejection.message()).await?;
            Ok(())
        }
        (
            Outcome::Photo {
                image,
                caption,
                file_name,
            },
            _,
        ) => {
            bot.send_photo(chat_id, InputFile::memory(image).file_name(file_name))
                .caption(caption)
                .await?;
            Ok(())
        }
    }
}

/// Admin panel callback handler
///
/// # Errors
///
/// Returns an error if the callback cannot be answered or the view edited.
pub async fn handle_admin_callback(bot: Bot, q: CallbackQuery, panel: AdminPanel) -> Result<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let (chat_id, msg_id) = (message.chat().id, message.id());
    let data = q.data.as_deref().unwrap_or_default();

    match panel.handle_callback(q.from.id.0.cast_signed(), data).await {
        AdminReply::Denied => edit_plain(&bot, chat_id, msg_id, ADMIN_DENIED_TEXT).await,
        AdminReply::Ignored => Ok(()),
        AdminReply::Show(RenderedView { text, keyboard }) => {
            let request = bot
                .edit_message_text(chat_id, msg_id, text)
                .parse_mode(ParseMode::Html);
            match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await?,
                None => request.await?,
            };
            Ok(())
        }
    }
}
