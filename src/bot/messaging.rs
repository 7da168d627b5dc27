//! Sending and editing formatted replies
//!
//! Replies produced by the formatter are MarkdownV2. If Telegram still
//! rejects the markup, the text is resent without a parse mode.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use teloxide::RequestError;
use tracing::{debug, warn};

const ERROR_NOT_MODIFIED: &str = "message is not modified";

/// Send MarkdownV2 text, falling back to plain text on a parse error.
///
/// # Errors
///
/// Returns an error if both attempts fail.
pub async fn send_markdown(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    match bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .await
    {
        Ok(_) => Ok(()),
        Err(RequestError::Api(e)) => {
            warn!("MarkdownV2 send rejected ({e}), retrying as plain text");
            bot.send_message(chat_id, text).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the text of `msg_id` with MarkdownV2 text, falling back to plain text.
///
/// # Errors
///
/// Returns an error if both attempts fail for a reason other than the
/// message being unchanged.
pub async fn edit_markdown(bot: &Bot, chat_id: ChatId, msg_id: MessageId, text: &str) -> Result<()> {
    let first = bot
        .edit_message_text(chat_id, msg_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .await;

    match first {
        Ok(_) => Ok(()),
        Err(RequestError::Api(e)) => {
            if e.to_string().contains(ERROR_NOT_MODIFIED) {
                debug!("Message update skipped: {e}");
                return Ok(());
            }
            warn!("MarkdownV2 edit rejected ({e}), retrying as plain text");
            edit_plain(bot, chat_id, msg_id, text).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the text of `msg_id` without a parse mode.
///
/// # Errors
///
/// Returns an error if the edit fails for a reason other than the message
/// being unchanged.
pub async fn edit_plain(bot: &Bot, chat_id: ChatId, msg_id: MessageId, text: &str) -> Result<()> {
    match bot.edit_message_text(chat_id, msg_id, text).await {
        Ok(_) => Ok(()),
        Err(e) if e.to_string().contains(ERROR_NOT_MODIFIED) => {
            debug!("Message update skipped: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
