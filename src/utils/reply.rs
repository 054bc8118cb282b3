//! Reply helper utilities.
//!
//! Provides consistent reply and menu-edit behavior across all handlers.

use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode, ReplyParameters};

use crate::bot::dispatcher::ThrottledBot;

/// Reply to `msg` with HTML text.
pub async fn reply_html(
    bot: &ThrottledBot,
    msg: &Message,
    text: impl Into<String>,
) -> Result<Message, RequestError> {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await
}

/// Reply to `msg` with HTML text and an inline keyboard.
pub async fn reply_menu(
    bot: &ThrottledBot,
    msg: &Message,
    text: impl Into<String>,
    keyboard: InlineKeyboardMarkup,
) -> Result<Message, RequestError> {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .reply_markup(keyboard)
        .await
}

/// Replace the menu a callback came from.
///
/// Photo messages (the welcome image) get their caption edited. When the
/// original message is gone a fresh message is sent instead.
pub async fn show_menu(
    bot: &ThrottledBot,
    q: &CallbackQuery,
    text: impl Into<String>,
    keyboard: InlineKeyboardMarkup,
) -> Result<(), RequestError> {
    let text = text.into();

    let Some(message) = q.regular_message() else {
        bot.send_message(q.from.id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
        return Ok(());
    };

    let edited = if message.photo().is_some() {
        bot.edit_message_caption(message.chat.id, message.id)
            .caption(text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await
    } else {
        bot.edit_message_text(message.chat.id, message.id, text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await
    };

    match edited {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(_) => {
            bot.send_message(message.chat.id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            Ok(())
        }
    }
}
