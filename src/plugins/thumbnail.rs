//! Custom thumbnail commands and the `thumb:*` callbacks.

use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};

use super::{callback_value, keyboards, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::UserSettings;
use crate::session::PendingAction;
use crate::utils::{reply_html, show_menu};

const NO_THUMBNAIL: &str = "🖼 You have no custom thumbnail. Send me a photo to set one.";

pub fn thumbnail_text(settings: &UserSettings) -> String {
    let custom = if settings.thumbnail_file_id.is_some() { "set" } else { "none" };
    let auto = if settings.auto_thumbnail { "ON" } else { "OFF" };
    format!(
        "<b>🖼 Thumbnail</b>\n\n\
         Custom thumbnail: <b>{custom}</b>\n\
         Auto thumbnail for videos: <b>{auto}</b>\n\n\
         A custom thumbnail is used for every file. Without one, a frame \
         from the video is used when auto thumbnail is on.\n\
         Send me a photo at any time to set it."
    )
}

async fn send_thumbnail(bot: &ThrottledBot, chat_id: ChatId, file_id: &str) -> anyhow::Result<()> {
    bot.send_photo(chat_id, InputFile::file_id(file_id))
        .caption("🖼 Your custom thumbnail")
        .await?;
    Ok(())
}

/// Handle /viewthumb.
pub async fn viewthumb_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let settings = state.settings.get(sender_id(&msg)).await?;
    match settings.thumbnail_file_id {
        Some(file_id) => send_thumbnail(&bot, msg.chat.id, &file_id).await?,
        None => {
            reply_html(&bot, &msg, NO_THUMBNAIL).await?;
        }
    }
    Ok(())
}

/// Handle /delthumb.
pub async fn delthumb_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);
    let had = state.settings.get(user_id).await?.thumbnail_file_id.is_some();

    let text = if had {
        state.settings.update(user_id, |s| s.thumbnail_file_id = None).await?;
        "🗑 Custom thumbnail removed."
    } else {
        NO_THUMBNAIL
    };
    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle `thumb:*` callbacks.
pub async fn thumbnail_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let user_id = q.from.id.0;
    let mut notice: Option<&str> = None;

    match callback_value(&q, "thumb:") {
        "custom" => {
            state.sessions.set(user_id, PendingAction::AwaitingThumbnail);
            notice = Some("Send me a photo");
        }
        "view" => match state.settings.get(user_id).await?.thumbnail_file_id {
            Some(file_id) => send_thumbnail(&bot, ChatId::from(q.from.id), &file_id).await?,
            None => notice = Some("No custom thumbnail"),
        },
        "delete" => {
            let updated = state
                .settings
                .update(user_id, |s| s.thumbnail_file_id = None)
                .await?;
            show_menu(&bot, &q, thumbnail_text(&updated), keyboards::thumbnail_menu(false)).await?;
            notice = Some("Thumbnail removed");
        }
        _ => {}
    }

    let mut answer = bot.answer_callback_query(q.id);
    if let Some(text) = notice {
        answer = answer.text(text);
    }
    answer.await?;
    Ok(())
}
