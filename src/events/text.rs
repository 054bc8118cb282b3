//! Free text, routed by the user's pending action.

use teloxide::prelude::*;

use super::media::start_job;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::media::NameStrategy;
use crate::plugins::broadcast::{self, BroadcastContent};
use crate::plugins::{format, keyboards, metadata, sender_id};
use crate::session::PendingAction;
use crate::template;
use crate::utils::{html_escape, reply_html, reply_menu, validate_filename};

pub async fn text_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);
    let text = msg.text().unwrap_or("").trim();

    // Commands the command handler did not recognize
    if text.starts_with('/') {
        reply_html(&bot, &msg, "❓ Unknown command. See /help.").await?;
        return Ok(());
    }

    match state.sessions.take(user_id) {
        Some(PendingAction::AwaitingFilename(file)) => {
            if let Err(reason) = validate_filename(text) {
                state.sessions.set(user_id, PendingAction::AwaitingFilename(file));
                reply_html(&bot, &msg, format!("❌ {}\nSend another name or /clear.", html_escape(reason)))
                    .await?;
                return Ok(());
            }
            start_job(&bot, &state, msg.chat.id, user_id, file, NameStrategy::Manual(text.to_string()))
                .await?;
        }
        Some(PendingAction::AwaitingFormat) => {
            if template::validate(text).is_err() {
                state.sessions.set(user_id, PendingAction::AwaitingFormat);
            }
            let reply = format::set_format(&state, user_id, text).await?;
            reply_html(&bot, &msg, reply).await?;
        }
        Some(PendingAction::AwaitingTemplateSave(name)) => {
            let reply = format::save_template(&state, user_id, &name, text).await?;
            reply_html(&bot, &msg, reply).await?;
        }
        Some(PendingAction::AwaitingThumbnail) => {
            state.sessions.set(user_id, PendingAction::AwaitingThumbnail);
            reply_html(&bot, &msg, "📷 Please send a photo, or /clear to cancel.").await?;
        }
        Some(PendingAction::AwaitingBroadcast) => {
            if !state.permissions.is_authorized(user_id).await? {
                reply_html(&bot, &msg, "⛔ Only bot admins can broadcast.").await?;
                return Ok(());
            }
            let content = BroadcastContent::Text(broadcast::signed_text(text));
            broadcast::start_broadcast(bot, state, msg.chat.id, user_id, content).await?;
        }
        Some(PendingAction::AwaitingMetadata(field)) => {
            let reply = metadata::set_field(&state, user_id, field, text).await?;
            reply_html(&bot, &msg, reply).await?;
        }
        None => {
            let authorized = state.permissions.is_authorized(user_id).await.unwrap_or(false);
            reply_menu(
                &bot,
                &msg,
                "💡 Send me a document, video or audio file to rename it, or use the menu below.",
                keyboards::main_menu(authorized),
            )
            .await?;
        }
    }
    Ok(())
}
