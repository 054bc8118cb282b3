//! /start, /help and the main menu.

use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode, ReplyParameters};
use tracing::warn;

use super::keyboards;
use super::{callback_value, format, metadata, sender_id, settings, stats, thumbnail};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::{html_escape, reply_menu, show_menu};

/// Welcome text for the main menu.
pub fn welcome_text(first_name: &str) -> String {
    format!(
        "👋 <b>Hi {}!</b>\n\n\
         I rename your files using templates, set custom thumbnails and \
         write metadata into your media.\n\n\
         📤 Just send me a document, video or audio file.\n\
         ⚙️ Use the buttons below to configure me.",
        html_escape(first_name)
    )
}

pub const HELP_TEXT: &str = "<b>📖 How to use</b>\n\n\
<b>Renaming</b>\n\
Send a file. In <b>auto</b> mode it is renamed with your format template; \
in <b>manual</b> mode I ask you for a name.\n\n\
<b>Format templates</b>\n\
/format <code>{title} - {artist}</code> sets a template.\n\
Variables: <code>{title}</code> <code>{artist}</code> <code>{author}</code> \
<code>{album}</code> <code>{genre}</code> <code>{year}</code> <code>{audio}</code> \
<code>{video}</code> <code>{codec}</code> <code>{resolution}</code> \
<code>{duration}</code> <code>{size}</code> <code>{filename}</code> \
<code>{ext}</code> <code>{season}</code> <code>{episode}</code> <code>{quality}</code>\n\
/savefmt <code>name template</code>, /templates, /usefmt, /delfmt manage saved templates.\n\n\
<b>Thumbnails</b>\n\
Send a photo to set a custom thumbnail. /viewthumb shows it, /delthumb removes it.\n\n\
<b>Metadata</b>\n\
/metadata on|off toggles writing tags. /setmeta <code>field value</code> sets one \
(title, author, artist, audio, subtitle, video); <code>-</code> clears it.\n\n\
<b>Other</b>\n\
/mode, /set_media, /settings, /stats, /leaderboard\n\
/clear cancels a pending action or a running job.";

/// Handle the /start command.
pub async fn start_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);
    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("there");
    let text = welcome_text(first_name);
    let authorized = state.permissions.is_authorized(user_id).await.unwrap_or(false);
    let keyboard = keyboards::main_menu(authorized);

    if let Some(image) = state.config.welcome_image.as_ref().filter(|p| p.exists()) {
        let sent = bot
            .send_photo(msg.chat.id, InputFile::file(image.clone()))
            .caption(text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .reply_parameters(ReplyParameters::new(msg.id))
            .await;
        match sent {
            Ok(_) => return Ok(()),
            Err(e) => warn!("Welcome image could not be sent: {}", e),
        }
    }

    reply_menu(&bot, &msg, text, keyboard).await?;
    Ok(())
}

/// Handle the /help command.
pub async fn help_command(bot: ThrottledBot, msg: Message, _args: String) -> anyhow::Result<()> {
    reply_menu(&bot, &msg, HELP_TEXT, keyboards::back_to_main()).await?;
    Ok(())
}

/// Handle `menu:*` callbacks.
pub async fn menu_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let user_id = q.from.id.0;

    match callback_value(&q, "menu:") {
        "main" => {
            let authorized = state.permissions.is_authorized(user_id).await.unwrap_or(false);
            show_menu(&bot, &q, welcome_text(&q.from.first_name), keyboards::main_menu(authorized))
                .await?;
        }
        "help" => show_menu(&bot, &q, HELP_TEXT, keyboards::back_to_main()).await?,
        "settings" => {
            let current = state.settings.get(user_id).await?;
            show_menu(&bot, &q, settings::settings_text(&current), keyboards::settings_menu(&current))
                .await?;
        }
        "stats" => {
            let text = stats::user_stats_text(&state, user_id).await?;
            show_menu(&bot, &q, text, keyboards::back_to_main()).await?;
        }
        "leaderboard" => {
            let text = stats::leaderboard_text(&state).await?;
            show_menu(&bot, &q, text, keyboards::back_to_main()).await?;
        }
        "format" => {
            let current = state.settings.get(user_id).await?;
            show_menu(&bot, &q, format::format_guide(&current.format_template), keyboards::format_menu())
                .await?;
        }
        "thumb" => {
            let current = state.settings.get(user_id).await?;
            show_menu(
                &bot,
                &q,
                thumbnail::thumbnail_text(&current),
                keyboards::thumbnail_menu(current.thumbnail_file_id.is_some()),
            )
            .await?;
        }
        "meta" => {
            let current = state.settings.get(user_id).await?;
            show_menu(&bot, &q, metadata::metadata_text(&current), keyboards::metadata_menu(&current))
                .await?;
        }
        "close" => {
            if let Some(message) = q.regular_message() {
                if let Err(e) = bot.delete_message(message.chat.id, message.id).await {
                    warn!("Could not delete menu: {}", e);
                }
            }
        }
        _ => {}
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_escapes_name() {
        let text = welcome_text("<Bob>");
        assert!(text.contains("Hi &lt;Bob&gt;!"));
    }

    #[test]
    fn test_help_lists_every_variable() {
        for (name, _) in crate::template::VARIABLES {
            assert!(HELP_TEXT.contains(&format!("{{{name}}}")), "{name}");
        }
    }
}
