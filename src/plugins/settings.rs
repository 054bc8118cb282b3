//! Rename mode, upload type and auto-thumbnail preferences.

use teloxide::prelude::*;
use tracing::info;

use super::{callback_value, keyboards, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{MediaType, RenameMode, UserSettings};
use crate::utils::{html_escape, reply_menu, show_menu};

fn on_off(value: bool) -> &'static str {
    if value { "ON" } else { "OFF" }
}

pub fn settings_text(settings: &UserSettings) -> String {
    format!(
        "<b>⚙️ Settings</b>\n\n\
         🔄 Mode: <b>{}</b>\n\
         📤 Upload as: <b>{}</b>\n\
         📝 Format: <code>{}</code>\n\
         🖼 Auto thumbnail: <b>{}</b>\n\
         🎨 Custom thumbnail: <b>{}</b>\n\
         🏷 Metadata: <b>{}</b>",
        settings.rename_mode,
        settings.media_type,
        html_escape(&settings.format_template),
        on_off(settings.auto_thumbnail),
        if settings.thumbnail_file_id.is_some() { "set" } else { "none" },
        on_off(settings.metadata_enabled),
    )
}

fn mode_text(mode: RenameMode) -> String {
    format!(
        "<b>🔄 Rename mode</b>\n\n\
         <b>Auto</b>: files are renamed with your format template.\n\
         <b>Manual</b>: you type a name for every file.\n\n\
         Current: <b>{mode}</b>"
    )
}

fn media_type_text(media_type: MediaType) -> String {
    format!(
        "<b>📤 Upload type</b>\n\n\
         <b>Document</b>: files are sent as documents.\n\
         <b>Video</b>: video files are sent as streamable videos.\n\n\
         Current: <b>{media_type}</b>"
    )
}

/// Handle /settings.
pub async fn settings_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let settings = state.settings.get(sender_id(&msg)).await?;
    reply_menu(&bot, &msg, settings_text(&settings), keyboards::settings_menu(&settings)).await?;
    Ok(())
}

/// Handle /mode.
pub async fn mode_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let settings = state.settings.get(sender_id(&msg)).await?;
    reply_menu(
        &bot,
        &msg,
        mode_text(settings.rename_mode),
        keyboards::mode_menu(settings.rename_mode),
    )
    .await?;
    Ok(())
}

/// Handle /set_media.
pub async fn set_media_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let settings = state.settings.get(sender_id(&msg)).await?;
    reply_menu(
        &bot,
        &msg,
        media_type_text(settings.media_type),
        keyboards::media_type_menu(settings.media_type),
    )
    .await?;
    Ok(())
}

/// Handle `mode:*`, `type:*` and `set:*` callbacks.
pub async fn settings_callback(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    let user_id = q.from.id.0;
    let data = q.data.as_deref().unwrap_or("");

    let notice = if let Some(value) = data.strip_prefix("mode:") {
        match value.parse::<RenameMode>() {
            Ok(mode) => {
                let updated = state.settings.update(user_id, |s| s.rename_mode = mode).await?;
                info!("User {} switched to {} mode", user_id, mode.as_str());
                show_menu(&bot, &q, mode_text(mode), keyboards::mode_menu(updated.rename_mode)).await?;
                Some(format!("Mode: {mode}"))
            }
            Err(_) => None,
        }
    } else if let Some(value) = data.strip_prefix("type:") {
        match value.parse::<MediaType>() {
            Ok(media_type) => {
                let updated = state.settings.update(user_id, |s| s.media_type = media_type).await?;
                show_menu(
                    &bot,
                    &q,
                    media_type_text(media_type),
                    keyboards::media_type_menu(updated.media_type),
                )
                .await?;
                Some(format!("Upload as: {media_type}"))
            }
            Err(_) => None,
        }
    } else if callback_value(&q, "set:") == "thumb_toggle" {
        let updated = state
            .settings
            .update(user_id, |s| s.auto_thumbnail = !s.auto_thumbnail)
            .await?;
        show_menu(&bot, &q, settings_text(&updated), keyboards::settings_menu(&updated)).await?;
        Some(format!("Auto thumbnail: {}", on_off(updated.auto_thumbnail)))
    } else {
        None
    };

    let mut answer = bot.answer_callback_query(q.id);
    if let Some(text) = notice {
        answer = answer.text(text);
    }
    answer.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_text_reflects_preferences() {
        let mut settings = UserSettings::new(1, "{title} <x>");
        settings.rename_mode = RenameMode::Manual;
        settings.auto_thumbnail = false;

        let text = settings_text(&settings);
        assert!(text.contains("Mode: <b>Manual</b>"));
        assert!(text.contains("<code>{title} &lt;x&gt;</code>"));
        assert!(text.contains("Auto thumbnail: <b>OFF</b>"));
        assert!(text.contains("Custom thumbnail: <b>none</b>"));
    }
}
