//! Metadata commands: /metadata, /setmeta and the `meta:*` callbacks.

use teloxide::prelude::*;

use super::{callback_value, keyboards, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{MetadataField, UserSettings};
use crate::session::PendingAction;
use crate::utils::{html_escape, reply_html, reply_menu, show_menu, split_first_word};

/// Value that clears a field.
const CLEAR_MARKER: &str = "-";

pub fn metadata_text(settings: &UserSettings) -> String {
    let mut text = format!(
        "<b>🏷 Metadata</b>: {}\n\n",
        if settings.metadata_enabled { "🟢 ON" } else { "🔴 OFF" }
    );
    for field in MetadataField::ALL {
        let value = settings
            .metadata
            .get(field)
            .map(|v| format!("<code>{}</code>", html_escape(v)))
            .unwrap_or_else(|| "<i>not set</i>".to_string());
        text.push_str(&format!("• {}: {}\n", field.label(), value));
    }
    text.push_str(
        "\nWhen on, these tags are written into every processed file.\n\
         Set one with /setmeta <code>field value</code>, clear it with <code>-</code>.",
    );
    text
}

/// Store `value` in `field`; `-` clears it. Returns the reply text.
pub async fn set_field(
    state: &AppState,
    user_id: u64,
    field: MetadataField,
    value: &str,
) -> anyhow::Result<String> {
    let value = value.trim();
    let new_value = (value != CLEAR_MARKER).then(|| value.to_string());
    let cleared = new_value.is_none();

    state
        .settings
        .update(user_id, |s| s.metadata.set(field, new_value))
        .await?;

    Ok(if cleared {
        format!("🗑 {} cleared.", field.label())
    } else {
        format!("✅ {} set to <code>{}</code>", field.label(), html_escape(value))
    })
}

/// Handle /metadata [on|off].
pub async fn metadata_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);

    let enable = match args.trim().to_lowercase().as_str() {
        "" => None,
        "on" => Some(true),
        "off" => Some(false),
        _ => {
            reply_html(&bot, &msg, "Usage: /metadata <code>on|off</code>").await?;
            return Ok(());
        }
    };

    let settings = match enable {
        Some(on) => state.settings.update(user_id, |s| s.metadata_enabled = on).await?,
        None => state.settings.get(user_id).await?,
    };

    reply_menu(&bot, &msg, metadata_text(&settings), keyboards::metadata_menu(&settings)).await?;
    Ok(())
}

/// Handle /setmeta <field> <value>.
pub async fn setmeta_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let (field, value) = split_first_word(&args);

    let Some(field) = MetadataField::parse(field) else {
        reply_html(
            &bot,
            &msg,
            "Usage: /setmeta <code>field value</code>\n\
             Fields: title, author, artist, audio, subtitle, video.\n\
             Use <code>-</code> as value to clear a field.",
        )
        .await?;
        return Ok(());
    };

    if value.is_empty() {
        reply_html(&bot, &msg, format!("❌ Give a value for {}.", field.label())).await?;
        return Ok(());
    }

    let text = set_field(&state, sender_id(&msg), field, value).await?;
    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle `meta:*` callbacks.
pub async fn metadata_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let user_id = q.from.id.0;
    let value = callback_value(&q, "meta:");

    let toggle = match value {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    };

    if let Some(on) = toggle {
        let updated = state.settings.update(user_id, |s| s.metadata_enabled = on).await?;
        show_menu(&bot, &q, metadata_text(&updated), keyboards::metadata_menu(&updated)).await?;
    } else if let Some(field) = value.strip_prefix("edit:").and_then(MetadataField::parse) {
        state.sessions.set(user_id, PendingAction::AwaitingMetadata(field));
        let settings = state.settings.get(user_id).await?;
        show_menu(
            &bot,
            &q,
            format!(
                "✏️ Send the new <b>{}</b> value, or <code>-</code> to clear it.\nUse /clear to cancel.",
                field.label()
            ),
            keyboards::metadata_menu(&settings),
        )
        .await?;
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}
