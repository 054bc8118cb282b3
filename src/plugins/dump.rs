//! /dump: channels that receive a copy of every processed file.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMemberKind};
use tracing::info;

use super::{ensure_authorized, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::DumpChannel;
use crate::utils::{format_timestamp, html_escape, parse_channel_id, reply_html, split_first_word};

const USAGE: &str = "Usage:\n\
/dump add <code>channel_id</code>\n\
/dump remove <code>channel_id</code>\n\
/dump list";

fn format_channels(channels: &[DumpChannel]) -> String {
    if channels.is_empty() {
        return "📦 No dump channels configured.\n\nAdd one with /dump add <code>channel_id</code>."
            .to_string();
    }

    let mut text = String::from("<b>📦 Dump channels</b>\n\n");
    for channel in channels {
        text.push_str(&format!(
            "• <b>{}</b> (<code>{}</code>), added {}\n",
            html_escape(&channel.channel_name),
            channel.channel_id,
            format_timestamp(channel.added_at)
        ));
    }
    text
}

pub async fn channels_text(state: &AppState) -> anyhow::Result<String> {
    Ok(format_channels(&state.dumps.active().await?))
}

/// Handle /dump add|remove|list [channel_id].
pub async fn dump_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !ensure_authorized(&bot, &msg, &state).await? {
        return Ok(());
    }

    let (action, rest) = split_first_word(&args);
    let action = action.to_lowercase();

    if action.is_empty() || action == "list" {
        reply_html(&bot, &msg, channels_text(&state).await?).await?;
        return Ok(());
    }

    if action != "add" && action != "remove" {
        reply_html(&bot, &msg, USAGE).await?;
        return Ok(());
    }

    let Some(channel_id) = parse_channel_id(rest) else {
        reply_html(&bot, &msg, "❌ Invalid channel ID. Channel IDs are negative, e.g. <code>-1001234567890</code>.")
            .await?;
        return Ok(());
    };

    let text = if action == "add" {
        add_channel(&bot, &state, channel_id, sender_id(&msg)).await?
    } else if state.dumps.remove(channel_id).await? {
        info!("Dump channel {} removed", channel_id);
        format!("🗑 Dump channel <code>{channel_id}</code> removed.")
    } else {
        format!("❌ <code>{channel_id}</code> is not a dump channel.")
    };

    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Verify the bot can post in the channel, then store it.
async fn add_channel(
    bot: &ThrottledBot,
    state: &AppState,
    channel_id: i64,
    added_by: u64,
) -> anyhow::Result<String> {
    let chat = match bot.get_chat(ChatId(channel_id)).await {
        Ok(chat) => chat,
        Err(e) => {
            return Ok(format!(
                "❌ Cannot access <code>{channel_id}</code>: {}\nAdd the bot to the channel first.",
                html_escape(&e.to_string())
            ));
        }
    };

    let me = bot.get_me().await?;
    let member = bot.get_chat_member(ChatId(channel_id), me.id).await?;
    if !matches!(
        member.kind,
        ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_)
    ) {
        return Ok("❌ The bot must be an administrator in that channel.".to_string());
    }

    let name = chat
        .title()
        .map(str::to_string)
        .unwrap_or_else(|| channel_id.to_string());
    state.dumps.add(channel_id, &name, added_by).await?;
    info!("Dump channel {} ({}) added by {}", channel_id, name, added_by);

    Ok(format!(
        "✅ Dump channel <b>{}</b> (<code>{channel_id}</code>) added.",
        html_escape(&name)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_channels() {
        assert!(format_channels(&[]).starts_with("📦 No dump channels"));

        let channel = DumpChannel {
            channel_id: -1001,
            channel_name: "Backups & more".into(),
            added_by: 1,
            added_at: 0,
            is_active: true,
        };
        let text = format_channels(&[channel]);
        assert!(text.contains("• <b>Backups &amp; more</b> (<code>-1001</code>), added 1970-01-01 00:00"));
    }
}
