//! /broadcast: message every non-banned user.

use futures::StreamExt;
use futures::stream;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode, UserId};
use tracing::{error, info};

use super::{ensure_authorized, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::session::PendingAction;
use crate::utils::reply_html;

/// Sends in flight at once. The throttle adaptor still applies its limits.
const CONCURRENCY: usize = 8;

/// Status edits happen every this many recipients.
const PROGRESS_EVERY: usize = 10;

pub const SIGNATURE: &str = "— Bot Admin";

pub const PROMPT: &str = "📢 Send the message to broadcast to all users.\nUse /clear to cancel.";

/// What gets sent to every user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastContent {
    /// Plain text, signed.
    Text(String),
    /// A copy of an existing message.
    Copy { from_chat: ChatId, message_id: MessageId },
}

pub fn signed_text(body: &str) -> String {
    format!("{}\n\n{SIGNATURE}", body.trim())
}

/// Every user id except the sender.
pub fn recipients(user_ids: Vec<u64>, sender: u64) -> Vec<u64> {
    user_ids.into_iter().filter(|id| *id != sender).collect()
}

fn progress_text(done: usize, total: usize, delivered: usize, failed: usize) -> String {
    format!(
        "📢 Broadcasting… {done}/{total}\n✅ Delivered: {delivered}\n❌ Failed: {failed}"
    )
}

fn summary_text(total: usize, delivered: usize, failed: usize) -> String {
    format!(
        "<b>📢 Broadcast finished</b>\n\n👥 Recipients: {total}\n✅ Delivered: {delivered}\n❌ Failed: {failed}"
    )
}

/// Make the next text message from `user_id` the broadcast.
pub fn await_broadcast(state: &AppState, user_id: u64) {
    state.sessions.set(user_id, PendingAction::AwaitingBroadcast);
}

/// Handle /broadcast [text], or a reply to the message to broadcast.
pub async fn broadcast_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !ensure_authorized(&bot, &msg, &state).await? {
        return Ok(());
    }

    let sender = sender_id(&msg);
    let content = if let Some(reply) = msg.reply_to_message() {
        BroadcastContent::Copy {
            from_chat: reply.chat.id,
            message_id: reply.id,
        }
    } else if !args.trim().is_empty() {
        BroadcastContent::Text(signed_text(&args))
    } else {
        await_broadcast(&state, sender);
        reply_html(&bot, &msg, PROMPT).await?;
        return Ok(());
    };

    start_broadcast(bot, state, msg.chat.id, sender, content).await
}

/// Post a status message and run the broadcast in the background.
pub async fn start_broadcast(
    bot: ThrottledBot,
    state: AppState,
    chat_id: ChatId,
    sender: u64,
    content: BroadcastContent,
) -> anyhow::Result<()> {
    let targets = recipients(state.users.active_user_ids().await?, sender);
    let status = bot
        .send_message(chat_id, progress_text(0, targets.len(), 0, 0))
        .await?;

    tokio::spawn(async move {
        if let Err(e) = run_broadcast(&bot, chat_id, status.id, targets, content).await {
            error!("Broadcast failed: {:#}", e);
        }
    });
    Ok(())
}

async fn run_broadcast(
    bot: &ThrottledBot,
    chat_id: ChatId,
    status_id: MessageId,
    targets: Vec<u64>,
    content: BroadcastContent,
) -> anyhow::Result<()> {
    let total = targets.len();
    info!("Broadcasting to {} users", total);

    let mut results = stream::iter(targets)
        .map(|user_id| {
            let bot = bot.clone();
            let content = content.clone();
            async move {
                let target = ChatId::from(UserId(user_id));
                match content {
                    BroadcastContent::Text(text) => bot.send_message(target, text).await.is_ok(),
                    BroadcastContent::Copy { from_chat, message_id } => {
                        bot.copy_message(target, from_chat, message_id).await.is_ok()
                    }
                }
            }
        })
        .buffer_unordered(CONCURRENCY);

    let (mut delivered, mut failed) = (0, 0);
    while let Some(ok) = results.next().await {
        if ok {
            delivered += 1;
        } else {
            failed += 1;
        }

        let done = delivered + failed;
        if done % PROGRESS_EVERY == 0 && done < total {
            let _ = bot
                .edit_message_text(chat_id, status_id, progress_text(done, total, delivered, failed))
                .await;
        }
    }

    info!("Broadcast finished: {} delivered, {} failed", delivered, failed);
    bot.edit_message_text(chat_id, status_id, summary_text(total, delivered, failed))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_text() {
        assert_eq!(signed_text("  Maintenance tonight \n"), "Maintenance tonight\n\n— Bot Admin");
    }

    #[test]
    fn test_sender_is_skipped() {
        assert_eq!(recipients(vec![1, 2, 3], 2), vec![1, 3]);
        assert!(recipients(vec![4], 4).is_empty());
    }

    #[test]
    fn test_progress_and_summary() {
        assert_eq!(
            progress_text(10, 25, 9, 1),
            "📢 Broadcasting… 10/25\n✅ Delivered: 9\n❌ Failed: 1"
        );
        assert!(summary_text(25, 24, 1).contains("Recipients: 25"));
    }
}
