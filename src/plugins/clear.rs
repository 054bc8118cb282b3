//! /clear and the job cancel button.

use teloxide::prelude::*;
use tracing::{info, warn};

use super::sender_id;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::session::StatusLocation;
use crate::utils::reply_html;

const CANCELLED: &str = "🛑 Cancelled.";

/// What /clear found and dropped for one user.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Cleared {
    pub pending: bool,
    /// `Some` when a job was aborted, holding its status message if known.
    pub job: Option<Option<StatusLocation>>,
}

/// Drop the pending action and abort the running job.
pub fn clear_user(state: &AppState, user_id: u64) -> Cleared {
    let pending = state.sessions.take(user_id).is_some();
    let job = state.jobs.cancel(user_id);
    if job.is_some() {
        info!("User {} cancelled their job", user_id);
    }
    Cleared { pending, job }
}

/// Replace an aborted job's status with the final notice and drop its
/// cancel button.
async fn mark_cancelled(bot: &ThrottledBot, status: StatusLocation) {
    if let Err(e) = bot
        .edit_message_text(status.chat_id, status.message_id, CANCELLED)
        .await
    {
        warn!("Could not update cancelled job status: {}", e);
    }
}

/// Handle /clear.
pub async fn clear_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let cleared = clear_user(&state, sender_id(&msg));
    if let Some(Some(status)) = cleared.job {
        mark_cancelled(&bot, status).await;
    }

    let text = match cleared {
        Cleared { job: Some(_), .. } => "🛑 Your running job was cancelled.",
        Cleared { pending: true, .. } => "✅ Pending action cleared.",
        _ => "Nothing to clear.",
    };
    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle `job:cancel`.
pub async fn job_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let cancelled = state.jobs.cancel(q.from.id.0);

    if let Some(tracked) = cancelled {
        let pressed = q.regular_message().map(|message| StatusLocation {
            chat_id: message.chat.id,
            message_id: message.id,
        });
        if let Some(status) = tracked.or(pressed) {
            mark_cancelled(&bot, status).await;
        }
    }

    bot.answer_callback_query(q.id)
        .text(if cancelled.is_some() { "Job cancelled" } else { "No running job" })
        .await?;
    Ok(())
}
