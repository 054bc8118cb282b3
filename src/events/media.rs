//! Incoming documents, videos and audio files.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{error, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{Admission, RenameMode};
use crate::media::{IncomingFile, NameStrategy, PipelineError, RenameJob, StatusMessage};
use crate::plugins::{callback_value, keyboards, sender_id};
use crate::session::{PendingAction, StatusLocation};
use crate::utils::{format_file_size, html_escape, reply_html, reply_menu, show_menu, split_extension};

const BUSY: &str = "⏳ You already have a file in progress. Wait for it to finish or use /clear.";

/// Handle a media message: rate limit, busy check, then by rename mode.
pub async fn media_handler(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    file: IncomingFile,
) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);

    if !state.is_owner(user_id) {
        let now = chrono::Utc::now().timestamp();
        match state.rate_limits.admit(user_id, now).await {
            Ok(Admission::Allowed) => {}
            Ok(Admission::Limited { retry_after }) => {
                reply_html(
                    &bot,
                    &msg,
                    format!("⏳ Too many requests. Please try again in {retry_after}s."),
                )
                .await?;
                return Ok(());
            }
            Err(e) => warn!("Rate limit check failed for {}, allowing: {:#}", user_id, e),
        }
    }

    if state.jobs.is_busy(user_id) {
        reply_html(&bot, &msg, BUSY).await?;
        return Ok(());
    }

    let max = state.pipeline.max_file_size();
    if file.size > max {
        let err = PipelineError::TooLarge { size: file.size, max };
        reply_html(&bot, &msg, err.user_message()).await?;
        return Ok(());
    }

    let settings = state.settings.get(user_id).await?;
    match settings.rename_mode {
        RenameMode::Manual => {
            let original = file.original_name();
            let ext_hint = match split_extension(&original).1 {
                Some(ext) => format!("\nThe extension <code>.{}</code> is added if you leave it out.", html_escape(ext)),
                None => String::new(),
            };
            let text = format!(
                "✏️ Send the new name for <code>{}</code> ({}).{ext_hint}",
                html_escape(&original),
                format_file_size(file.size)
            );
            state.sessions.set(user_id, PendingAction::AwaitingFilename(file));
            reply_menu(&bot, &msg, text, keyboards::manual_prompt()).await?;
        }
        RenameMode::Auto => {
            start_job(&bot, &state, msg.chat.id, user_id, file, NameStrategy::Template).await?;
        }
    }
    Ok(())
}

/// Claim the user's job slot and run the pipeline in the background.
pub async fn start_job(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: ChatId,
    user_id: u64,
    file: IncomingFile,
    naming: NameStrategy,
) -> anyhow::Result<()> {
    let Some(slot) = state.jobs.try_start(user_id) else {
        bot.send_message(chat_id, BUSY).await?;
        return Ok(());
    };

    let prepared = async {
        let settings = state.settings.get(user_id).await?;
        let status = bot
            .send_message(chat_id, "⏳ Starting…")
            .reply_markup(keyboards::job_cancel())
            .await?;
        anyhow::Ok((settings, status))
    }
    .await;

    let (settings, status) = match prepared {
        Ok(ready) => ready,
        Err(e) => {
            state.jobs.finish(slot);
            return Err(e);
        }
    };

    let location = StatusLocation {
        chat_id,
        message_id: status.id,
    };
    let status = StatusMessage::new(bot.clone(), chat_id, status.id);
    let job = RenameJob {
        user_id,
        chat_id,
        file,
        naming,
        settings,
    };

    let pipeline = Arc::clone(&state.pipeline);
    let jobs = state.jobs.clone();
    let handle = tokio::spawn(async move {
        match pipeline.run(&job, &status).await {
            Ok(outcome) => {
                let mut text = format!(
                    "✅ <b>Done!</b>\n📄 <code>{}</code>\n💾 {} in {:.1}s",
                    html_escape(&outcome.new_name),
                    format_file_size(outcome.size),
                    outcome.elapsed.as_secs_f32()
                );
                if outcome.forwarded > 0 {
                    text.push_str(&format!("\n📦 Forwarded to {} dump channel(s)", outcome.forwarded));
                }
                status.finish(text).await;
            }
            Err(e) => {
                error!("Job for user {} failed: {}", job.user_id, e);
                status.finish(e.user_message()).await;
            }
        }
        jobs.finish(slot);
    });
    state.jobs.attach(slot, handle.abort_handle(), location);
    Ok(())
}

/// Handle `file:auto` and `file:cancel` from the manual-mode prompt.
pub async fn manual_choice_callback(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    let user_id = q.from.id.0;
    let choice = callback_value(&q, "file:");

    let file = match state.sessions.take(user_id) {
        Some(PendingAction::AwaitingFilename(file)) => Some(file),
        Some(other) => {
            // Not ours; put it back.
            state.sessions.set(user_id, other);
            None
        }
        None => None,
    };

    let notice = match (choice, file) {
        ("auto", Some(file)) => {
            if let Some(prompt) = q.regular_message() {
                let _ = bot.edit_message_reply_markup(prompt.chat.id, prompt.id).await;
            }
            start_job(&bot, &state, ChatId::from(q.from.id), user_id, file, NameStrategy::Template)
                .await?;
            "Using your template"
        }
        ("cancel", Some(_)) => {
            show_menu(&bot, &q, "✖ Cancelled.", Default::default()).await?;
            "Cancelled"
        }
        _ => "This file is no longer pending",
    };

    bot.answer_callback_query(q.id).text(notice).await?;
    Ok(())
}
