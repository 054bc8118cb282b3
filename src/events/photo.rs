//! Photos become the custom thumbnail.

use teloxide::prelude::*;
use tracing::info;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::plugins::sender_id;
use crate::session::PendingAction;
use crate::utils::reply_html;

/// Store the largest size of a photo as the user's thumbnail, when no
/// other prompt is waiting for input.
pub async fn photo_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);

    match state.sessions.get(user_id) {
        None | Some(PendingAction::AwaitingThumbnail) => {}
        Some(_) => {
            reply_html(&bot, &msg, "⚠️ I'm waiting for something else. Finish it or use /clear first.")
                .await?;
            return Ok(());
        }
    }

    let Some(largest) = msg
        .photo()
        .and_then(|sizes| sizes.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)))
    else {
        return Ok(());
    };

    let file_id = largest.file.id.clone();
    state
        .settings
        .update(user_id, |s| s.thumbnail_file_id = Some(file_id))
        .await?;
    state.sessions.clear(user_id);
    info!("User {} set a custom thumbnail", user_id);

    reply_html(
        &bot,
        &msg,
        "✅ Custom thumbnail saved. It will be used for all your files.\n/viewthumb to see it, /delthumb to remove it.",
    )
    .await?;
    Ok(())
}
