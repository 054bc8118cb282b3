//! Command and callback handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()` or `callback_handler()`

pub mod admin;
pub mod broadcast;
pub mod clear;
pub mod dump;
pub mod format;
pub mod keyboards;
pub mod metadata;
pub mod settings;
pub mod start;
pub mod stats;
pub mod thumbnail;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;
use tracing::warn;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::events;
use crate::utils::reply_html;

/// All bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start(String),

    #[command(description = "how to use the bot")]
    Help(String),

    #[command(description = "open the settings menu")]
    Settings(String),

    #[command(description = "show or set the format template")]
    Format(String),

    #[command(description = "show the current template")]
    Getfmt(String),

    #[command(description = "save a named template")]
    Savefmt(String),

    #[command(description = "list saved templates")]
    Templates(String),

    #[command(description = "activate a saved template")]
    Usefmt(String),

    #[command(description = "delete a saved template")]
    Delfmt(String),

    #[command(description = "switch between auto and manual mode")]
    Mode(String),

    #[command(description = "send files as document or video")]
    SetMedia(String),

    #[command(description = "metadata status, on or off")]
    Metadata(String),

    #[command(description = "set a metadata field")]
    Setmeta(String),

    #[command(description = "show your custom thumbnail")]
    Viewthumb(String),

    #[command(description = "remove your custom thumbnail")]
    Delthumb(String),

    #[command(description = "your statistics")]
    Stats(String),

    #[command(description = "top users")]
    Leaderboard(String),

    #[command(description = "cancel the current action or job")]
    Clear(String),

    // Admin commands
    #[command(description = "ban a user")]
    Ban(String),

    #[command(description = "unban a user")]
    Unban(String),

    #[command(description = "add or remove an admin")]
    Admin(String),

    #[command(description = "message every user")]
    Broadcast(String),

    #[command(description = "manage dump channels")]
    Dump(String),

    #[command(description = "global statistics")]
    Botstats(String),
}

/// Commands left out of the public command menu.
const ADMIN_COMMANDS: &[&str] = &["ban", "unban", "admin", "broadcast", "dump", "botstats"];

/// The command list shown to every user by Telegram clients.
pub fn user_commands() -> Vec<BotCommand> {
    Command::bot_commands()
        .into_iter()
        .filter(|c| !ADMIN_COMMANDS.contains(&c.command.trim_start_matches('/')))
        .collect()
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start(args)].endpoint(start::start_command))
        .branch(case![Command::Help(args)].endpoint(start::help_command))
        .branch(case![Command::Settings(args)].endpoint(settings::settings_command))
        // Format templates
        .branch(case![Command::Format(args)].endpoint(format::format_command))
        .branch(case![Command::Getfmt(args)].endpoint(format::getfmt_command))
        .branch(case![Command::Savefmt(args)].endpoint(format::savefmt_command))
        .branch(case![Command::Templates(args)].endpoint(format::templates_command))
        .branch(case![Command::Usefmt(args)].endpoint(format::usefmt_command))
        .branch(case![Command::Delfmt(args)].endpoint(format::delfmt_command))
        // Preferences
        .branch(case![Command::Mode(args)].endpoint(settings::mode_command))
        .branch(case![Command::SetMedia(args)].endpoint(settings::set_media_command))
        .branch(case![Command::Metadata(args)].endpoint(metadata::metadata_command))
        .branch(case![Command::Setmeta(args)].endpoint(metadata::setmeta_command))
        .branch(case![Command::Viewthumb(args)].endpoint(thumbnail::viewthumb_command))
        .branch(case![Command::Delthumb(args)].endpoint(thumbnail::delthumb_command))
        // Stats
        .branch(case![Command::Stats(args)].endpoint(stats::stats_command))
        .branch(case![Command::Leaderboard(args)].endpoint(stats::leaderboard_command))
        .branch(case![Command::Clear(args)].endpoint(clear::clear_command))
        // Admin
        .branch(case![Command::Ban(args)].endpoint(admin::ban_command))
        .branch(case![Command::Unban(args)].endpoint(admin::unban_command))
        .branch(case![Command::Admin(args)].endpoint(admin::admin_command))
        .branch(case![Command::Broadcast(args)].endpoint(broadcast::broadcast_command))
        .branch(case![Command::Dump(args)].endpoint(dump::dump_command))
        .branch(case![Command::Botstats(args)].endpoint(stats::botstats_command))
}

/// Filter callbacks whose data starts with `prefix`.
fn data_prefix(prefix: &'static str) -> impl Fn(CallbackQuery) -> bool + Send + Sync + 'static {
    move |q: CallbackQuery| q.data.as_deref().is_some_and(|d| d.starts_with(prefix))
}

/// Build the callback query handler. Expects a `CallbackQuery` in scope.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(dptree::filter(data_prefix("menu:")).endpoint(start::menu_callback))
        .branch(dptree::filter(data_prefix("mode:")).endpoint(settings::settings_callback))
        .branch(dptree::filter(data_prefix("type:")).endpoint(settings::settings_callback))
        .branch(dptree::filter(data_prefix("set:")).endpoint(settings::settings_callback))
        .branch(dptree::filter(data_prefix("fmt:")).endpoint(format::format_callback))
        .branch(dptree::filter(data_prefix("thumb:")).endpoint(thumbnail::thumbnail_callback))
        .branch(dptree::filter(data_prefix("meta:")).endpoint(metadata::metadata_callback))
        .branch(dptree::filter(data_prefix("file:")).endpoint(events::media::manual_choice_callback))
        .branch(dptree::filter(data_prefix("job:")).endpoint(clear::job_callback))
        .branch(dptree::filter(data_prefix("admin:")).endpoint(admin::panel_callback))
        .branch(dptree::endpoint(unknown_callback))
}

/// Answer callbacks nobody handles so the client stops spinning.
async fn unknown_callback(bot: ThrottledBot, q: CallbackQuery) -> anyhow::Result<()> {
    warn!("Unhandled callback data {:?}", q.data);
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

/// Callback data after its prefix, e.g. `"auto"` for `"mode:auto"`.
pub(crate) fn callback_value<'a>(q: &'a CallbackQuery, prefix: &str) -> &'a str {
    q.data
        .as_deref()
        .and_then(|d| d.strip_prefix(prefix))
        .unwrap_or("")
}

/// Sender id of a message, 0 for anonymous senders.
pub(crate) fn sender_id(msg: &Message) -> u64 {
    msg.from.as_ref().map(|u| u.id.0).unwrap_or(0)
}

/// Reply with a refusal unless the sender is an owner or admin.
pub(crate) async fn ensure_authorized(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
) -> anyhow::Result<bool> {
    let user_id = sender_id(msg);
    if state.permissions.is_authorized(user_id).await? {
        return Ok(true);
    }
    reply_html(bot, msg, "⛔ This command is for bot admins only.").await?;
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_commands_parse() {
        let cmd = Command::parse("/set_media", "renamebot").unwrap();
        assert_eq!(cmd, Command::SetMedia(String::new()));

        let cmd = Command::parse("/savefmt movies {title} ({year})", "renamebot").unwrap();
        assert_eq!(cmd, Command::Savefmt("movies {title} ({year})".to_string()));
    }

    #[test]
    fn test_user_menu_hides_admin_commands() {
        let names: Vec<String> = user_commands()
            .into_iter()
            .map(|c| c.command.trim_start_matches('/').to_string())
            .collect();
        assert!(names.contains(&"set_media".to_string()));
        assert!(names.contains(&"leaderboard".to_string()));
        assert!(!names.contains(&"ban".to_string()));
        assert!(!names.contains(&"broadcast".to_string()));
    }
}
