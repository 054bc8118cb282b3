//! User moderation: /ban, /unban, /admin and the admin panel callbacks.

use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId};
use tracing::{info, warn};

use super::{broadcast, callback_value, dump, ensure_authorized, keyboards, sender_id, stats};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::UserRecord;
use crate::permissions::Refusal;
use crate::utils::{format_username, html_escape, parse_user_id, reply_html, show_menu, split_first_word};

const INVALID_USER_ID: &str = "❌ Invalid user ID";

/// Users shown in the panel's user view.
const USERS_PAGE: usize = 10;

/// A moderation change to one user's account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UserAction {
    Ban,
    Unban,
    Promote,
    Demote,
}

impl UserAction {
    /// Parse panel callback data such as `ban:42`.
    pub(crate) fn parse(data: &str) -> Option<(Self, u64)> {
        let (action, target) = data.split_once(':')?;
        let action = match action {
            "ban" => Self::Ban,
            "unban" => Self::Unban,
            "promote" => Self::Promote,
            "demote" => Self::Demote,
            _ => return None,
        };
        Some((action, parse_user_id(target)?))
    }
}

/// Reply for the actor and notice for the target of an applied action.
#[derive(Debug)]
pub(crate) struct Moderation {
    pub reply: String,
    pub notice: &'static str,
}

/// Check and apply `action` by `actor` on `target`.
///
/// Refusals come back as the inner error; storage failures as the outer one.
pub(crate) async fn apply_user_action(
    state: &AppState,
    actor: u64,
    action: UserAction,
    target: u64,
) -> anyhow::Result<Result<Moderation, Refusal>> {
    let permissions = &state.permissions;
    let checked = match action {
        UserAction::Ban => permissions.check_ban(actor, target),
        UserAction::Unban => Ok(()),
        UserAction::Promote => permissions.check_admin_change(actor, target, true),
        UserAction::Demote => permissions.check_admin_change(actor, target, false),
    };
    if let Err(refusal) = checked {
        return Ok(Err(refusal));
    }

    let moderation = match action {
        UserAction::Ban => {
            permissions.set_banned(target, true).await?;
            Moderation {
                reply: format!("🚫 User <code>{target}</code> has been banned."),
                notice: "🚫 You have been banned from using this bot.",
            }
        }
        UserAction::Unban => {
            permissions.set_banned(target, false).await?;
            state.rate_limits.reset(target).await?;
            Moderation {
                reply: format!("✅ User <code>{target}</code> has been unbanned."),
                notice: "✅ You have been unbanned. You can use the bot again.",
            }
        }
        UserAction::Promote => {
            permissions.set_admin(target, true).await?;
            Moderation {
                reply: format!("🛡 User <code>{target}</code> is now an admin."),
                notice: "🛡 You have been made an admin of this bot.",
            }
        }
        UserAction::Demote => {
            permissions.set_admin(target, false).await?;
            Moderation {
                reply: format!("✅ User <code>{target}</code> is no longer an admin."),
                notice: "ℹ️ Your admin rights for this bot were removed.",
            }
        }
    };
    info!("User {} applied {:?} to user {}", actor, action, target);
    Ok(Ok(moderation))
}

/// Tell a user about a change to their account. Failures are logged only.
async fn notify(bot: &ThrottledBot, user_id: u64, text: &str) {
    if let Err(e) = bot.send_message(ChatId::from(UserId(user_id)), text).await {
        warn!("Could not notify user {}: {}", user_id, e);
    }
}

/// Handle /ban <user_id>.
pub async fn ban_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    set_ban(bot, msg, state, args, true).await
}

/// Handle /unban <user_id>.
pub async fn unban_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    set_ban(bot, msg, state, args, false).await
}

async fn set_ban(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
    ban: bool,
) -> anyhow::Result<()> {
    if !ensure_authorized(&bot, &msg, &state).await? {
        return Ok(());
    }

    let Some(target) = parse_user_id(&args) else {
        reply_html(&bot, &msg, INVALID_USER_ID).await?;
        return Ok(());
    };

    let action = if ban { UserAction::Ban } else { UserAction::Unban };
    moderate(&bot, &msg, &state, action, target).await
}

/// Apply an action from a command and report back to both sides.
async fn moderate(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    action: UserAction,
    target: u64,
) -> anyhow::Result<()> {
    match apply_user_action(state, sender_id(msg), action, target).await? {
        Ok(moderation) => {
            reply_html(bot, msg, moderation.reply).await?;
            notify(bot, target, moderation.notice).await;
        }
        Err(refusal) => {
            reply_html(bot, msg, format!("❌ {refusal}")).await?;
        }
    }
    Ok(())
}

/// Handle /admin add|remove <user_id>, or list admins without arguments.
pub async fn admin_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !ensure_authorized(&bot, &msg, &state).await? {
        return Ok(());
    }

    let (action, rest) = split_first_word(&args);

    let grant = match action.to_lowercase().as_str() {
        "" | "list" => {
            let admins = state.users.admins().await?;
            let mut text = String::from("<b>🛡 Admins</b>\n\n");
            if admins.is_empty() {
                text.push_str("No admins besides the owner.");
            }
            for admin in admins {
                let name = format_username(admin.username.as_deref(), &admin.full_name());
                text.push_str(&format!("• {} (<code>{}</code>)\n", html_escape(&name), admin.user_id));
            }
            reply_html(&bot, &msg, text).await?;
            return Ok(());
        }
        "add" => true,
        "remove" => false,
        _ => {
            reply_html(&bot, &msg, "Usage: /admin <code>add|remove user_id</code>").await?;
            return Ok(());
        }
    };

    let Some(target) = parse_user_id(rest) else {
        reply_html(&bot, &msg, INVALID_USER_ID).await?;
        return Ok(());
    };

    let action = if grant { UserAction::Promote } else { UserAction::Demote };
    moderate(&bot, &msg, &state, action, target).await
}

/// Text of the panel's user view.
pub(crate) fn users_text(users: &[UserRecord]) -> String {
    let mut text = String::from("<b>👥 Users</b>\n\n");
    if users.is_empty() {
        text.push_str("No users yet.\n");
    }
    for user in users {
        let name = format_username(user.username.as_deref(), &user.full_name());
        let mut flags = String::new();
        if user.is_banned {
            flags.push_str(" 🚫");
        }
        if user.is_admin {
            flags.push_str(" 🛡");
        }
        text.push_str(&format!(
            "• {} (<code>{}</code>) {} files{}\n",
            html_escape(&name),
            user.user_id,
            user.files_renamed,
            flags
        ));
    }
    text.push_str(
        "\nUse the buttons to ban or promote, or the commands:\n\
         /ban <code>user_id</code>\n\
         /unban <code>user_id</code>\n\
         /admin <code>add|remove user_id</code>",
    );
    text
}

async fn show_users(bot: &ThrottledBot, q: &CallbackQuery, state: &AppState) -> anyhow::Result<()> {
    let users = state.users.recent(USERS_PAGE).await?;
    show_menu(
        bot,
        q,
        users_text(&users),
        keyboards::user_management(&users, &state.config.owner_ids),
    )
    .await?;
    Ok(())
}

/// Handle `admin:*` callbacks from the admin panel.
pub async fn panel_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let user_id = q.from.id.0;

    if !state.permissions.is_authorized(user_id).await? {
        bot.answer_callback_query(q.id)
            .text("⛔ Admins only")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    match callback_value(&q, "admin:") {
        "stats" => {
            let stats = state.history.bot_stats().await?;
            show_menu(
                &bot,
                &q,
                stats::bot_stats_text(&stats, state.jobs.active()),
                keyboards::admin_panel(),
            )
            .await?;
        }
        "dumps" => {
            let text = dump::channels_text(&state).await?;
            show_menu(&bot, &q, text, keyboards::admin_panel()).await?;
        }
        "broadcast" => {
            broadcast::await_broadcast(&state, user_id);
            show_menu(&bot, &q, broadcast::PROMPT, keyboards::admin_panel()).await?;
        }
        "users" => show_users(&bot, &q, &state).await?,
        data => {
            if let Some((action, target)) = UserAction::parse(data) {
                match apply_user_action(&state, user_id, action, target).await? {
                    Ok(moderation) => {
                        notify(&bot, target, moderation.notice).await;
                        show_users(&bot, &q, &state).await?;
                    }
                    Err(refusal) => {
                        bot.answer_callback_query(q.id)
                            .text(refusal.to_string())
                            .show_alert(true)
                            .await?;
                        return Ok(());
                    }
                }
            }
        }
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::dispatcher::test_state;
    use crate::database::{Role, UserProfile};

    const OWNER: u64 = 1;

    async fn seed(state: &AppState, id: u64) {
        let profile = UserProfile {
            user_id: id,
            username: None,
            first_name: format!("User{id}"),
            last_name: None,
        };
        state.users.upsert(&profile).await.unwrap();
    }

    #[test]
    fn test_parse_panel_actions() {
        assert_eq!(UserAction::parse("ban:42"), Some((UserAction::Ban, 42)));
        assert_eq!(UserAction::parse("demote:7"), Some((UserAction::Demote, 7)));
        assert_eq!(UserAction::parse("ban:abc"), None);
        assert_eq!(UserAction::parse("kick:42"), None);
        assert_eq!(UserAction::parse("users"), None);
    }

    #[tokio::test]
    async fn test_panel_ban_and_unban() {
        let state = test_state();
        seed(&state, 10).await;

        let banned = apply_user_action(&state, OWNER, UserAction::Ban, 10).await.unwrap();
        assert!(banned.is_ok());
        assert!(state.permissions.is_banned(10).await.unwrap());

        let users = state.users.recent(USERS_PAGE).await.unwrap();
        assert!(users_text(&users).contains("🚫"));

        apply_user_action(&state, OWNER, UserAction::Unban, 10).await.unwrap().unwrap();
        assert!(!state.permissions.is_banned(10).await.unwrap());
    }

    #[tokio::test]
    async fn test_panel_promote_and_demote() {
        let state = test_state();
        seed(&state, 10).await;

        apply_user_action(&state, OWNER, UserAction::Promote, 10).await.unwrap().unwrap();
        assert_eq!(state.permissions.access(10).await.unwrap().role, Role::Admin);
        assert!(state.permissions.is_authorized(10).await.unwrap());

        apply_user_action(&state, OWNER, UserAction::Demote, 10).await.unwrap().unwrap();
        assert_eq!(state.permissions.access(10).await.unwrap().role, Role::Regular);
    }

    #[tokio::test]
    async fn test_panel_refusals_change_nothing() {
        let state = test_state();
        seed(&state, 10).await;
        seed(&state, 11).await;
        apply_user_action(&state, OWNER, UserAction::Promote, 10).await.unwrap().unwrap();

        let owner_ban = apply_user_action(&state, 10, UserAction::Ban, OWNER).await.unwrap();
        assert_eq!(owner_ban.unwrap_err(), Refusal::TargetIsOwner);

        let admin_promotes = apply_user_action(&state, 10, UserAction::Promote, 11).await.unwrap();
        assert_eq!(admin_promotes.unwrap_err(), Refusal::NotOwner);
        assert_eq!(state.permissions.access(11).await.unwrap().role, Role::Regular);
    }
}
