//! /stats, /leaderboard and /botstats.

use teloxide::prelude::*;

use super::{ensure_authorized, keyboards, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{BotStats, FileRecord, LeaderboardEntry, UserStats};
use crate::utils::{
    format_file_size, format_timestamp, format_username, html_escape, reply_menu, truncate_text,
};

const LEADERBOARD_SIZE: usize = 10;
const RECENT_FILES: usize = 5;
const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

fn format_user_stats(stats: &UserStats, role: &str) -> String {
    format!(
        "<b>📊 Your statistics</b>\n\n\
         👤 Role: <b>{role}</b>\n\
         📁 Files renamed: <b>{}</b>\n\
         💾 Total size: <b>{}</b>\n\
         📅 Last 7 days: <b>{}</b> files\n\
         🗓 Joined: {}\n\
         ⏱ Last active: {}",
        stats.files_renamed,
        format_file_size(stats.total_size),
        stats.recent_files,
        format_timestamp(stats.joined_at),
        format_timestamp(stats.last_active),
    )
}

fn format_recent(recent: &[(FileRecord, i64)]) -> String {
    if recent.is_empty() {
        return String::new();
    }

    let mut text = String::from("\n\n<b>🕘 Recent files</b>\n");
    for (record, at) in recent {
        text.push_str(&format!(
            "• <code>{}</code> ({}, {})\n",
            html_escape(&truncate_text(&record.new_name, 40)),
            format_file_size(record.file_size),
            format_timestamp(*at)
        ));
    }
    text
}

fn format_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "<b>🏆 Leaderboard</b>\n\nNo files renamed yet. Be the first!".to_string();
    }

    let mut text = String::from("<b>🏆 Leaderboard</b>\n\n");
    for (i, entry) in entries.iter().enumerate() {
        let rank = MEDALS
            .get(i)
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("{}.", i + 1));
        let name = format_username(entry.username.as_deref(), &entry.first_name);
        text.push_str(&format!(
            "{rank} {}: <b>{}</b> files ({})\n",
            html_escape(&name),
            entry.files_renamed,
            format_file_size(entry.total_size)
        ));
    }
    text
}

pub fn bot_stats_text(stats: &BotStats, running_jobs: usize) -> String {
    format!(
        "<b>📈 Bot statistics</b>\n\n\
         👥 Total users: <b>{}</b>\n\
         🟢 Active (7 days): <b>{}</b>\n\
         📁 Total files: <b>{}</b>\n\
         💾 Total size: <b>{}</b>\n\
         📅 Files today: <b>{}</b>\n\
         ⚙️ Running jobs: <b>{running_jobs}</b>\n\
         🚫 Banned users: <b>{}</b>\n\
         🛡 Admins: <b>{}</b>\n\
         📦 Dump channels: <b>{}</b>",
        stats.total_users,
        stats.active_users,
        stats.total_files,
        format_file_size(stats.total_size),
        stats.files_today,
        stats.banned_users,
        stats.admins,
        stats.dump_channels,
    )
}

pub async fn user_stats_text(state: &AppState, user_id: u64) -> anyhow::Result<String> {
    let role = state.permissions.access(user_id).await?.role;
    let stats = state.history.user_stats(user_id).await?.unwrap_or_default();
    let recent = state.history.recent(user_id, RECENT_FILES).await?;
    Ok(format_user_stats(&stats, role.label()) + &format_recent(&recent))
}

pub async fn leaderboard_text(state: &AppState) -> anyhow::Result<String> {
    let entries = state.history.leaderboard(LEADERBOARD_SIZE).await?;
    Ok(format_leaderboard(&entries))
}

/// Handle /stats.
pub async fn stats_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let text = user_stats_text(&state, sender_id(&msg)).await?;
    reply_menu(&bot, &msg, text, keyboards::back_to_main()).await?;
    Ok(())
}

/// Handle /leaderboard.
pub async fn leaderboard_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let text = leaderboard_text(&state).await?;
    reply_menu(&bot, &msg, text, keyboards::back_to_main()).await?;
    Ok(())
}

/// Handle /botstats.
pub async fn botstats_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    if !ensure_authorized(&bot, &msg, &state).await? {
        return Ok(());
    }

    let stats = state.history.bot_stats().await?;
    reply_menu(&bot, &msg, bot_stats_text(&stats, state.jobs.active()), keyboards::admin_panel())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, name: &str, files: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: id,
            username: None,
            first_name: name.to_string(),
            files_renamed: files,
            total_size: files * 1024,
        }
    }

    #[test]
    fn test_leaderboard_medals() {
        let entries: Vec<_> = (1..=4).map(|i| entry(i, &format!("U{i}"), 10 - i)).collect();
        let text = format_leaderboard(&entries);
        let lines: Vec<&str> = text.lines().skip(2).collect();

        assert!(lines[0].starts_with("🥇 U1"));
        assert!(lines[1].starts_with("🥈 U2"));
        assert!(lines[2].starts_with("🥉 U3"));
        assert!(lines[3].starts_with("4. U4"));
    }

    #[test]
    fn test_recent_files() {
        assert_eq!(format_recent(&[]), "");

        let record = FileRecord {
            user_id: 1,
            original_name: "a.mkv".into(),
            new_name: "Movie (2020).mkv".into(),
            file_size: 2048,
            file_type: "video".into(),
            processing_ms: 10,
        };
        let text = format_recent(&[(record, 0)]);
        assert!(text.contains("• <code>Movie (2020).mkv</code> (2.0 KB, 1970-01-01 00:00)"));
    }

    #[test]
    fn test_empty_leaderboard() {
        assert!(format_leaderboard(&[]).contains("No files renamed yet"));
    }

    #[test]
    fn test_user_stats_text() {
        let stats = UserStats {
            files_renamed: 3,
            total_size: 3 * 1024 * 1024,
            joined_at: 0,
            last_active: 86_400,
            recent_files: 1,
        };
        let text = format_user_stats(&stats, "Admin");
        assert!(text.contains("Role: <b>Admin</b>"));
        assert!(text.contains("Total size: <b>3.0 MB</b>"));
        assert!(text.contains("Joined: 1970-01-01 00:00"));
        assert!(text.contains("Last active: 1970-01-02 00:00"));
    }
}
