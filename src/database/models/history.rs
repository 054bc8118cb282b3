//! File history and the statistics derived from it.

use serde::{Deserialize, Serialize};

/// One processed file, as appended to the history log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub user_id: u64,
    pub original_name: String,
    pub new_name: String,
    pub file_size: u64,
    /// `document`, `video` or `audio`.
    pub file_type: String,
    pub processing_ms: u64,
}

/// Personal statistics shown by `/stats`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserStats {
    pub files_renamed: u64,
    pub total_size: u64,
    pub joined_at: i64,
    pub last_active: i64,
    /// Files processed during the last seven days.
    pub recent_files: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub files_renamed: u64,
    pub total_size: u64,
}

/// Global statistics for admins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BotStats {
    pub total_users: u64,
    pub active_users: u64,
    pub total_files: u64,
    pub total_size: u64,
    pub files_today: u64,
    pub banned_users: u64,
    pub admins: u64,
    pub dump_channels: u64,
}
