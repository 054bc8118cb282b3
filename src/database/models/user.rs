//! User records.

use serde::{Deserialize, Serialize};
use teloxide::types::User;

/// Who a user is to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Regular,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Admin => "Admin",
            Self::Regular => "User",
        }
    }
}

/// Profile fields refreshed from every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn from_telegram(user: &User) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// A stored user row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_banned: bool,
    pub is_admin: bool,
    pub joined_at: i64,
    pub last_active: i64,
    pub files_renamed: u64,
    pub total_size: u64,
}

impl UserRecord {
    /// Display name: first and last name joined.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}
