//! User repository with cache-first writes.
//!
//! Every update refreshes the sender's profile. The cache remembers the
//! last written profile for a minute so bursts of updates from one user
//! cost a single write.

use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, params};
use tokio::spawn;
use tracing::{debug, warn};

use super::Database;
use super::models::{UserProfile, UserRecord};
use crate::cache::{CacheConfig, TypedCache};

const USER_COLUMNS: &str = "user_id, username, first_name, last_name, is_banned, is_admin, \
                            joined_at, last_active, files_renamed, total_size";

/// Repository for user rows.
pub struct UserRepo {
    db: Database,
    default_format: Arc<str>,
    recently_seen: TypedCache<u64, UserProfile>,
}

impl UserRepo {
    pub fn new(db: &Database, default_format: &str) -> Self {
        let recently_seen = TypedCache::new(
            "users_seen",
            CacheConfig::seen_users(),
        );

        Self {
            db: db.clone(),
            default_format: Arc::from(default_format),
            recently_seen,
        }
    }

    /// Insert or refresh a user, creating their settings row on first sight.
    pub async fn upsert(&self, profile: &UserProfile) -> Result<()> {
        if self.recently_seen.get(&profile.user_id).as_ref() == Some(profile) {
            return Ok(());
        }

        let p = profile.clone();
        let default_format = Arc::clone(&self.default_format);
        let now = chrono::Utc::now().timestamp();

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO users (user_id, username, first_name, last_name, joined_at, last_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(user_id) DO UPDATE SET
                        username = excluded.username,
                        first_name = excluded.first_name,
                        last_name = excluded.last_name,
                        last_active = excluded.last_active",
                    params![p.user_id as i64, p.username, p.first_name, p.last_name, now],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO user_settings (user_id, format_template) VALUES (?1, ?2)",
                    params![p.user_id as i64, &*default_format],
                )?;
                tx.commit()
            })
            .await
            .context("upserting user")?;

        self.recently_seen.insert(profile.user_id, profile.clone());
        debug!("Upserted user {} (@{:?})", profile.user_id, profile.username);
        Ok(())
    }

    /// Upsert user in background (non-blocking).
    pub fn upsert_background(self: Arc<Self>, profile: UserProfile) {
        spawn(async move {
            if let Err(e) = self.upsert(&profile).await {
                warn!("Failed to upsert user {}: {:#}", profile.user_id, e);
            }
        });
    }

    /// Get user by ID.
    pub async fn get(&self, user_id: u64) -> Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1");
        self.db
            .call(move |conn| {
                conn.query_row(&sql, params![user_id as i64], user_from_row)
                    .optional()
            })
            .await
    }

    /// Set or lift a ban. Unknown users get a placeholder row so the ban
    /// applies once they show up.
    pub async fn set_banned(&self, user_id: u64, banned: bool) -> Result<()> {
        self.set_flag(user_id, "is_banned", banned).await
    }

    /// Grant or revoke admin rights.
    pub async fn set_admin(&self, user_id: u64, admin: bool) -> Result<()> {
        self.set_flag(user_id, "is_admin", admin).await
    }

    async fn set_flag(&self, user_id: u64, column: &'static str, value: bool) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            "INSERT INTO users (user_id, joined_at, last_active, {column}) VALUES (?1, ?2, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET {column} = excluded.{column}"
        );
        self.db
            .call(move |conn| conn.execute(&sql, params![user_id as i64, now, value]))
            .await
            .with_context(|| format!("updating {column} for {user_id}"))?;

        self.recently_seen.invalidate(&user_id);
        debug!("Set {} = {} for user {}", column, value, user_id);
        Ok(())
    }

    /// IDs of every user that may receive broadcasts.
    pub async fn active_user_ids(&self) -> Result<Vec<u64>> {
        self.db
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT user_id FROM users WHERE is_banned = 0 ORDER BY user_id")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(ids.into_iter().map(|id| id as u64).collect())
            })
            .await
    }

    /// Users with admin rights stored in the database.
    pub async fn admins(&self) -> Result<Vec<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE is_admin = 1 ORDER BY user_id");
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], user_from_row)?;
                rows.collect()
            })
            .await
    }

    /// Most recently active users, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<UserRecord>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY last_active DESC, user_id LIMIT ?1"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![limit], user_from_row)?;
                rows.collect()
            })
            .await
    }
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get::<_, i64>(0)? as u64,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        is_banned: row.get(4)?,
        is_admin: row.get(5)?,
        joined_at: row.get(6)?,
        last_active: row.get(7)?,
        files_renamed: row.get::<_, i64>(8)? as u64,
        total_size: row.get::<_, i64>(9)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: u64, name: &str) -> UserProfile {
        UserProfile {
            user_id: id,
            username: Some(format!("{name}_handle")),
            first_name: name.to_string(),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_user_and_settings() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepo::new(&db, "{title}");

        repo.upsert(&profile(1, "Ana")).await.unwrap();
        let user = repo.get(1).await.unwrap().unwrap();
        assert_eq!(user.first_name, "Ana");
        assert!(!user.is_banned);

        let template: String = db
            .call(|conn| {
                conn.query_row(
                    "SELECT format_template FROM user_settings WHERE user_id = 1",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(template, "{title}");
    }

    #[tokio::test]
    async fn test_upsert_refreshes_profile() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepo::new(&db, "{title}");

        repo.upsert(&profile(1, "Ana")).await.unwrap();
        repo.upsert(&profile(1, "Bea")).await.unwrap();
        assert_eq!(repo.get(1).await.unwrap().unwrap().first_name, "Bea");
    }

    #[tokio::test]
    async fn test_ban_unknown_user_then_list() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepo::new(&db, "{title}");

        repo.upsert(&profile(1, "Ana")).await.unwrap();
        repo.set_banned(2, true).await.unwrap();
        assert!(repo.get(2).await.unwrap().unwrap().is_banned);
        assert_eq!(repo.active_user_ids().await.unwrap(), vec![1]);

        repo.set_banned(2, false).await.unwrap();
        assert_eq!(repo.active_user_ids().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_admin_flag() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepo::new(&db, "{title}");

        repo.set_admin(5, true).await.unwrap();
        let admins = repo.admins().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].user_id, 5);
    }

    #[tokio::test]
    async fn test_recent_lists_newest_first() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepo::new(&db, "{title}");

        for id in 1..=3 {
            repo.upsert(&profile(id, "User")).await.unwrap();
        }
        db.call(|conn| conn.execute("UPDATE users SET last_active = user_id * 100", []))
            .await
            .unwrap();

        let ids: Vec<u64> = repo.recent(2).await.unwrap().iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
