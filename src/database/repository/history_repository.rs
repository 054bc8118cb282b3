//! File history and statistics.

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::database::Database;
use crate::database::models::{BotStats, FileRecord, LeaderboardEntry, UserStats};

const DAY_SECS: i64 = 24 * 60 * 60;

pub struct HistoryRepository {
    db: Database,
}

impl HistoryRepository {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Append a processed file and bump the owner's counters.
    pub async fn record(&self, record: &FileRecord) -> Result<()> {
        let r = record.clone();
        let now = chrono::Utc::now().timestamp();

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO file_history
                        (user_id, original_name, new_name, file_size, file_type, processing_ms, processed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        r.user_id as i64,
                        r.original_name,
                        r.new_name,
                        r.file_size as i64,
                        r.file_type,
                        r.processing_ms as i64,
                        now,
                    ],
                )?;
                tx.execute(
                    "UPDATE users SET files_renamed = files_renamed + 1,
                                      total_size = total_size + ?2,
                                      last_active = ?3
                     WHERE user_id = ?1",
                    params![r.user_id as i64, r.file_size as i64, now],
                )?;
                tx.commit()
            })
            .await
            .context("recording file history")?;

        debug!("Recorded {:?} -> {:?} for user {}", record.original_name, record.new_name, record.user_id);
        Ok(())
    }

    /// Most recent files of a user, newest first, with their timestamps.
    pub async fn recent(&self, user_id: u64, limit: usize) -> Result<Vec<(FileRecord, i64)>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, original_name, new_name, file_size, file_type, processing_ms, processed_at
                     FROM file_history WHERE user_id = ?1
                     ORDER BY processed_at DESC, id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![user_id as i64, limit as i64], |row| {
                    Ok((
                        FileRecord {
                            user_id: row.get::<_, i64>(0)? as u64,
                            original_name: row.get(1)?,
                            new_name: row.get(2)?,
                            file_size: row.get::<_, i64>(3)? as u64,
                            file_type: row.get(4)?,
                            processing_ms: row.get::<_, i64>(5)? as u64,
                        },
                        row.get::<_, i64>(6)?,
                    ))
                })?;
                rows.collect()
            })
            .await
    }

    /// Personal statistics, or `None` for unknown users.
    pub async fn user_stats(&self, user_id: u64) -> Result<Option<UserStats>> {
        let week_ago = chrono::Utc::now().timestamp() - 7 * DAY_SECS;

        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT u.files_renamed, u.total_size, u.joined_at, u.last_active,
                            (SELECT COUNT(*) FROM file_history h
                              WHERE h.user_id = u.user_id AND h.processed_at >= ?2)
                     FROM users u WHERE u.user_id = ?1",
                    params![user_id as i64, week_ago],
                    |row| {
                        Ok(UserStats {
                            files_renamed: row.get::<_, i64>(0)? as u64,
                            total_size: row.get::<_, i64>(1)? as u64,
                            joined_at: row.get(2)?,
                            last_active: row.get(3)?,
                            recent_files: row.get::<_, i64>(4)? as u64,
                        })
                    },
                )
                .optional()
            })
            .await
    }

    /// Top non-banned users by files renamed.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, username, first_name, files_renamed, total_size
                     FROM users
                     WHERE is_banned = 0 AND files_renamed > 0
                     ORDER BY files_renamed DESC, total_size DESC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit as i64], |row| {
                    Ok(LeaderboardEntry {
                        user_id: row.get::<_, i64>(0)? as u64,
                        username: row.get(1)?,
                        first_name: row.get(2)?,
                        files_renamed: row.get::<_, i64>(3)? as u64,
                        total_size: row.get::<_, i64>(4)? as u64,
                    })
                })?;
                rows.collect()
            })
            .await
    }

    /// Global statistics.
    pub async fn bot_stats(&self) -> Result<BotStats> {
        let now = chrono::Utc::now().timestamp();
        let week_ago = now - 7 * DAY_SECS;
        let day_ago = now - DAY_SECS;

        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT
                        (SELECT COUNT(*) FROM users),
                        (SELECT COUNT(*) FROM users WHERE last_active >= ?1),
                        (SELECT COUNT(*) FROM file_history),
                        (SELECT COALESCE(SUM(file_size), 0) FROM file_history),
                        (SELECT COUNT(*) FROM file_history WHERE processed_at >= ?2),
                        (SELECT COUNT(*) FROM users WHERE is_banned = 1),
                        (SELECT COUNT(*) FROM users WHERE is_admin = 1),
                        (SELECT COUNT(*) FROM dump_channels WHERE is_active = 1)",
                    params![week_ago, day_ago],
                    |row| {
                        let n = |i: usize| row.get::<_, i64>(i).map(|v| v as u64);
                        Ok(BotStats {
                            total_users: n(0)?,
                            active_users: n(1)?,
                            total_files: n(2)?,
                            total_size: n(3)?,
                            files_today: n(4)?,
                            banned_users: n(5)?,
                            admins: n(6)?,
                            dump_channels: n(7)?,
                        })
                    },
                )
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::UserRepo;
    use crate::database::models::UserProfile;

    fn record(user_id: u64, size: u64) -> FileRecord {
        FileRecord {
            user_id,
            original_name: "in.mkv".into(),
            new_name: "out.mkv".into(),
            file_size: size,
            file_type: "video".into(),
            processing_ms: 1200,
        }
    }

    async fn seed_users(db: &Database, ids: &[u64]) {
        let users = UserRepo::new(db, "{title}");
        for id in ids {
            users
                .upsert(&UserProfile {
                    user_id: *id,
                    username: None,
                    first_name: format!("User{id}"),
                    last_name: None,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_record_updates_counters() {
        let db = Database::in_memory().unwrap();
        seed_users(&db, &[1]).await;
        let repo = HistoryRepository::new(&db);

        repo.record(&record(1, 100)).await.unwrap();
        repo.record(&record(1, 250)).await.unwrap();

        let stats = repo.user_stats(1).await.unwrap().unwrap();
        assert_eq!(stats.files_renamed, 2);
        assert_eq!(stats.total_size, 350);
        assert_eq!(stats.recent_files, 2);

        let recent = repo.recent(1, 1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].0.file_size, 250);

        assert!(repo.user_stats(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_skips_banned() {
        let db = Database::in_memory().unwrap();
        seed_users(&db, &[1, 2, 3]).await;
        let repo = HistoryRepository::new(&db);

        repo.record(&record(1, 10)).await.unwrap();
        for _ in 0..3 {
            repo.record(&record(2, 10)).await.unwrap();
        }
        repo.record(&record(3, 10)).await.unwrap();
        repo.record(&record(3, 10)).await.unwrap();
        UserRepo::new(&db, "{title}").set_banned(3, true).await.unwrap();

        let board = repo.leaderboard(10).await.unwrap();
        let ids: Vec<u64> = board.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_bot_stats() {
        let db = Database::in_memory().unwrap();
        seed_users(&db, &[1, 2]).await;
        let users = UserRepo::new(&db, "{title}");
        users.set_admin(2, true).await.unwrap();
        users.set_banned(1, true).await.unwrap();

        let repo = HistoryRepository::new(&db);
        repo.record(&record(2, 1024)).await.unwrap();

        let stats = repo.bot_stats().await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 2);
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.total_size, 1024);
        assert_eq!(stats.files_today, 1);
        assert_eq!(stats.banned_users, 1);
        assert_eq!(stats.admins, 1);
        assert_eq!(stats.dump_channels, 0);
    }
}
