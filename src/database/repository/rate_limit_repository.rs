//! Persistent per-user rate limit windows.

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::database::models::{Admission, RateWindow};

pub struct RateLimitRepository {
    db: Database,
    max_requests: u32,
    window_secs: u64,
}

impl RateLimitRepository {
    pub fn new(db: &Database, max_requests: u32, window_secs: u64) -> Self {
        Self {
            db: db.clone(),
            max_requests,
            window_secs,
        }
    }

    /// Count a request from `user_id` made at `now`.
    pub async fn admit(&self, user_id: u64, now: i64) -> Result<Admission> {
        let (max, window) = (self.max_requests, self.window_secs);

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let stored = tx
                    .query_row(
                        "SELECT request_count, window_start FROM rate_limits WHERE user_id = ?1",
                        params![user_id as i64],
                        |row| {
                            Ok(RateWindow {
                                request_count: row.get(0)?,
                                window_start: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;

                let mut window_state = stored.unwrap_or_else(|| RateWindow::open(now));
                let admission = window_state.admit(now, max, window);

                if admission.is_allowed() {
                    tx.execute(
                        "INSERT INTO rate_limits (user_id, request_count, window_start)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT(user_id) DO UPDATE SET
                            request_count = excluded.request_count,
                            window_start = excluded.window_start",
                        params![user_id as i64, window_state.request_count, window_state.window_start],
                    )?;
                }
                tx.commit()?;
                Ok(admission)
            })
            .await
            .context("checking rate limit")
    }

    /// Forget a user's window.
    pub async fn reset(&self, user_id: u64) -> Result<()> {
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM rate_limits WHERE user_id = ?1", params![user_id as i64])
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sixth_request_in_window_is_limited() {
        let db = Database::in_memory().unwrap();
        let repo = RateLimitRepository::new(&db, 5, 60);

        for i in 0..5 {
            assert!(repo.admit(1, 100 + i).await.unwrap().is_allowed());
        }
        assert_eq!(
            repo.admit(1, 110).await.unwrap(),
            Admission::Limited { retry_after: 50 }
        );

        // Other users have their own window.
        assert!(repo.admit(2, 110).await.unwrap().is_allowed());

        // The window expires 60 seconds after it opened.
        assert!(repo.admit(1, 160).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_reset() {
        let db = Database::in_memory().unwrap();
        let repo = RateLimitRepository::new(&db, 1, 60);

        assert!(repo.admit(1, 0).await.unwrap().is_allowed());
        assert!(!repo.admit(1, 1).await.unwrap().is_allowed());
        repo.reset(1).await.unwrap();
        assert!(repo.admit(1, 2).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_zero_limit_admits_nobody() {
        let db = Database::in_memory().unwrap();
        let repo = RateLimitRepository::new(&db, 0, 60);

        assert!(!repo.admit(1, 100).await.unwrap().is_allowed());
        assert!(!repo.admit(1, 100).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_unbounded_window_keeps_counting() {
        let db = Database::in_memory().unwrap();
        let repo = RateLimitRepository::new(&db, 1, u64::MAX);

        assert!(repo.admit(1, 100).await.unwrap().is_allowed());
        for now in 101..105 {
            assert!(!repo.admit(1, now).await.unwrap().is_allowed());
        }
    }
}
