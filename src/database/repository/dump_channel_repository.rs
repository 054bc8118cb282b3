//! Dump channel repository.
//!
//! The active list is read after every processed file, so it is cached as
//! a whole and invalidated on any change.

use anyhow::{Context, Result};
use rusqlite::params;
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::Database;
use crate::database::models::DumpChannel;

pub struct DumpChannelRepository {
    db: Database,
    active: TypedCache<(), Vec<DumpChannel>>,
}

impl DumpChannelRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            active: TypedCache::new(
                "dump_channels",
                CacheConfig::dump_channels(),
            ),
        }
    }

    /// Add or re-activate a channel.
    pub async fn add(&self, channel_id: i64, channel_name: &str, added_by: u64) -> Result<()> {
        let name = channel_name.to_string();
        let now = chrono::Utc::now().timestamp();

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO dump_channels (channel_id, channel_name, added_by, added_at, is_active)
                     VALUES (?1, ?2, ?3, ?4, 1)
                     ON CONFLICT(channel_id) DO UPDATE SET
                        channel_name = excluded.channel_name,
                        added_by = excluded.added_by,
                        added_at = excluded.added_at,
                        is_active = 1",
                    params![channel_id, name, added_by as i64, now],
                )
            })
            .await
            .context("adding dump channel")?;

        self.active.invalidate(&());
        debug!("Dump channel {} added by {}", channel_id, added_by);
        Ok(())
    }

    /// Deactivate a channel. Returns whether it was active.
    pub async fn remove(&self, channel_id: i64) -> Result<bool> {
        let changed = self
            .db
            .call(move |conn| {
                conn.execute(
                    "UPDATE dump_channels SET is_active = 0 WHERE channel_id = ?1 AND is_active = 1",
                    params![channel_id],
                )
            })
            .await
            .context("removing dump channel")?;

        self.active.invalidate(&());
        Ok(changed > 0)
    }

    /// Every active channel.
    pub async fn active(&self) -> Result<Vec<DumpChannel>> {
        if let Some(list) = self.active.get(&()) {
            return Ok(list);
        }

        let list = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT channel_id, channel_name, added_by, added_at, is_active
                     FROM dump_channels WHERE is_active = 1 ORDER BY added_at",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(DumpChannel {
                        channel_id: row.get(0)?,
                        channel_name: row.get(1)?,
                        added_by: row.get::<_, i64>(2)? as u64,
                        added_at: row.get(3)?,
                        is_active: row.get(4)?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        self.active.insert((), list.clone());
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_remove_readd() {
        let db = Database::in_memory().unwrap();
        let repo = DumpChannelRepository::new(&db);

        repo.add(-1001, "Archive", 7).await.unwrap();
        repo.add(-1002, "Backup", 7).await.unwrap();
        assert_eq!(repo.active().await.unwrap().len(), 2);

        assert!(repo.remove(-1001).await.unwrap());
        assert!(!repo.remove(-1001).await.unwrap());
        let active = repo.active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].channel_name, "Backup");

        repo.add(-1001, "Archive v2", 8).await.unwrap();
        assert_eq!(repo.active().await.unwrap().len(), 2);
    }
}
