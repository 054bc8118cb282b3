//! User settings repository.
//!
//! Settings are read on every upload and every menu render, so reads are
//! served from cache and writes go through to SQLite.

use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::Database;
use crate::database::models::{MetadataTags, UserSettings};

pub struct SettingsRepository {
    db: Database,
    default_format: Arc<str>,
    cache: TypedCache<u64, UserSettings>,
}

impl SettingsRepository {
    pub fn new(db: &Database, default_format: &str) -> Self {
        let cache = TypedCache::new("user_settings", CacheConfig::user_settings());

        Self {
            db: db.clone(),
            default_format: Arc::from(default_format),
            cache,
        }
    }

    /// Get a user's settings, creating the defaults if the row is missing.
    pub async fn get(&self, user_id: u64) -> Result<UserSettings> {
        if let Some(settings) = self.cache.get(&user_id) {
            return Ok(settings);
        }

        let stored = self
            .db
            .call(move |conn| {
                conn.query_row(
                    "SELECT user_id, rename_mode, media_type, format_template, auto_thumbnail,
                            thumbnail_file_id, metadata_enabled, metadata
                     FROM user_settings WHERE user_id = ?1",
                    params![user_id as i64],
                    settings_from_row,
                )
                .optional()
            })
            .await
            .context("loading settings")?;

        let settings = match stored {
            Some(settings) => settings,
            None => {
                let defaults = UserSettings::new(user_id, &self.default_format);
                self.save(&defaults).await?;
                defaults
            }
        };

        self.cache.insert(user_id, settings.clone());
        Ok(settings)
    }

    /// Save settings (upsert).
    pub async fn save(&self, settings: &UserSettings) -> Result<()> {
        let s = settings.clone();
        let metadata = serde_json::to_string(&s.metadata)?;

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO user_settings (user_id, rename_mode, media_type, format_template,
                        auto_thumbnail, thumbnail_file_id, metadata_enabled, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(user_id) DO UPDATE SET
                        rename_mode = excluded.rename_mode,
                        media_type = excluded.media_type,
                        format_template = excluded.format_template,
                        auto_thumbnail = excluded.auto_thumbnail,
                        thumbnail_file_id = excluded.thumbnail_file_id,
                        metadata_enabled = excluded.metadata_enabled,
                        metadata = excluded.metadata",
                    params![
                        s.user_id as i64,
                        s.rename_mode.as_str(),
                        s.media_type.as_str(),
                        s.format_template,
                        s.auto_thumbnail,
                        s.thumbnail_file_id,
                        s.metadata_enabled,
                        metadata,
                    ],
                )
            })
            .await
            .context("saving settings")?;

        self.cache.insert(settings.user_id, settings.clone());
        debug!("Saved settings for user {}", settings.user_id);
        Ok(())
    }

    /// Load, modify and save in one step. Returns the new settings.
    pub async fn update<F>(&self, user_id: u64, f: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut settings = self.get(user_id).await?;
        f(&mut settings);
        self.save(&settings).await?;
        Ok(settings)
    }

    /// The format new users start with.
    pub fn default_format(&self) -> &str {
        &self.default_format
    }
}

fn settings_from_row(row: &Row<'_>) -> rusqlite::Result<UserSettings> {
    let rename_mode: String = row.get(1)?;
    let media_type: String = row.get(2)?;
    let metadata: String = row.get(7)?;

    Ok(UserSettings {
        user_id: row.get::<_, i64>(0)? as u64,
        rename_mode: rename_mode.parse().unwrap_or_default(),
        media_type: media_type.parse().unwrap_or_default(),
        format_template: row.get(3)?,
        auto_thumbnail: row.get(4)?,
        thumbnail_file_id: row.get(5)?,
        metadata_enabled: row.get(6)?,
        metadata: serde_json::from_str::<MetadataTags>(&metadata).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{MediaType, MetadataField, RenameMode};

    #[tokio::test]
    async fn test_get_creates_defaults() {
        let db = Database::in_memory().unwrap();
        let repo = SettingsRepository::new(&db, "{title} [{year}]");

        let settings = repo.get(9).await.unwrap();
        assert_eq!(settings, UserSettings::new(9, "{title} [{year}]"));
    }

    #[tokio::test]
    async fn test_update_persists() {
        let db = Database::in_memory().unwrap();
        let repo = SettingsRepository::new(&db, "{title}");

        repo.update(3, |s| {
            s.rename_mode = RenameMode::Manual;
            s.media_type = MediaType::Video;
            s.thumbnail_file_id = Some("AgAD".into());
            s.metadata_enabled = true;
            s.metadata.set(MetadataField::Author, Some("Me".into()));
        })
        .await
        .unwrap();

        // A fresh repository has a cold cache and must read from SQLite.
        let cold = SettingsRepository::new(&db, "{title}");
        let settings = cold.get(3).await.unwrap();
        assert_eq!(settings.rename_mode, RenameMode::Manual);
        assert_eq!(settings.media_type, MediaType::Video);
        assert_eq!(settings.thumbnail_file_id.as_deref(), Some("AgAD"));
        assert!(settings.metadata_enabled);
        assert_eq!(settings.metadata.get(MetadataField::Author), Some("Me"));
    }
}
