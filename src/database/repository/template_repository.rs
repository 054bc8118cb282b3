//! Saved format templates.

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use crate::database::Database;
use crate::database::models::FormatTemplate;

/// Most templates one user may keep.
pub const MAX_TEMPLATES_PER_USER: usize = 20;

const TEMPLATE_COLUMNS: &str = "id, user_id, name, template, variables, created_at";

pub struct TemplateRepository {
    db: Database,
}

impl TemplateRepository {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Save a template under `name`, replacing one with the same name.
    pub async fn save(&self, user_id: u64, name: &str, template: &str) -> Result<FormatTemplate> {
        let name = name.trim().to_string();
        let template = template.to_string();
        let variables = crate::template::placeholders(&template);
        let variables_json = serde_json::to_string(&variables)?;
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            "INSERT INTO format_templates (user_id, name, template, variables, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, name) DO UPDATE SET
                template = excluded.template,
                variables = excluded.variables
             RETURNING {TEMPLATE_COLUMNS}"
        );

        let saved = self
            .db
            .call(move |conn| {
                conn.query_row(
                    &sql,
                    params![user_id as i64, name, template, variables_json, now],
                    template_from_row,
                )
            })
            .await
            .context("saving template")?;

        debug!("Saved template {:?} for user {}", saved.name, user_id);
        Ok(saved)
    }

    /// All templates of a user, oldest first.
    pub async fn list(&self, user_id: u64) -> Result<Vec<FormatTemplate>> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM format_templates WHERE user_id = ?1 ORDER BY id"
        );
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![user_id as i64], template_from_row)?;
                rows.collect()
            })
            .await
    }

    pub async fn count(&self, user_id: u64) -> Result<usize> {
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM format_templates WHERE user_id = ?1",
                    params![user_id as i64],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await
            .map(|n| n as usize)
    }

    /// Find by name (case-insensitive).
    pub async fn get_by_name(&self, user_id: u64, name: &str) -> Result<Option<FormatTemplate>> {
        let name = name.trim().to_string();
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM format_templates
             WHERE user_id = ?1 AND name = ?2 COLLATE NOCASE"
        );
        self.db
            .call(move |conn| {
                conn.query_row(&sql, params![user_id as i64, name], template_from_row)
                    .optional()
            })
            .await
    }

    /// Find by row ID, scoped to the owner.
    pub async fn get(&self, user_id: u64, id: i64) -> Result<Option<FormatTemplate>> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM format_templates WHERE user_id = ?1 AND id = ?2"
        );
        self.db
            .call(move |conn| {
                conn.query_row(&sql, params![user_id as i64, id], template_from_row)
                    .optional()
            })
            .await
    }

    /// Delete by name. Returns whether a template was removed.
    pub async fn delete_by_name(&self, user_id: u64, name: &str) -> Result<bool> {
        let name = name.trim().to_string();
        let removed = self
            .db
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM format_templates WHERE user_id = ?1 AND name = ?2 COLLATE NOCASE",
                    params![user_id as i64, name],
                )
            })
            .await?;
        Ok(removed > 0)
    }

    /// Delete by row ID. Returns whether a template was removed.
    pub async fn delete(&self, user_id: u64, id: i64) -> Result<bool> {
        let removed = self
            .db
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM format_templates WHERE user_id = ?1 AND id = ?2",
                    params![user_id as i64, id],
                )
            })
            .await?;
        Ok(removed > 0)
    }
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<FormatTemplate> {
    let variables: String = row.get(4)?;
    Ok(FormatTemplate {
        id: row.get(0)?,
        user_id: row.get::<_, i64>(1)? as u64,
        name: row.get(2)?,
        template: row.get(3)?,
        variables: serde_json::from_str(&variables).unwrap_or_default(),
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_list_and_replace() {
        let db = Database::in_memory().unwrap();
        let repo = TemplateRepository::new(&db);

        let saved = repo.save(1, "music", "{artist} - {title}").await.unwrap();
        assert_eq!(saved.variables, vec!["artist".to_string(), "title".to_string()]);

        repo.save(1, "movie", "{title} ({year})").await.unwrap();
        repo.save(1, "music", "{title}").await.unwrap();
        repo.save(2, "music", "{album}").await.unwrap();

        let list = repo.list(1).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "music");
        assert_eq!(list[0].template, "{title}");
        assert_eq!(repo.count(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup_and_delete() {
        let db = Database::in_memory().unwrap();
        let repo = TemplateRepository::new(&db);

        let saved = repo.save(1, "Movie", "{title}").await.unwrap();
        assert!(repo.get_by_name(1, "movie").await.unwrap().is_some());
        assert!(repo.get(2, saved.id).await.unwrap().is_none());

        assert!(!repo.delete(2, saved.id).await.unwrap());
        assert!(repo.delete_by_name(1, "MOVIE").await.unwrap());
        assert!(repo.list(1).await.unwrap().is_empty());
    }
}
