use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{parse_optional_datetime, to_u32},
    Database,
};
use crate::models::UserPreference;

fn row_to_preference(row: &Row) -> Result<UserPreference> {
    Ok(UserPreference {
        object_class: row.get("object_class")?,
        priority_adjustment: row.get("priority_adjustment")?,
        ignore_count: to_u32(row.get("ignore_count")?, "ignore_count")?,
        action_count: to_u32(row.get("action_count")?, "action_count")?,
        last_updated: parse_optional_datetime(row.get("last_updated")?, "last_updated")?,
    })
}

impl Database {
    /// All stored preferences for a user; empty when the user has none.
    pub async fn load_preferences(&self, user_id: &str) -> Result<Vec<UserPreference>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT object_class, priority_adjustment, ignore_count, action_count, last_updated
                 FROM user_preferences
                 WHERE user_id = ?1
                 ORDER BY object_class",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut preferences = Vec::new();
            while let Some(row) = rows.next()? {
                preferences.push(row_to_preference(row)?);
            }
            Ok(preferences)
        })
        .await
    }

    /// Replace the user's stored preferences with `preferences`, in the background.
    pub fn save_preferences_detached(&self, user_id: &str, preferences: Vec<UserPreference>) {
        let user_id = user_id.to_string();
        self.submit("save preferences", move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open preferences transaction")?;
            tx.execute(
                "DELETE FROM user_preferences WHERE user_id = ?1",
                params![user_id],
            )?;
            for preference in &preferences {
                tx.execute(
                    "INSERT INTO user_preferences
                         (user_id, object_class, priority_adjustment, ignore_count, action_count, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        user_id,
                        preference.object_class,
                        preference.priority_adjustment,
                        preference.ignore_count,
                        preference.action_count,
                        preference.last_updated.map(|dt| dt.to_rfc3339()),
                    ],
                )
                .with_context(|| {
                    format!("failed to store preference for {}", preference.object_class)
                })?;
            }
            tx.commit().context("failed to commit preferences")?;
            Ok(())
        });
    }
}
