use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::db::{helpers::parse_optional_datetime, Database};
use crate::zones::ZoneConfig;

type ZoneConfigRow = (f64, f64, f64, f64, bool, bool, Option<String>, f64);

impl Database {
    pub async fn load_zone_config(&self, user_id: &str) -> Result<Option<ZoneConfig>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let row: Option<ZoneConfigRow> = conn
                .query_row(
                    "SELECT danger_radius, warning_radius, attention_radius, awareness_radius,
                            alert_outside_zone, expanded_awareness, expansion_deadline,
                            expansion_duration_secs
                     FROM zone_configs
                     WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                        ))
                    },
                )
                .optional()
                .context("failed to query zone config")?;

            let Some((danger, warning, attention, awareness, outside, expanded, deadline, duration)) =
                row
            else {
                return Ok(None);
            };

            Ok(Some(ZoneConfig {
                danger_radius: danger,
                warning_radius: warning,
                attention_radius: attention,
                awareness_radius: awareness,
                alert_outside_zone: outside,
                expanded_awareness: expanded,
                expansion_deadline: parse_optional_datetime(deadline, "expansion_deadline")?,
                expansion_duration_secs: duration,
            }))
        })
        .await
    }

    /// Upsert the user's zone config in the background, stamped with `updated_at`.
    pub fn save_zone_config_detached(
        &self,
        user_id: &str,
        config: ZoneConfig,
        updated_at: DateTime<Utc>,
    ) {
        let user_id = user_id.to_string();
        self.submit("save zone config", move |conn| {
            conn.execute(
                "INSERT INTO zone_configs
                     (user_id, danger_radius, warning_radius, attention_radius, awareness_radius,
                      alert_outside_zone, expanded_awareness, expansion_deadline,
                      expansion_duration_secs, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(user_id) DO UPDATE SET
                     danger_radius = excluded.danger_radius,
                     warning_radius = excluded.warning_radius,
                     attention_radius = excluded.attention_radius,
                     awareness_radius = excluded.awareness_radius,
                     alert_outside_zone = excluded.alert_outside_zone,
                     expanded_awareness = excluded.expanded_awareness,
                     expansion_deadline = excluded.expansion_deadline,
                     expansion_duration_secs = excluded.expansion_duration_secs,
                     updated_at = excluded.updated_at",
                params![
                    user_id,
                    config.danger_radius,
                    config.warning_radius,
                    config.attention_radius,
                    config.awareness_radius,
                    config.alert_outside_zone,
                    config.expanded_awareness,
                    config.expansion_deadline.map(|dt| dt.to_rfc3339()),
                    config.expansion_duration_secs,
                    updated_at.to_rfc3339(),
                ],
            )
            .context("failed to upsert zone config")?;
            Ok(())
        });
    }
}
