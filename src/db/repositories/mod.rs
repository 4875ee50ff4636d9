mod preferences;
mod zone_configs;

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::models::UserPreference;
use crate::zones::ZoneConfig;

/// Write-behind handle binding a database to one user.
///
/// Components keep one of these and push snapshots after each change; the
/// decision path never waits on it.
#[derive(Clone)]
pub struct UserStorage {
    db: Database,
    user_id: String,
}

impl UserStorage {
    pub fn new(db: Database, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
        }
    }

    pub fn save_preferences(&self, preferences: Vec<UserPreference>) {
        self.db.save_preferences_detached(&self.user_id, preferences);
    }

    pub fn save_zone_config(&self, config: &ZoneConfig, updated_at: DateTime<Utc>) {
        self.db
            .save_zone_config_detached(&self.user_id, config.clone(), updated_at);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[tokio::test]
    async fn preferences_round_trip_per_user() {
        let db = Database::in_memory().unwrap();
        let storage = UserStorage::new(db.clone(), "alice");

        let mut chair = UserPreference::neutral("chair");
        chair.priority_adjustment = -0.3;
        chair.ignore_count = 6;
        chair.last_updated = Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap());
        storage.save_preferences(vec![chair.clone(), UserPreference::neutral("door")]);

        let loaded = db.load_preferences("alice").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], chair);
        assert!(db.load_preferences("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saving_replaces_previous_snapshot() {
        let db = Database::in_memory().unwrap();
        let storage = UserStorage::new(db.clone(), "alice");

        storage.save_preferences(vec![UserPreference::neutral("chair")]);
        storage.save_preferences(vec![UserPreference::neutral("door")]);

        let loaded = db.load_preferences("alice").await.unwrap();
        assert_eq!(loaded, vec![UserPreference::neutral("door")]);
    }

    #[tokio::test]
    async fn zone_config_upserts() {
        let db = Database::in_memory().unwrap();
        let storage = UserStorage::new(db.clone(), "alice");
        let saved_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        assert!(db.load_zone_config("alice").await.unwrap().is_none());

        let mut config = ZoneConfig::default();
        config.expanded_awareness = true;
        config.expansion_deadline = Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 30).unwrap());
        storage.save_zone_config(&config, saved_at);
        assert_eq!(db.load_zone_config("alice").await.unwrap(), Some(config.clone()));

        config.expanded_awareness = false;
        config.expansion_deadline = None;
        config.warning_radius = 2.0;
        storage.save_zone_config(&config, saved_at);
        assert_eq!(db.load_zone_config("alice").await.unwrap(), Some(config));
    }

    #[tokio::test]
    async fn zone_config_is_stamped_with_the_given_instant() {
        let db = Database::in_memory().unwrap();
        let storage = UserStorage::new(db.clone(), "alice");
        let saved_at = Utc.with_ymd_and_hms(2019, 7, 4, 12, 0, 0).unwrap();
        storage.save_zone_config(&ZoneConfig::default(), saved_at);

        let stamp: String = db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT updated_at FROM zone_configs WHERE user_id = 'alice'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(stamp, saved_at.to_rfc3339());
    }
}
