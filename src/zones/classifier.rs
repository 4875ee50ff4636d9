use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::clock::Clock;
use crate::db::UserStorage;
use crate::error::EngineError;
use crate::models::Detection;

use super::config::{Zone, ZoneConfig};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExpansionNotice {
    pub message: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ZonedDetection {
    pub zone: Zone,
    pub detection: Detection,
}

/// Per-zone counts plus a one-line spoken overview.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ZoneSummary {
    pub danger_count: usize,
    pub warning_count: usize,
    pub attention_count: usize,
    pub awareness_count: usize,
    pub outside_count: usize,
    pub closest_danger: Option<Detection>,
    pub message: String,
    pub expanded_awareness: bool,
}

/// Maps distances onto proximity zones for one user.
pub struct ZoneClassifier {
    config: ZoneConfig,
    clock: Arc<dyn Clock>,
    storage: Option<UserStorage>,
}

impl ZoneClassifier {
    pub fn new(config: ZoneConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            storage: None,
        }
    }

    /// Persist the config after every expand, collapse and radius update.
    pub fn with_storage(mut self, storage: UserStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Zone upper bounds are inclusive: with default radii 0.5 m is still danger.
    /// Negative or non-finite distances classify as outside.
    pub fn classify(&self, distance: f64) -> Zone {
        if !distance.is_finite() || distance < 0.0 {
            return Zone::Outside;
        }

        let radii = self.config.radii();
        if distance <= radii[0] {
            Zone::Danger
        } else if distance <= radii[1] {
            Zone::Warning
        } else if distance <= radii[2] {
            Zone::Attention
        } else if distance <= radii[3] {
            Zone::Awareness
        } else {
            Zone::Outside
        }
    }

    /// Partition a batch by zone. Every zone is present, possibly empty.
    pub fn classify_batch<'a>(
        &self,
        detections: &'a [Detection],
    ) -> BTreeMap<Zone, Vec<&'a Detection>> {
        let mut classified: BTreeMap<Zone, Vec<&Detection>> =
            Zone::ALL.iter().map(|zone| (*zone, Vec::new())).collect();
        for detection in detections {
            classified
                .entry(self.classify(detection.distance_m))
                .or_default()
                .push(detection);
        }
        classified
    }

    /// Objects inside the personal zones, nearest zone first then by distance.
    /// Objects outside are kept only while awareness is expanded or
    /// `alert_outside_zone` is on.
    pub fn filter_by_zone(&mut self, detections: &[Detection]) -> Vec<ZonedDetection> {
        self.tick();

        let include_outside = self.config.reports_outside();
        let mut filtered: Vec<ZonedDetection> = detections
            .iter()
            .map(|detection| ZonedDetection {
                zone: self.classify(detection.distance_m),
                detection: detection.clone(),
            })
            .filter(|zoned| include_outside || zoned.zone != Zone::Outside)
            .collect();

        filtered.sort_by(|a, b| {
            a.zone
                .cmp(&b.zone)
                .then(a.detection.distance_m.total_cmp(&b.detection.distance_m))
        });
        filtered
    }

    pub fn summary(&self, detections: &[Detection]) -> ZoneSummary {
        let classified = self.classify_batch(detections);
        let count = |zone: Zone| classified.get(&zone).map_or(0, Vec::len);
        let danger = classified.get(&Zone::Danger).cloned().unwrap_or_default();
        let warning = classified.get(&Zone::Warning).cloned().unwrap_or_default();

        let closest_danger = danger
            .iter()
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
            .map(|detection| (*detection).clone());

        let names = |objects: &[&Detection]| {
            objects
                .iter()
                .take(2)
                .map(|detection| detection.label().to_string())
                .collect::<Vec<_>>()
                .join(" and ")
        };

        let message = if !danger.is_empty() {
            format!("Warning! {} very close to you", names(&danger))
        } else if !warning.is_empty() {
            format!("Caution! {} less than two meters away", names(&warning))
        } else {
            let nearby = count(Zone::Attention) + count(Zone::Awareness);
            if nearby == 1 {
                "1 object around you".to_string()
            } else if nearby > 1 {
                format!("{nearby} objects around you")
            } else {
                "The area is clear".to_string()
            }
        };

        ZoneSummary {
            danger_count: danger.len(),
            warning_count: warning.len(),
            attention_count: count(Zone::Attention),
            awareness_count: count(Zone::Awareness),
            outside_count: count(Zone::Outside),
            closest_danger,
            message,
            expanded_awareness: self.config.expanded_awareness,
        }
    }

    /// Widen awareness to everything around the user until the deadline.
    /// `None` uses the configured expansion duration.
    pub fn expand(&mut self, duration_secs: Option<f64>) -> ExpansionNotice {
        let duration_secs = duration_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .unwrap_or(self.config.expansion_duration_secs);
        let deadline =
            self.clock.now() + Duration::milliseconds((duration_secs * 1000.0).round() as i64);

        self.config.expanded_awareness = true;
        self.config.expansion_deadline = Some(deadline);
        self.persist();
        log_info!("awareness expanded for {duration_secs}s");

        ExpansionNotice {
            message: "Awareness expanded, I will tell you about everything around you"
                .to_string(),
            duration_secs,
        }
    }

    pub fn collapse(&mut self) -> String {
        self.config.expanded_awareness = false;
        self.config.expansion_deadline = None;
        self.persist();
        log_info!("awareness collapsed");
        "Back to normal awareness".to_string()
    }

    /// Auto-collapse once the expansion deadline has passed. Returns true if it collapsed.
    pub fn tick(&mut self) -> bool {
        match (self.config.expanded_awareness, self.config.expansion_deadline) {
            (true, Some(deadline)) if self.clock.now() > deadline => {
                self.collapse();
                true
            }
            _ => false,
        }
    }

    pub fn set_alert_outside_zone(&mut self, enabled: bool) {
        self.config.alert_outside_zone = enabled;
        self.persist();
    }

    /// Move one zone boundary, keeping radii strictly ascending.
    pub fn update_radius(&mut self, zone: Zone, radius: f64) -> Result<(), EngineError> {
        let radii = self.config.radii();
        let index = match zone {
            Zone::Outside => {
                return Err(EngineError::InvalidInput(
                    "the outside zone has no radius".into(),
                ))
            }
            other => other.ordinal() as usize,
        };
        let lower = if index == 0 { 0.0 } else { radii[index - 1] };
        let upper = radii.get(index + 1).copied().unwrap_or(f64::INFINITY);

        if !radius.is_finite() || radius <= lower || radius >= upper {
            log_warn!("rejected radius {radius} for zone {zone}");
            return Err(EngineError::InvalidZoneRadius {
                zone: zone.to_string(),
                radius,
                lower,
                upper,
            });
        }

        if let Some(slot) = self.config.radius_mut(zone) {
            *slot = radius;
        }
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        if let Some(storage) = &self.storage {
            storage.save_zone_config(&self.config, self.clock.now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn classifier() -> (ZoneClassifier, ManualClock) {
        let clock = ManualClock::default();
        (
            ZoneClassifier::new(ZoneConfig::default(), Arc::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn boundaries_are_inclusive_above() {
        let (zones, _) = classifier();
        assert_eq!(zones.classify(0.0), Zone::Danger);
        assert_eq!(zones.classify(0.5), Zone::Danger);
        assert_eq!(zones.classify(0.51), Zone::Warning);
        assert_eq!(zones.classify(1.5), Zone::Warning);
        assert_eq!(zones.classify(3.0), Zone::Attention);
        assert_eq!(zones.classify(6.0), Zone::Awareness);
        assert_eq!(zones.classify(6.01), Zone::Outside);
    }

    #[test]
    fn malformed_distances_are_outside() {
        let (zones, _) = classifier();
        assert_eq!(zones.classify(-1.0), Zone::Outside);
        assert_eq!(zones.classify(f64::NAN), Zone::Outside);
        assert_eq!(zones.classify(f64::INFINITY), Zone::Outside);
    }

    #[test]
    fn zone_is_monotonic_in_distance() {
        let (zones, _) = classifier();
        let mut previous = Zone::Danger;
        for step in 0..=800 {
            let zone = zones.classify(step as f64 * 0.01);
            assert!(zone >= previous, "zone regressed at {}", step as f64 * 0.01);
            previous = zone;
        }
    }

    #[test]
    fn batch_partition_covers_every_zone() {
        let (zones, _) = classifier();
        let batch = vec![
            Detection::new("stairs", 0.3),
            Detection::new("door", 2.0),
            Detection::new("tree", 9.0),
        ];
        let classified = zones.classify_batch(&batch);
        assert_eq!(classified.len(), 5);
        assert_eq!(classified[&Zone::Danger][0].class, "stairs");
        assert_eq!(classified[&Zone::Attention][0].class, "door");
        assert!(classified[&Zone::Warning].is_empty());
        assert_eq!(classified[&Zone::Outside].len(), 1);
    }

    #[test]
    fn expansion_auto_collapses_after_deadline() {
        let (mut zones, clock) = classifier();
        let notice = zones.expand(Some(5.0));
        assert_eq!(notice.duration_secs, 5.0);
        assert!(zones.config().expanded_awareness);

        clock.advance_secs(5.0);
        assert!(!zones.tick(), "deadline itself is still inside the window");
        assert!(zones.config().expanded_awareness);

        clock.advance_secs(0.5);
        assert!(zones.tick());
        assert!(!zones.config().expanded_awareness);
        assert!(zones.config().expansion_deadline.is_none());
    }

    #[test]
    fn expand_defaults_to_configured_duration() {
        let (mut zones, _) = classifier();
        assert_eq!(zones.expand(None).duration_secs, 30.0);
        assert_eq!(zones.expand(Some(-3.0)).duration_secs, 30.0);
    }

    #[test]
    fn outside_objects_need_expansion() {
        let (mut zones, _) = classifier();
        let batch = vec![
            Detection::new("tree", 9.0),
            Detection::new("door", 2.0),
            Detection::new("chair", 1.0),
        ];

        let filtered = zones.filter_by_zone(&batch);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].detection.class, "chair");

        zones.expand(None);
        let filtered = zones.filter_by_zone(&batch);
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[2].zone, Zone::Outside);
    }

    #[test]
    fn radius_updates_keep_ordering() {
        let (mut zones, _) = classifier();
        zones.update_radius(Zone::Warning, 2.0).unwrap();
        assert_eq!(zones.classify(1.8), Zone::Warning);

        assert!(matches!(
            zones.update_radius(Zone::Danger, 2.5),
            Err(EngineError::InvalidZoneRadius { .. })
        ));
        assert!(zones.update_radius(Zone::Awareness, 2.9).is_err());
        assert!(zones.update_radius(Zone::Outside, 10.0).is_err());
        assert!(zones.update_radius(Zone::Awareness, 12.0).is_ok());
    }

    #[test]
    fn summary_prefers_danger_wording() {
        let (zones, _) = classifier();
        let batch = vec![
            Detection::new("door", 1.0),
            Detection::new("hole", 0.4),
            Detection::new("stairs", 0.2),
        ];
        let summary = zones.summary(&batch);
        assert_eq!(summary.danger_count, 2);
        assert_eq!(summary.warning_count, 1);
        assert_eq!(summary.closest_danger.unwrap().class, "stairs");
        assert_eq!(summary.message, "Warning! hole and stairs very close to you");

        assert_eq!(zones.summary(&[]).message, "The area is clear");
        assert_eq!(
            zones.summary(&[Detection::new("tree", 4.0)]).message,
            "1 object around you"
        );
    }

    #[tokio::test]
    async fn persisted_config_is_stamped_by_the_session_clock() {
        use chrono::TimeZone;

        use crate::db::Database;

        let db = Database::in_memory().unwrap();
        let instant = chrono::Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let mut zones = ZoneClassifier::new(ZoneConfig::default(), Arc::new(ManualClock::new(instant)))
            .with_storage(UserStorage::new(db.clone(), "alice"));
        zones.set_alert_outside_zone(true);

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
        assert_eq!(stamp, instant.to_rfc3339());
        assert!(db.load_zone_config("alice").await.unwrap().unwrap().alert_outside_zone);
    }
}
