use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::{Database, UserStorage};
use crate::error::EngineError;
use crate::models::{
    AlertMode, AlertReason, Detection, FeedbackEvent, StationarySignal, UserPreference,
};
use crate::personalization::PersonalizationStore;
use crate::priority::{rank_order, PriorityCalculator};
use crate::settings::EngineSettings;
use crate::taxonomy::Taxonomy;
use crate::trend::{Trend, TrendTracker};
use crate::zones::{ExpansionNotice, Zone, ZoneClassifier, ZoneConfig, ZoneSummary, ZonedDetection};

use super::gate::{CooldownFloodController, CooldownStatus, GateRequest};
use super::messages;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedAlert {
    pub class: String,
    pub label: String,
    pub distance_m: f64,
    pub confidence: f64,
    pub zone: Zone,
    pub trend: Trend,
    pub priority: u8,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuppressedDetection {
    pub class: String,
    pub distance_m: f64,
    pub priority: u8,
    pub reason: AlertReason,
    pub cooldown_remaining: f64,
}

/// Result of one detection batch.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct BatchOutcome {
    /// Approved alerts, most urgent first, capped at the speakable count.
    pub alerts: Vec<RankedAlert>,
    /// Single utterance for speech synthesis; empty when nothing is worth saying.
    pub message: String,
    pub has_danger: bool,
    pub suppressed: Vec<SuppressedDetection>,
    /// Classes dropped because the user keeps dismissing them.
    pub personalized: Vec<String>,
    /// Ranked below the speakable cap. Never gated, so they start no cooldown.
    pub deferred: Vec<String>,
    /// Malformed detections skipped without affecting the rest of the batch.
    pub skipped: usize,
}

/// A valid detection with its urgency settled, waiting for the gate.
struct Candidate<'a> {
    detection: &'a Detection,
    class: String,
    zone: Zone,
    trend: Trend,
    priority: u8,
}

impl Candidate<'_> {
    fn rank_key(&self) -> (u8, Zone, f64, f64) {
        (
            self.priority,
            self.zone,
            self.detection.distance_m,
            self.detection.confidence,
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusSnapshot {
    pub user_id: String,
    pub session_id: Uuid,
    pub mode: AlertMode,
    pub is_stationary: bool,
    pub alerts_last_minute: usize,
    pub max_alerts_per_minute: usize,
    pub active_cooldowns: usize,
    pub cooldowns: Vec<CooldownStatus>,
    pub expanded_awareness: bool,
}

/// One user's alerting session.
///
/// Callers keep one pipeline per user and serialize batches through it.
/// Feedback may arrive concurrently through [`AlertDecisionPipeline::personalization`].
pub struct AlertDecisionPipeline {
    user_id: String,
    session_id: Uuid,
    settings: EngineSettings,
    zones: ZoneClassifier,
    trends: TrendTracker,
    priorities: PriorityCalculator,
    personalization: PersonalizationStore,
    gate: CooldownFloodController,
    mode: AlertMode,
    stationary: StationarySignal,
}

impl AlertDecisionPipeline {
    /// Fresh session with a neutral profile and nothing persisted.
    pub fn new(user_id: impl Into<String>, settings: EngineSettings, clock: Arc<dyn Clock>) -> Self {
        let zone_config = ZoneConfig::from_defaults(&settings.zones);
        Self::assemble(user_id.into(), settings, clock, Vec::new(), zone_config, None)
    }

    /// Start a session, loading the stored profile and zone config.
    ///
    /// Storage problems never fail the session: they are logged and the
    /// session starts from defaults, still writing through on later changes.
    pub async fn open(
        db: Option<Database>,
        user_id: impl Into<String>,
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let user_id = user_id.into();
        let default_zones = ZoneConfig::from_defaults(&settings.zones);

        let Some(db) = db else {
            return Self::assemble(user_id, settings, clock, Vec::new(), default_zones, None);
        };

        let preferences = match db.load_preferences(&user_id).await {
            Ok(preferences) => preferences,
            Err(err) => {
                let err = EngineError::persistence(err);
                log_warn!("{err}; starting {user_id} with a neutral profile");
                Vec::new()
            }
        };
        let zone_config = match db.load_zone_config(&user_id).await {
            Ok(Some(config)) => config,
            Ok(None) => default_zones,
            Err(err) => {
                let err = EngineError::persistence(err);
                log_warn!("{err}; starting {user_id} with default zones");
                default_zones
            }
        };

        let storage = UserStorage::new(db, user_id.clone());
        Self::assemble(user_id, settings, clock, preferences, zone_config, Some(storage))
    }

    fn assemble(
        user_id: String,
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
        preferences: Vec<UserPreference>,
        zone_config: ZoneConfig,
        storage: Option<UserStorage>,
    ) -> Self {
        let taxonomy = Arc::new(Taxonomy::with_cooldown_overrides(
            &settings.gate.cooldown_overrides,
        ));

        let mut zones = ZoneClassifier::new(zone_config, clock.clone());
        let mut personalization =
            PersonalizationStore::new(user_id.clone(), settings.learning.clone(), clock.clone())
                .with_preferences(preferences);
        if let Some(storage) = storage {
            zones = zones.with_storage(storage.clone());
            personalization = personalization.with_storage(storage);
        }

        let session_id = Uuid::new_v4();
        log_info!("alert session {session_id} opened for {user_id}");

        Self {
            trends: TrendTracker::new(settings.trend.clone(), clock.clone()),
            priorities: PriorityCalculator::new(taxonomy.clone()),
            gate: CooldownFloodController::new(
                taxonomy,
                settings.gate.clone(),
                settings.flood.clone(),
                clock,
            ),
            user_id,
            session_id,
            settings,
            zones,
            personalization,
            mode: AlertMode::default(),
            stationary: StationarySignal::default(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Assess every detection, then gate candidates most urgent first so that
    /// minor objects cannot spend the flood cap or a class cooldown ahead of
    /// a hazard in the same batch.
    pub fn process_batch(
        &mut self,
        detections: &[Detection],
        stationary: StationarySignal,
    ) -> BatchOutcome {
        self.stationary = stationary;
        self.zones.tick();
        self.trends.prune();

        let preferences = self.personalization.snapshot();
        let expanded = self.zones.config().reports_outside();
        let mut outcome = BatchOutcome::default();

        let mut valid: Vec<(&Detection, String)> = Vec::with_capacity(detections.len());
        for detection in detections {
            match detection.validate() {
                Ok(()) => valid.push((detection, detection.class_key())),
                Err(err) => {
                    log_warn!("skipping detection: {err}");
                    outcome.skipped += 1;
                }
            }
        }

        // One trend sample per class per frame: the nearest instance.
        let mut nearest: HashMap<String, f64> = HashMap::new();
        for (detection, class) in &valid {
            nearest
                .entry(class.clone())
                .and_modify(|distance| *distance = distance.min(detection.distance_m))
                .or_insert(detection.distance_m);
        }
        let trends: HashMap<String, Trend> = nearest
            .into_iter()
            .map(|(class, distance)| {
                let trend = self.trends.track(&class, distance).trend;
                (class, trend)
            })
            .collect();

        let mut candidates: Vec<Candidate<'_>> = Vec::with_capacity(valid.len());
        for (detection, class) in valid {
            let distance = detection.distance_m;
            let zone = self.zones.classify(distance);
            let trend = trends.get(&class).copied().unwrap_or_default();
            let assessed = self.priorities.priority(&class, distance, trend, zone);

            if preferences.should_suppress(&class, assessed.priority) {
                log_debug!("{class} dropped by learned preference");
                outcome.personalized.push(class);
                continue;
            }

            candidates.push(Candidate {
                priority: preferences.adjusted_priority(&class, assessed.priority),
                detection,
                class,
                zone,
                trend,
            });
        }

        candidates.sort_by(|a, b| rank_order(a.rank_key(), b.rank_key()));

        for candidate in candidates {
            if outcome.alerts.len() >= self.settings.max_spoken_alerts {
                outcome.deferred.push(candidate.class);
                continue;
            }

            let detection = candidate.detection;
            let distance = detection.distance_m;
            let request = GateRequest {
                class: &candidate.class,
                label: detection.label(),
                direction: detection.resolved_direction(self.settings.frame_width),
                priority: candidate.priority,
                distance,
                trend: candidate.trend,
                expanded,
            };
            let decision = self.gate.gate(&request, self.mode, stationary.is_stationary);

            if decision.should_alert {
                outcome.alerts.push(RankedAlert {
                    label: detection.label().to_string(),
                    class: candidate.class,
                    distance_m: distance,
                    confidence: detection.confidence,
                    zone: candidate.zone,
                    trend: candidate.trend,
                    priority: decision.priority,
                    message: decision.message,
                });
            } else {
                outcome.suppressed.push(SuppressedDetection {
                    class: candidate.class,
                    distance_m: distance,
                    priority: decision.priority,
                    reason: decision.reason,
                    cooldown_remaining: decision.cooldown_remaining,
                });
            }
        }

        let spoken: Vec<String> = outcome
            .alerts
            .iter()
            .map(|alert| alert.message.clone())
            .collect();
        outcome.message = messages::combine(&spoken);
        outcome.has_danger = outcome.alerts.iter().any(|alert| alert.priority == 1);
        outcome
    }

    pub fn mode(&self) -> AlertMode {
        self.mode
    }

    /// Switch mode and return the spoken confirmation.
    pub fn set_mode(&mut self, mode: AlertMode) -> &'static str {
        if self.mode != mode {
            log_info!("{} switched mode {} -> {}", self.user_id, self.mode, mode);
        }
        self.mode = mode;
        mode.confirmation()
    }

    /// Mode change from a raw command word.
    pub fn apply_mode_command(&mut self, command: &str) -> Result<&'static str, EngineError> {
        let mode = command.parse::<AlertMode>()?;
        Ok(self.set_mode(mode))
    }

    /// Clear cooldowns and the flood window and return to normal mode.
    pub fn reset(&mut self) -> &'static str {
        self.gate.reset();
        self.mode = AlertMode::Normal;
        log_info!("alerts reset for {}", self.user_id);
        "Alerts reset"
    }

    pub fn record_feedback(&self, event: &FeedbackEvent) -> UserPreference {
        self.personalization
            .record_feedback(&event.object_class, event.response)
    }

    /// Shared handle for recording feedback from another task.
    pub fn personalization(&self) -> &PersonalizationStore {
        &self.personalization
    }

    pub fn expand(&mut self, duration_secs: Option<f64>) -> ExpansionNotice {
        self.zones.expand(duration_secs)
    }

    pub fn collapse(&mut self) -> String {
        self.zones.collapse()
    }

    pub fn set_alert_outside_zone(&mut self, enabled: bool) {
        self.zones.set_alert_outside_zone(enabled);
    }

    pub fn update_radius(&mut self, zone: Zone, radius: f64) -> Result<(), EngineError> {
        self.zones.update_radius(zone, radius)
    }

    pub fn zone_summary(&mut self, detections: &[Detection]) -> ZoneSummary {
        self.zones.tick();
        self.zones.summary(detections)
    }

    pub fn filter_by_zone(&mut self, detections: &[Detection]) -> Vec<ZonedDetection> {
        self.zones.filter_by_zone(detections)
    }

    pub fn zones(&self) -> &ZoneClassifier {
        &self.zones
    }

    pub fn status(&mut self) -> StatusSnapshot {
        let cooldowns = self.gate.cooldown_status();
        StatusSnapshot {
            user_id: self.user_id.clone(),
            session_id: self.session_id,
            mode: self.mode,
            is_stationary: self.stationary.is_stationary,
            alerts_last_minute: self.gate.alerts_in_window(),
            max_alerts_per_minute: self.gate.max_alerts_per_window(),
            active_cooldowns: cooldowns
                .iter()
                .filter(|cooldown| cooldown.remaining_secs > 0.0)
                .count(),
            cooldowns,
            expanded_awareness: self.zones.config().expanded_awareness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::FeedbackResponse;

    fn pipeline() -> (AlertDecisionPipeline, ManualClock) {
        let clock = ManualClock::default();
        (
            AlertDecisionPipeline::new("alice", EngineSettings::default(), Arc::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn malformed_detection_does_not_abort_batch() {
        let (mut pipeline, _) = pipeline();
        let batch = vec![
            Detection::new("car", f64::NAN),
            Detection::new("", 1.0),
            Detection::new("stairs", 0.3),
        ];
        let outcome = pipeline.process_batch(&batch, StationarySignal::moving());
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.alerts.len(), 1);
        assert!(outcome.has_danger);
    }

    #[test]
    fn speakable_alerts_are_capped() {
        let (mut pipeline, _) = pipeline();
        let batch = vec![
            Detection::new("car", 0.9),
            Detection::new("stairs", 1.2),
            Detection::new("door", 1.0),
            Detection::new("person", 0.4),
            Detection::new("bus", 5.0),
        ];
        let outcome = pipeline.process_batch(&batch, StationarySignal::moving());
        assert_eq!(outcome.alerts.len(), 3);
        let classes: Vec<&str> = outcome.alerts.iter().map(|a| a.class.as_str()).collect();
        assert_eq!(classes, vec!["car", "person", "stairs"]);
        assert_eq!(outcome.message.matches(". ").count(), 2);
        assert_eq!(outcome.deferred, vec!["door".to_string(), "bus".to_string()]);

        let status = pipeline.status();
        assert_eq!(status.alerts_last_minute, 3);
        assert!(status
            .cooldowns
            .iter()
            .all(|cooldown| cooldown.object_class != "door"));
    }

    #[test]
    fn urgent_object_is_gated_before_minor_ones() {
        let (mut pipeline, _) = pipeline();
        let moving = StationarySignal::moving();
        pipeline.process_batch(
            &[
                Detection::new("door", 1.0),
                Detection::new("wall", 1.0),
                Detection::new("pillar", 1.0),
            ],
            moving,
        );
        pipeline.process_batch(&[Detection::new("obstacle", 1.0)], moving);

        let mut batch: Vec<Detection> = ["bench", "sign", "bin", "pole", "kiosk"]
            .iter()
            .map(|class| Detection::new(*class, 5.0))
            .collect();
        batch.push(Detection::new("person", 0.3));
        let outcome = pipeline.process_batch(&batch, moving);

        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].class, "person");
        assert!(outcome.message.starts_with(messages::CAUTION_MARKER));
        assert_eq!(outcome.suppressed.len(), 5);
        assert!(outcome
            .suppressed
            .iter()
            .all(|suppressed| suppressed.reason == AlertReason::TooManyAlerts));
    }

    #[test]
    fn nearest_instance_of_a_class_wins_the_cooldown() {
        let (mut pipeline, _) = pipeline();
        let batch = vec![Detection::new("person", 5.0), Detection::new("person", 1.0)];
        let outcome = pipeline.process_batch(&batch, StationarySignal::moving());

        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].distance_m, 1.0);
        assert_eq!(outcome.alerts[0].priority, 3);
        assert_eq!(outcome.alerts[0].trend, Trend::Stable);
        assert_eq!(outcome.suppressed[0].distance_m, 5.0);
        assert_eq!(outcome.suppressed[0].reason, AlertReason::Cooldown);
    }

    #[test]
    fn alert_outside_zone_lifts_distance_ceiling() {
        let (mut pipeline, _) = pipeline();
        pipeline.set_alert_outside_zone(true);
        let outcome =
            pipeline.process_batch(&[Detection::new("door", 7.0)], StationarySignal::moving());
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].zone, Zone::Outside);
        assert!(!pipeline.zones().config().expanded_awareness);
    }

    #[test]
    fn empty_batch_is_silent() {
        let (mut pipeline, _) = pipeline();
        let outcome = pipeline.process_batch(&[], StationarySignal::moving());
        assert!(outcome.alerts.is_empty());
        assert!(outcome.message.is_empty());
        assert!(!outcome.has_danger);
    }

    #[test]
    fn closing_object_gains_urgency_between_frames() {
        let (mut pipeline, clock) = pipeline();
        pipeline.set_mode(AlertMode::Quiet);
        pipeline.process_batch(&[Detection::new("person", 2.5)], StationarySignal::moving());
        clock.advance_secs(1.0);
        pipeline.set_mode(AlertMode::Normal);
        let outcome =
            pipeline.process_batch(&[Detection::new("person", 1.6)], StationarySignal::moving());
        let alert = &outcome.alerts[0];
        assert_eq!(alert.trend, Trend::Approaching);
        assert_eq!(alert.priority, 3);
        assert!(alert.message.contains("approaching"));
    }

    #[test]
    fn dismissed_class_is_dropped_before_the_gate() {
        let (mut pipeline, _) = pipeline();
        for _ in 0..7 {
            pipeline.record_feedback(&FeedbackEvent {
                object_class: "kiosk".into(),
                response: FeedbackResponse::Ignored,
            });
        }
        let outcome =
            pipeline.process_batch(&[Detection::new("kiosk", 1.0)], StationarySignal::moving());
        assert!(outcome.alerts.is_empty());
        assert!(outcome.suppressed.is_empty());
        assert_eq!(outcome.personalized, vec!["kiosk".to_string()]);
    }

    #[test]
    fn mode_commands_and_reset() {
        let (mut pipeline, _) = pipeline();
        assert_eq!(
            pipeline.apply_mode_command("quiet").unwrap(),
            "Quiet mode, hazards only"
        );
        assert!(pipeline.apply_mode_command("shout").is_err());
        assert_eq!(pipeline.mode(), AlertMode::Quiet);

        let quiet =
            pipeline.process_batch(&[Detection::new("door", 1.0)], StationarySignal::moving());
        assert_eq!(quiet.suppressed[0].reason, AlertReason::QuietMode);

        pipeline.set_mode(AlertMode::Normal);
        pipeline.process_batch(&[Detection::new("door", 1.0)], StationarySignal::moving());
        let cooling =
            pipeline.process_batch(&[Detection::new("door", 1.0)], StationarySignal::moving());
        assert_eq!(cooling.suppressed[0].reason, AlertReason::Cooldown);

        pipeline.set_mode(AlertMode::Walking);
        pipeline.reset();
        assert_eq!(pipeline.mode(), AlertMode::Normal);
        let again =
            pipeline.process_batch(&[Detection::new("door", 1.0)], StationarySignal::moving());
        assert_eq!(again.alerts.len(), 1);
    }

    #[test]
    fn status_reports_session_state() {
        let (mut pipeline, _) = pipeline();
        pipeline.process_batch(
            &[Detection::new("car", 3.0), Detection::new("chair", 1.0)],
            StationarySignal::stationary(0.9),
        );
        let status = pipeline.status();
        assert_eq!(status.mode, AlertMode::Normal);
        assert!(status.is_stationary);
        assert_eq!(status.alerts_last_minute, 2);
        assert_eq!(status.max_alerts_per_minute, 5);
        assert_eq!(status.active_cooldowns, 2);
        assert!(!status.expanded_awareness);
    }

    #[test]
    fn expansion_lets_distant_objects_through() {
        let (mut pipeline, _) = pipeline();
        let far = vec![Detection::new("door", 7.0)];
        let before = pipeline.process_batch(&far, StationarySignal::moving());
        assert_eq!(before.suppressed[0].reason, AlertReason::TooFar);

        pipeline.expand(None);
        let after = pipeline.process_batch(&far, StationarySignal::moving());
        assert_eq!(after.alerts.len(), 1);
        assert_eq!(after.alerts[0].zone, Zone::Outside);
    }
}
