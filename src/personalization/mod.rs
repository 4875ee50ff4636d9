//! Per-user learned priority adjustments.
//!
//! Feedback nudges a per-class adjustment within fixed bounds. Decisions read a
//! [`PreferenceSnapshot`] taken once per batch, so feedback arriving on another
//! thread never tears a batch in half.

mod snapshot;

pub use snapshot::PreferenceSnapshot;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::clock::Clock;
use crate::db::UserStorage;
use crate::models::{normalize_class, FeedbackResponse, UserPreference};
use crate::settings::LearningSettings;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Classes below this adjustment are reported as ignored, above its negation as favourites.
const SUMMARY_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileSummary {
    pub user_id: String,
    pub ignored_objects: Vec<String>,
    pub favorite_objects: Vec<String>,
    pub total_preferences: usize,
    pub session_interactions: usize,
}

#[derive(Default)]
struct ProfileState {
    preferences: HashMap<String, UserPreference>,
    interactions: usize,
}

/// Shared handle; clones see the same profile.
#[derive(Clone)]
pub struct PersonalizationStore {
    user_id: String,
    settings: LearningSettings,
    clock: Arc<dyn Clock>,
    storage: Option<UserStorage>,
    state: Arc<Mutex<ProfileState>>,
}

impl PersonalizationStore {
    pub fn new(user_id: impl Into<String>, settings: LearningSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            user_id: user_id.into(),
            settings,
            clock,
            storage: None,
            state: Arc::new(Mutex::new(ProfileState::default())),
        }
    }

    /// Seed the profile with previously stored preferences.
    pub fn with_preferences(self, preferences: Vec<UserPreference>) -> Self {
        {
            let mut state = self.lock();
            for mut preference in preferences {
                preference.object_class = normalize_class(&preference.object_class);
                preference.priority_adjustment = self.bounded(preference.priority_adjustment);
                state
                    .preferences
                    .insert(preference.object_class.clone(), preference);
            }
        }
        self
    }

    pub fn with_storage(mut self, storage: UserStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Learn from the user's reaction to an alert about `class`.
    pub fn record_feedback(&self, class: &str, response: FeedbackResponse) -> UserPreference {
        let key = normalize_class(class);
        let rate = self.settings.learning_rate;
        let now = self.clock.now();

        let mut state = self.lock();
        state.interactions += 1;

        let mut preference = state
            .preferences
            .get(&key)
            .cloned()
            .unwrap_or_else(|| UserPreference::neutral(key.clone()));
        preference.last_updated = Some(now);

        match response {
            FeedbackResponse::Ignored => {
                preference.ignore_count += 1;
                if preference.ignore_count >= self.settings.min_ignore_samples {
                    preference.priority_adjustment =
                        self.bounded(preference.priority_adjustment - rate);
                }
            }
            FeedbackResponse::Acknowledged => {
                preference.action_count += 1;
                preference.priority_adjustment =
                    self.bounded(preference.priority_adjustment + rate / 2.0);
            }
            FeedbackResponse::AskedMore => {
                preference.action_count += 1;
                preference.priority_adjustment = self.bounded(preference.priority_adjustment + rate);
            }
        }

        log_debug!(
            "user {} {} {}: adjustment now {:.2}",
            self.user_id,
            response,
            key,
            preference.priority_adjustment
        );

        state.preferences.insert(key, preference.clone());
        self.persist(&state);
        preference
    }

    pub fn snapshot(&self) -> PreferenceSnapshot {
        let state = self.lock();
        PreferenceSnapshot::new(
            state
                .preferences
                .iter()
                .map(|(class, preference)| (class.clone(), preference.priority_adjustment))
                .collect(),
            self.settings.suppress_below,
        )
    }

    pub fn adjustment(&self, class: &str) -> f64 {
        self.snapshot().adjustment(&normalize_class(class))
    }

    pub fn adjusted_priority(&self, class: &str, base_priority: u8) -> u8 {
        self.snapshot()
            .adjusted_priority(&normalize_class(class), base_priority)
    }

    pub fn should_suppress(&self, class: &str, base_priority: u8) -> bool {
        self.snapshot()
            .should_suppress(&normalize_class(class), base_priority)
    }

    pub fn preference(&self, class: &str) -> Option<UserPreference> {
        self.lock().preferences.get(&normalize_class(class)).cloned()
    }

    /// All preferences, ordered by class.
    pub fn preferences(&self) -> Vec<UserPreference> {
        sorted_preferences(&self.lock())
    }

    pub fn summary(&self) -> ProfileSummary {
        let state = self.lock();
        let mut ignored_objects = Vec::new();
        let mut favorite_objects = Vec::new();
        for preference in sorted_preferences(&state) {
            if preference.priority_adjustment < -SUMMARY_THRESHOLD {
                ignored_objects.push(preference.object_class);
            } else if preference.priority_adjustment > SUMMARY_THRESHOLD {
                favorite_objects.push(preference.object_class);
            }
        }

        ProfileSummary {
            user_id: self.user_id.clone(),
            ignored_objects,
            favorite_objects,
            total_preferences: state.preferences.len(),
            session_interactions: state.interactions,
        }
    }

    /// Forget one class, or every class when `class` is `None`.
    /// Returns whether anything was removed.
    pub fn reset(&self, class: Option<&str>) -> bool {
        let mut state = self.lock();
        let removed = match class {
            Some(class) => state.preferences.remove(&normalize_class(class)).is_some(),
            None => {
                let had_any = !state.preferences.is_empty();
                state.preferences.clear();
                had_any
            }
        };
        if removed {
            self.persist(&state);
        }
        removed
    }

    fn bounded(&self, adjustment: f64) -> f64 {
        let limit = self.settings.max_adjustment.abs();
        // Six decimals keeps repeated +-0.1 steps from drifting past thresholds.
        ((adjustment * 1e6).round() / 1e6).clamp(-limit, limit)
    }

    fn persist(&self, state: &ProfileState) {
        if let Some(storage) = &self.storage {
            storage.save_preferences(sorted_preferences(state));
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProfileState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn sorted_preferences(state: &ProfileState) -> Vec<UserPreference> {
    let mut preferences: Vec<UserPreference> = state.preferences.values().cloned().collect();
    preferences.sort_by(|a, b| a.object_class.cmp(&b.object_class));
    preferences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> PersonalizationStore {
        PersonalizationStore::new(
            "alice",
            LearningSettings::default(),
            Arc::new(ManualClock::default()),
        )
    }

    #[test]
    fn empty_profile_is_neutral() {
        let store = store();
        assert_eq!(store.adjustment("chair"), 0.0);
        assert_eq!(store.adjusted_priority("chair", 3), 3);
        assert!(!store.should_suppress("chair", 5));
        assert!(store.preference("chair").is_none());
    }

    #[test]
    fn ignores_count_before_they_teach() {
        let store = store();
        store.record_feedback("chair", FeedbackResponse::Ignored);
        store.record_feedback("chair", FeedbackResponse::Ignored);
        assert_eq!(store.adjustment("chair"), 0.0);
        assert_eq!(store.adjusted_priority("chair", 3), 3);

        let preference = store.record_feedback("Chair", FeedbackResponse::Ignored);
        assert_eq!(preference.ignore_count, 3);
        assert_eq!(preference.priority_adjustment, -0.1);
        assert!(store.adjusted_priority("chair", 3) > 3);
    }

    #[test]
    fn positive_feedback_raises_adjustment_within_bounds() {
        let store = store();
        store.record_feedback("door", FeedbackResponse::Acknowledged);
        assert_eq!(store.adjustment("door"), 0.05);
        assert_eq!(store.adjusted_priority("door", 3), 2);
        assert_eq!(store.adjusted_priority("door", 4), 3);
        for _ in 0..10 {
            store.record_feedback("door", FeedbackResponse::AskedMore);
        }
        let preference = store.preference("door").unwrap();
        assert_eq!(preference.priority_adjustment, 0.5);
        assert_eq!(preference.action_count, 11);
        assert_eq!(store.adjusted_priority("door", 3), 2);
        assert_eq!(store.adjusted_priority("door", 1), 1);
    }

    #[test]
    fn persistent_dismissal_suppresses_non_urgent_objects() {
        let store = store();
        for _ in 0..6 {
            store.record_feedback("plant", FeedbackResponse::Ignored);
        }
        assert_eq!(store.adjustment("plant"), -0.4);
        assert!(!store.should_suppress("plant", 5), "-0.4 is not below the threshold");

        store.record_feedback("plant", FeedbackResponse::Ignored);
        assert_eq!(store.adjustment("plant"), -0.5);
        assert!(store.should_suppress("plant", 5));
        assert!(store.should_suppress("plant", 3));
        assert!(!store.should_suppress("plant", 2), "urgent objects are never dropped");
    }

    #[test]
    fn summary_and_reset() {
        let store = store();
        for _ in 0..6 {
            store.record_feedback("rug", FeedbackResponse::Ignored);
        }
        for _ in 0..3 {
            store.record_feedback("door", FeedbackResponse::AskedMore);
        }
        store.record_feedback("chair", FeedbackResponse::Acknowledged);

        let summary = store.summary();
        assert_eq!(summary.ignored_objects, vec!["rug".to_string()]);
        assert_eq!(summary.favorite_objects, vec!["door".to_string()]);
        assert_eq!(summary.total_preferences, 3);
        assert_eq!(summary.session_interactions, 10);

        assert!(store.reset(Some("RUG")));
        assert!(!store.reset(Some("rug")));
        assert_eq!(store.preferences().len(), 2);
        assert!(store.reset(None));
        assert!(store.preferences().is_empty());
    }

    #[test]
    fn clones_share_profile() {
        let store = store();
        let other = store.clone();
        for _ in 0..3 {
            other.record_feedback("chair", FeedbackResponse::Ignored);
        }
        assert_eq!(store.adjustment("chair"), -0.1);
    }

    #[test]
    fn seeded_preferences_are_normalized_and_bounded() {
        let mut stored = UserPreference::neutral(" Chair ");
        stored.priority_adjustment = -0.9;
        let store = store().with_preferences(vec![stored]);
        assert_eq!(store.adjustment("chair"), -0.5);
    }
}
