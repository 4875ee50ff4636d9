//! Static class tables: which objects are hazards, which matter only up close,
//! which are background noise, and how long each waits before re-alerting.
//!
//! Unknown classes are not errors. They land in [`ClassTier::Generic`] and use
//! [`DEFAULT_COOLDOWN_SECS`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::normalize_class;

/// Hazards: always worth an alert, regardless of mode or flood state.
const ALWAYS_ALERT: &[&str] = &[
    "stairs",
    "staircase",
    "steps",
    "hole",
    "pothole",
    "car",
    "truck",
    "bus",
    "motorcycle",
    "bicycle",
    "escalator",
    "elevator",
];

/// Worth an alert once they get close.
const ALERT_WHEN_CLOSE: &[&str] = &[
    "person", "child", "door", "wall", "obstacle", "chair", "table", "pillar",
];

const USUALLY_IGNORE: &[&str] = &[
    "floor", "ceiling", "window", "picture", "plant", "lamp", "curtain", "rug", "carpet",
];

const COOLDOWNS_SECS: &[(&str, f64)] = &[
    ("stairs", 5.0),
    ("staircase", 5.0),
    ("steps", 5.0),
    ("hole", 5.0),
    ("pothole", 5.0),
    ("escalator", 5.0),
    ("elevator", 5.0),
    ("car", 3.0),
    ("truck", 3.0),
    ("bus", 3.0),
    ("motorcycle", 3.0),
    ("bicycle", 3.0),
    ("person", 30.0),
    ("child", 30.0),
    ("door", 60.0),
    ("chair", 120.0),
    ("table", 120.0),
];

pub const DEFAULT_COOLDOWN_SECS: f64 = 30.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClassTier {
    AlwaysAlert,
    CloseOnly,
    Generic,
}

#[derive(Debug, Clone)]
pub struct Taxonomy {
    tiers: HashMap<String, ClassTier>,
    ignored: HashSet<String>,
    cooldowns: HashMap<String, f64>,
    default_cooldown_secs: f64,
}

impl Taxonomy {
    pub fn standard() -> Self {
        let mut tiers = HashMap::new();
        for class in ALWAYS_ALERT {
            tiers.insert(class.to_string(), ClassTier::AlwaysAlert);
        }
        for class in ALERT_WHEN_CLOSE {
            tiers.insert(class.to_string(), ClassTier::CloseOnly);
        }

        Self {
            tiers,
            ignored: USUALLY_IGNORE.iter().map(|class| class.to_string()).collect(),
            cooldowns: COOLDOWNS_SECS
                .iter()
                .map(|(class, secs)| (class.to_string(), *secs))
                .collect(),
            default_cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }

    /// Standard tables with per-class cooldowns replaced or added.
    /// A `"default"` key replaces the fallback cooldown.
    pub fn with_cooldown_overrides(overrides: &HashMap<String, f64>) -> Self {
        let mut taxonomy = Self::standard();
        for (class, secs) in overrides {
            if !secs.is_finite() || *secs < 0.0 {
                continue;
            }
            let key = normalize_class(class);
            if key == "default" {
                taxonomy.default_cooldown_secs = *secs;
            } else {
                taxonomy.cooldowns.insert(key, *secs);
            }
        }
        taxonomy
    }

    /// `class` is expected in normalized form (see [`normalize_class`]).
    pub fn tier(&self, class: &str) -> ClassTier {
        self.tiers.get(class).copied().unwrap_or(ClassTier::Generic)
    }

    pub fn is_always_alert(&self, class: &str) -> bool {
        self.tier(class) == ClassTier::AlwaysAlert
    }

    pub fn is_usually_ignored(&self, class: &str) -> bool {
        self.ignored.contains(class)
    }

    pub fn cooldown_secs(&self, class: &str) -> f64 {
        self.cooldowns
            .get(class)
            .copied()
            .unwrap_or(self.default_cooldown_secs)
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}
