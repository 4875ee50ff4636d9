use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::ZoneDefaults;

/// Proximity zones, nearest first. Ordinal order follows distance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Danger,
    Warning,
    Attention,
    Awareness,
    Outside,
}

impl Zone {
    pub const ALL: [Zone; 5] = [
        Zone::Danger,
        Zone::Warning,
        Zone::Attention,
        Zone::Awareness,
        Zone::Outside,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Danger => "danger",
            Zone::Warning => "warning",
            Zone::Attention => "attention",
            Zone::Awareness => "awareness",
            Zone::Outside => "outside",
        }
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user zone geometry plus the temporary "tell me everything" expansion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneConfig {
    pub danger_radius: f64,
    pub warning_radius: f64,
    pub attention_radius: f64,
    pub awareness_radius: f64,
    /// Report objects beyond the awareness radius even without an expansion.
    pub alert_outside_zone: bool,
    pub expanded_awareness: bool,
    pub expansion_deadline: Option<DateTime<Utc>>,
    pub expansion_duration_secs: f64,
}

impl ZoneConfig {
    pub fn from_defaults(defaults: &ZoneDefaults) -> Self {
        Self {
            danger_radius: defaults.danger_radius,
            warning_radius: defaults.warning_radius,
            attention_radius: defaults.attention_radius,
            awareness_radius: defaults.awareness_radius,
            alert_outside_zone: false,
            expanded_awareness: false,
            expansion_deadline: None,
            expansion_duration_secs: defaults.expansion_duration_secs,
        }
    }

    /// Upper bound of each bounded zone, nearest first.
    pub fn radii(&self) -> [f64; 4] {
        [
            self.danger_radius,
            self.warning_radius,
            self.attention_radius,
            self.awareness_radius,
        ]
    }

    pub fn radius_mut(&mut self, zone: Zone) -> Option<&mut f64> {
        match zone {
            Zone::Danger => Some(&mut self.danger_radius),
            Zone::Warning => Some(&mut self.warning_radius),
            Zone::Attention => Some(&mut self.attention_radius),
            Zone::Awareness => Some(&mut self.awareness_radius),
            Zone::Outside => None,
        }
    }

    /// True while objects past the awareness radius should still be reported.
    pub fn reports_outside(&self) -> bool {
        self.expanded_awareness || self.alert_outside_zone
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self::from_defaults(&ZoneDefaults::default())
    }
}
