use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Global flood control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FloodSettings {
    pub max_alerts_per_window: usize,
    pub window_secs: f64,
}

impl Default for FloodSettings {
    fn default() -> Self {
        Self {
            max_alerts_per_window: 5,
            window_secs: 60.0,
        }
    }
}

/// Distances used by the gate rules, in metres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateSettings {
    /// Non-hazards beyond this are `too_far`.
    pub max_alert_distance_m: f64,
    /// While stationary in normal mode, non-hazards beyond this are dropped.
    pub stationary_far_m: f64,
    /// Hazards this close skip their cooldown.
    pub close_call_m: f64,
    /// Extra or replacement per-class cooldowns, in seconds.
    pub cooldown_overrides: HashMap<String, f64>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            max_alert_distance_m: 6.0,
            stationary_far_m: 1.5,
            close_call_m: 0.5,
            cooldown_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrendSettings {
    pub horizon_secs: f64,
    /// Slopes at or below this (m/s) are fast approaches.
    pub approaching_slope: f64,
    /// Slopes above this (m/s) count as stable.
    pub stable_slope: f64,
    /// Slopes at or above this (m/s) count as moving away.
    pub receding_slope: f64,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            horizon_secs: 10.0,
            approaching_slope: -0.2,
            stable_slope: -0.05,
            receding_slope: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearningSettings {
    pub learning_rate: f64,
    /// Ignores needed before an ignore starts lowering the adjustment.
    pub min_ignore_samples: u32,
    pub max_adjustment: f64,
    /// Classes below this adjustment (and not urgent) are dropped.
    pub suppress_below: f64,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            min_ignore_samples: 3,
            max_adjustment: 0.5,
            suppress_below: -0.4,
        }
    }
}

/// Default zone geometry for users without a stored zone config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ZoneDefaults {
    pub danger_radius: f64,
    pub warning_radius: f64,
    pub attention_radius: f64,
    pub awareness_radius: f64,
    pub expansion_duration_secs: f64,
}

impl Default for ZoneDefaults {
    fn default() -> Self {
        Self {
            danger_radius: 0.5,
            warning_radius: 1.5,
            attention_radius: 3.0,
            awareness_radius: 6.0,
            expansion_duration_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub flood: FloodSettings,
    pub gate: GateSettings,
    pub trend: TrendSettings,
    pub learning: LearningSettings,
    pub zones: ZoneDefaults,
    /// Upper bound on alerts folded into one utterance.
    pub max_spoken_alerts: usize,
    pub frame_width: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            flood: FloodSettings::default(),
            gate: GateSettings::default(),
            trend: TrendSettings::default(),
            learning: LearningSettings::default(),
            zones: ZoneDefaults::default(),
            max_spoken_alerts: 3,
            frame_width: crate::models::DEFAULT_FRAME_WIDTH,
        }
    }
}

/// File-backed engine settings.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {}: {err}; using defaults",
                    path.display()
                );
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: EngineSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
