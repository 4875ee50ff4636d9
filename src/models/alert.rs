use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    /// Everything worth mentioning.
    #[default]
    Normal,
    /// Hazards only.
    Quiet,
    /// Obstacles while on the move.
    Walking,
    /// Say everything once, including usually ignored classes.
    Scanning,
}

impl AlertMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertMode::Normal => "normal",
            AlertMode::Quiet => "quiet",
            AlertMode::Walking => "walking",
            AlertMode::Scanning => "scanning",
        }
    }

    /// Confirmation spoken back when the mode changes.
    pub fn confirmation(&self) -> &'static str {
        match self {
            AlertMode::Normal => "Normal alerts",
            AlertMode::Quiet => "Quiet mode, hazards only",
            AlertMode::Walking => "Walking mode, focusing on obstacles",
            AlertMode::Scanning => "Scanning mode, I will tell you everything",
        }
    }
}

impl FromStr for AlertMode {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "normal" => Ok(AlertMode::Normal),
            "quiet" => Ok(AlertMode::Quiet),
            "walking" => Ok(AlertMode::Walking),
            "scanning" => Ok(AlertMode::Scanning),
            other => Err(EngineError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for AlertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gate decided the way it did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    Approved,
    TooManyAlerts,
    QuietMode,
    StationaryIgnore,
    StationaryFar,
    Cooldown,
    TooFar,
    UsuallyIgnored,
}

impl AlertReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertReason::Approved => "approved",
            AlertReason::TooManyAlerts => "too_many_alerts",
            AlertReason::QuietMode => "quiet_mode",
            AlertReason::StationaryIgnore => "stationary_ignore",
            AlertReason::StationaryFar => "stationary_far",
            AlertReason::Cooldown => "cooldown",
            AlertReason::TooFar => "too_far",
            AlertReason::UsuallyIgnored => "usually_ignored",
        }
    }
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub reason: AlertReason,
    /// 1 is the most urgent, 5 the least.
    pub priority: u8,
    pub message: String,
    pub cooldown_remaining: f64,
}

impl AlertDecision {
    pub fn approved(priority: u8, message: String) -> Self {
        Self {
            should_alert: true,
            reason: AlertReason::Approved,
            priority,
            message,
            cooldown_remaining: 0.0,
        }
    }

    pub fn suppressed(reason: AlertReason, priority: u8, cooldown_remaining: f64) -> Self {
        Self {
            should_alert: false,
            reason,
            priority,
            message: String::new(),
            cooldown_remaining,
        }
    }
}
