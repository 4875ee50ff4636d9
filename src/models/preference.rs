use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackResponse {
    Ignored,
    Acknowledged,
    AskedMore,
}

impl FeedbackResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackResponse::Ignored => "ignored",
            FeedbackResponse::Acknowledged => "acknowledged",
            FeedbackResponse::AskedMore => "asked_more",
        }
    }
}

impl fmt::Display for FeedbackResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    pub object_class: String,
    pub response: FeedbackResponse,
}

/// Learned attitude of one user towards one object class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreference {
    pub object_class: String,
    /// Positive means more urgent, negative less; bounded by the store.
    pub priority_adjustment: f64,
    pub ignore_count: u32,
    pub action_count: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserPreference {
    pub fn neutral(object_class: impl Into<String>) -> Self {
        Self {
            object_class: object_class.into(),
            priority_adjustment: 0.0,
            ignore_count: 0,
            action_count: 0,
            last_updated: None,
        }
    }
}
