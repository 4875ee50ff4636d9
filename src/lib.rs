//! Alert decision engine for a walking-assistance camera.
//!
//! Each camera frame yields a batch of detections. A per-user
//! [`AlertDecisionPipeline`] turns the batch into at most a few ranked,
//! spoken alerts, learning from feedback and persisting per-user state
//! through a background SQLite worker.

pub mod alerts;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod personalization;
pub mod priority;
pub mod settings;
pub mod taxonomy;
pub mod trend;
pub mod utils;
pub mod zones;

pub use alerts::{AlertDecisionPipeline, BatchOutcome, RankedAlert, StatusSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use db::Database;
pub use error::EngineError;
pub use models::{
    AlertDecision, AlertMode, AlertReason, Detection, Direction, FeedbackEvent, FeedbackResponse,
    StationarySignal, UserPreference,
};
pub use personalization::PersonalizationStore;
pub use settings::{EngineSettings, SettingsStore};
pub use zones::{Zone, ZoneConfig};
