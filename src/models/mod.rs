pub mod alert;
pub mod detection;
pub mod preference;

pub use alert::{AlertDecision, AlertMode, AlertReason};
pub use detection::{normalize_class, Detection, Direction, StationarySignal, DEFAULT_FRAME_WIDTH};
pub use preference::{FeedbackEvent, FeedbackResponse, UserPreference};
