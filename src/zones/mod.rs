pub mod classifier;
pub mod config;

pub use classifier::{ExpansionNotice, ZoneClassifier, ZoneSummary, ZonedDetection};
pub use config::{Zone, ZoneConfig};
