use thiserror::Error;

/// Errors surfaced by the alert engine.
///
/// None of these are fatal to a session: the worst outcome is that a single
/// detection or a single persistence write is dropped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A detection or command carried values the engine cannot reason about.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Profile or zone-config storage could not be reached.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("unknown alert mode '{0}'")]
    UnknownMode(String),

    /// A radius update would break the ascending zone ordering.
    #[error("radius {radius} for zone {zone} must lie between {lower} and {upper}")]
    InvalidZoneRadius {
        zone: String,
        radius: f64,
        lower: f64,
        upper: f64,
    },
}

impl EngineError {
    pub fn persistence(err: anyhow::Error) -> Self {
        EngineError::PersistenceUnavailable(format!("{err:#}"))
    }
}
