//! Alert gating, wording and the per-user decision pipeline.

pub mod gate;
pub mod messages;
mod pipeline;

pub use gate::{CooldownFloodController, CooldownRecord, CooldownStatus, GateRequest};
pub use pipeline::{
    AlertDecisionPipeline, BatchOutcome, RankedAlert, StatusSnapshot, SuppressedDetection,
};
