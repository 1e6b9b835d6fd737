//! Tension detection, prioritization, and lifecycle types.

pub mod detector;
pub mod prioritizer;
pub mod types;

pub use detector::TensionDetector;
pub use prioritizer::{PrioritizerConfig, TensionPrioritizer};
pub use types::{ProtocolId, Resolution, Tension, TensionStatus};
