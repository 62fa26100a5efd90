//! FitPlan SDK
//!
//! Shared types and error handling for FitPlan components. The engine uses
//! these to drive plan generation; the dashboard and the intake-email parser
//! use them to hand client data to the engine and read results back.

/// Error types and handling
pub mod errors;

/// Client profile, segment and plan types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, FitErrorExt};
pub use types::{
    ActivityLevel, BiologicalSex, ClientProfile, ClientSegment, ExperienceLevel, MacroRatio,
    PlanBundle, SegmentSource,
};
