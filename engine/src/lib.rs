//! FitPlan Engine Library
//!
//! AI plan generation client: turns a client profile into a calorie/macro
//! segment, a meal plan and a training plan through a rate-limited,
//! cached, retrying remote model. Used by the `fitplan` binary and by
//! integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Remote model abstraction layer
pub mod llm;

/// Outbound request throttling
pub mod rate_limiter;

/// Response cache keyed by prompt hash
pub mod cache;

/// Retry controller with exponential backoff
pub mod retry;

/// Formula-based fallback segment estimator
pub mod estimator;

/// Segmentation, meal plan and training plan pipeline
pub mod pipeline;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

pub use pipeline::{PipelineError, PlanEngine, PlanOrchestrator};
