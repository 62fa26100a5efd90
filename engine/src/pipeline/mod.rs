//! Plan Pipeline
//!
//! Sequences segmentation → meal plan → training plan for one client.

pub mod orchestrator;
pub mod prompts;
pub mod segment;

pub use orchestrator::{PlanEngine, PlanOrchestrator};
pub use prompts::{PromptError, PromptKind, PromptLibrary};
pub use segment::{parse_segment, SegmentParseError, SegmentationOutcome, StepError};

use crate::llm::LLMError;
use sdk::errors::FitErrorExt;
use sdk::{ClientSegment, PlanBundle};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Where the orchestrator is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    Segmenting,
    /// Segment parsed from the model's answer
    Segmented,
    /// Segment computed by the fallback formulas
    FallbackSegmented,
    GeneratingMealPlan,
    MealPlanReady,
    GeneratingTrainingPlan,
    Done,
}

/// Steps whose failure aborts the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStep {
    MealPlan,
    TrainingPlan,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::MealPlan => write!(f, "meal plan"),
            PlanStep::TrainingPlan => write!(f, "training plan"),
        }
    }
}

/// Progress notifications from `generate_all_with_progress`
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StageChanged(PipelineStage),
    SegmentReady(ClientSegment),
    MealPlanReady(String),
    Done(Box<PlanBundle>),
}

/// The only error the orchestrator surfaces.
///
/// Segmentation problems never appear here; they are absorbed by the
/// fallback estimator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to generate {step}: {source}")]
    Step {
        step: PlanStep,
        #[source]
        source: StepError,
    },

    #[error("Plan generation was cancelled")]
    Cancelled,
}

impl PipelineError {
    pub(crate) fn step(step: PlanStep, source: StepError) -> Self {
        match source {
            StepError::Remote(LLMError::Cancelled) => PipelineError::Cancelled,
            source => PipelineError::Step { step, source },
        }
    }

    /// True for capacity failures: the same request is likely to succeed
    /// if tried again shortly.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            PipelineError::Step {
                source: StepError::Remote(LLMError::RateLimitExceeded(_)),
                ..
            }
        )
    }

    /// The failing step, if any
    pub fn failed_step(&self) -> Option<PlanStep> {
        match self {
            PipelineError::Step { step, .. } => Some(*step),
            PipelineError::Cancelled => None,
        }
    }
}

impl FitErrorExt for PipelineError {
    fn user_hint(&self) -> &str {
        match self {
            PipelineError::Step {
                source: StepError::Remote(e),
                ..
            } => e.user_hint(),
            PipelineError::Step {
                source: StepError::Prompt(_),
                ..
            } => "A prompt template is missing or invalid. Check core.prompts_dir",
            PipelineError::Cancelled => "Plan generation was cancelled",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::Step {
                source: StepError::Remote(e),
                ..
            } => e.is_recoverable(),
            PipelineError::Step {
                source: StepError::Prompt(_),
                ..
            } => false,
            PipelineError::Cancelled => true,
        }
    }
}
