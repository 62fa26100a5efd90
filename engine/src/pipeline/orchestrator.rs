//! Plan Orchestrator
//!
//! Runs the three remote steps for one client profile:
//!
//! `Start → Segmenting → (Segmented | FallbackSegmented) → GeneratingMealPlan
//! → MealPlanReady → GeneratingTrainingPlan → Done`
//!
//! Segmentation never fails the run: a missing template, a remote error or
//! an unusable answer all fall back to the formula estimator. The meal-plan
//! and training-plan steps have no fallback and surface `PipelineError`.

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::estimator;
use crate::llm::{LLMError, LLMProvider};
use crate::pipeline::prompts::PromptLibrary;
use crate::pipeline::segment::{parse_segment, SegmentationOutcome, StepError};
use crate::pipeline::{PipelineError, PipelineEvent, PipelineStage, PlanStep};
use crate::rate_limiter::ThrottleGate;
use crate::retry::{RetryController, RetryPolicy};
use sdk::errors::EngineError;
use sdk::{ClientProfile, ClientSegment, PlanBundle};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Composition root: owns the process-wide cache and throttle and hands
/// out orchestrators that share them.
#[derive(Clone)]
pub struct PlanEngine {
    provider: Arc<dyn LLMProvider>,
    throttle: Arc<ThrottleGate>,
    cache: Arc<ResponseCache>,
    policy: RetryPolicy,
    prompts: Arc<PromptLibrary>,
}

impl PlanEngine {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        throttle: Arc<ThrottleGate>,
        cache: Arc<ResponseCache>,
        policy: RetryPolicy,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        Self {
            provider,
            throttle,
            cache,
            policy,
            prompts,
        }
    }

    /// Build an engine from configuration around an existing provider
    ///
    /// # Errors
    /// `EngineError::Config` if the configured prompts directory cannot be read.
    pub fn from_config(config: &Config, provider: Arc<dyn LLMProvider>) -> Result<Self, EngineError> {
        let prompts = PromptLibrary::from_config(&config.core)
            .map_err(|e| EngineError::Config(e.to_string()))?;

        info!(
            provider = provider.name(),
            min_interval_secs = config.throttle.min_interval().as_secs_f64(),
            max_attempts = config.retry.max_attempts,
            cache_entries = config.cache.max_entries,
            "Plan engine initialized"
        );

        Ok(Self::new(
            provider,
            Arc::new(ThrottleGate::from_config(&config.throttle)),
            Arc::new(ResponseCache::new(config.cache.max_entries)),
            RetryPolicy::from_config(&config.retry),
            Arc::new(prompts),
        ))
    }

    pub fn orchestrator(&self) -> PlanOrchestrator {
        let retry = RetryController::new(
            self.provider.clone(),
            self.throttle.clone(),
            self.cache.clone(),
            self.policy,
        );
        PlanOrchestrator::new(retry, self.prompts.clone())
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn throttle(&self) -> &Arc<ThrottleGate> {
        &self.throttle
    }

    pub async fn generate_all(
        &self,
        profile: &ClientProfile,
        cancel: &CancellationToken,
    ) -> Result<PlanBundle, PipelineError> {
        self.orchestrator().generate_all(profile, cancel).await
    }
}

/// Runs the pipeline for one profile at a time
pub struct PlanOrchestrator {
    retry: RetryController,
    prompts: Arc<PromptLibrary>,
}

impl PlanOrchestrator {
    pub fn new(retry: RetryController, prompts: Arc<PromptLibrary>) -> Self {
        Self { retry, prompts }
    }

    /// Ask the model for the client's segment
    pub async fn segment(
        &self,
        profile: &ClientProfile,
        cancel: &CancellationToken,
    ) -> SegmentationOutcome {
        info!("Segmenting client: {}", profile.name);

        let prompt = match self.prompts.segmentation_prompt(profile) {
            Ok(prompt) => prompt,
            Err(e) => return SegmentationOutcome::Failed(StepError::Prompt(e)),
        };

        let raw = match self.retry.execute(&prompt, cancel).await {
            Ok(raw) => raw,
            Err(e) => return SegmentationOutcome::Failed(StepError::Remote(e)),
        };

        match parse_segment(&raw) {
            Ok(segment) => SegmentationOutcome::Parsed(segment),
            Err(reason) => SegmentationOutcome::Unparsed { raw, reason },
        }
    }

    /// Turn the segmentation outcome into a segment, falling back to the
    /// estimator. Only cancellation escapes.
    fn resolve_segment(
        &self,
        profile: &ClientProfile,
        outcome: SegmentationOutcome,
    ) -> Result<(ClientSegment, PipelineStage), PipelineError> {
        match outcome {
            SegmentationOutcome::Parsed(segment) => {
                info!(
                    "Segmentation complete: {}, {} kcal",
                    segment.segment, segment.calorie_target
                );
                Ok((segment, PipelineStage::Segmented))
            }
            SegmentationOutcome::Unparsed { raw, reason } => {
                warn!("Failed to parse segmentation response ({}), using formula estimate", reason);
                debug!("Raw segmentation response: {}", raw);
                Ok((estimator::estimate(profile), PipelineStage::FallbackSegmented))
            }
            SegmentationOutcome::Failed(StepError::Remote(LLMError::Cancelled)) => {
                Err(PipelineError::Cancelled)
            }
            SegmentationOutcome::Failed(e) => {
                error!("Segmentation failed ({}), using formula estimate", e);
                Ok((estimator::estimate(profile), PipelineStage::FallbackSegmented))
            }
        }
    }

    pub async fn generate_meal_plan(
        &self,
        profile: &ClientProfile,
        segment: &ClientSegment,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        info!("Generating meal plan for: {}", profile.name);
        let prompt = self
            .prompts
            .meal_plan_prompt(profile, segment)
            .map_err(|e| PipelineError::step(PlanStep::MealPlan, e.into()))?;

        let meal_plan = self
            .retry
            .execute(&prompt, cancel)
            .await
            .map_err(|e| PipelineError::step(PlanStep::MealPlan, e.into()))?;

        info!("Meal plan generated: {} characters", meal_plan.chars().count());
        Ok(meal_plan)
    }

    pub async fn generate_training_plan(
        &self,
        profile: &ClientProfile,
        segment: &ClientSegment,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        info!("Generating training plan for: {}", profile.name);
        let prompt = self
            .prompts
            .training_plan_prompt(profile, segment)
            .map_err(|e| PipelineError::step(PlanStep::TrainingPlan, e.into()))?;

        let training_plan = self
            .retry
            .execute(&prompt, cancel)
            .await
            .map_err(|e| PipelineError::step(PlanStep::TrainingPlan, e.into()))?;

        info!(
            "Training plan generated: {} characters",
            training_plan.chars().count()
        );
        Ok(training_plan)
    }

    /// Run all three steps
    pub async fn generate_all(
        &self,
        profile: &ClientProfile,
        cancel: &CancellationToken,
    ) -> Result<PlanBundle, PipelineError> {
        self.run(profile, cancel, None).await
    }

    /// Run all three steps, reporting progress on `events`.
    ///
    /// A closed receiver does not stop the run. Waiting for channel
    /// capacity observes `cancel` like every other suspension point.
    pub async fn generate_all_with_progress(
        &self,
        profile: &ClientProfile,
        cancel: &CancellationToken,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<PlanBundle, PipelineError> {
        self.run(profile, cancel, Some(&events)).await
    }

    async fn run(
        &self,
        profile: &ClientProfile,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<PipelineEvent>>,
    ) -> Result<PlanBundle, PipelineError> {
        info!("Generating all plans for: {}", profile.name);
        emit(events, cancel, PipelineEvent::StageChanged(PipelineStage::Start)).await?;

        emit(events, cancel, PipelineEvent::StageChanged(PipelineStage::Segmenting)).await?;
        let outcome = self.segment(profile, cancel).await;
        let (segment, stage) = self.resolve_segment(profile, outcome)?;
        emit(events, cancel, PipelineEvent::StageChanged(stage)).await?;
        emit(events, cancel, PipelineEvent::SegmentReady(segment.clone())).await?;

        emit(events, cancel, PipelineEvent::StageChanged(PipelineStage::GeneratingMealPlan)).await?;
        let meal_plan = self.generate_meal_plan(profile, &segment, cancel).await?;
        emit(events, cancel, PipelineEvent::StageChanged(PipelineStage::MealPlanReady)).await?;
        emit(events, cancel, PipelineEvent::MealPlanReady(meal_plan.clone())).await?;

        emit(events, cancel, PipelineEvent::StageChanged(PipelineStage::GeneratingTrainingPlan)).await?;
        let training_plan = self
            .generate_training_plan(profile, &segment, cancel)
            .await?;

        let bundle = PlanBundle {
            segment,
            meal_plan,
            training_plan,
        };
        emit(events, cancel, PipelineEvent::StageChanged(PipelineStage::Done)).await?;
        emit(events, cancel, PipelineEvent::Done(Box::new(bundle.clone()))).await?;

        Ok(bundle)
    }
}

/// Send one progress event, waiting for channel capacity.
///
/// A closed receiver is ignored. A full channel that is never drained
/// still yields to `cancel`.
async fn emit(
    events: Option<&mpsc::Sender<PipelineEvent>>,
    cancel: &CancellationToken,
    event: PipelineEvent,
) -> Result<(), PipelineError> {
    let Some(tx) = events else {
        return Ok(());
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        sent = tx.send(event) => {
            if sent.is_err() {
                debug!("Progress receiver dropped; continuing without events");
            }
            Ok(())
        }
    }
}
