//! Shared test doubles for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use fitplan_engine::llm::{LLMError, LLMProvider};
use sdk::{ActivityLevel, BiologicalSex, ClientProfile, ExperienceLevel};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Provider that plays back a fixed sequence of results.
///
/// Once the script runs out, the last entry is repeated.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, LLMError>>>,
    last: Mutex<Option<Result<String, LLMError>>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    latency: Duration,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, LLMError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn always(result: Result<String, LLMError>) -> Self {
        Self::new(vec![result])
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());

        let next = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match script.pop_front() {
                Some(result) => {
                    *last = Some(result.clone());
                    result
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Err(LLMError::Unknown("empty script".into()))),
            }
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        next
    }
}

/// Provider that answers by inspecting the prompt.
pub struct RoutingProvider<F>
where
    F: Fn(&str) -> Result<String, LLMError> + Send + Sync,
{
    route: F,
    prompts: Mutex<Vec<String>>,
}

impl<F> RoutingProvider<F>
where
    F: Fn(&str) -> Result<String, LLMError> + Send + Sync,
{
    pub fn new(route: F) -> Self {
        Self {
            route,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl<F> LLMProvider for RoutingProvider<F>
where
    F: Fn(&str) -> Result<String, LLMError> + Send + Sync,
{
    fn name(&self) -> &str {
        "routing"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.route)(prompt)
    }
}

pub const VALID_SEGMENT: &str = r#"```json
{
  "segment": "weight_loss_female",
  "calorie_target": 1750,
  "protein_grams": 130,
  "carbs_grams": 170,
  "fat_grams": 60,
  "macro_ratio": {"protein": 30, "carbs": 40, "fat": 30},
  "training_frequency": "4x_per_week",
  "reasoning": "Mierny kalorický deficit"
}
```"#;

pub fn sample_profile() -> ClientProfile {
    ClientProfile::new(
        "Jana Kováčová",
        "jana@example.com",
        34,
        BiologicalSex::Female,
        68.0,
        168.0,
        "Chcem schudnúť pred letom",
    )
    .with_activity_level(ActivityLevel::Light)
    .with_experience_level(ExperienceLevel::Beginner)
    .with_dietary_restrictions(["bez laktózy"])
}
