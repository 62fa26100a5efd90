//! Client profile, segment and plan types

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Biological sex, used by the BMR formula
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BiologicalSex {
    Male,
    Female,
}

impl fmt::Display for BiologicalSex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiologicalSex::Male => write!(f, "male"),
            BiologicalSex::Female => write!(f, "female"),
        }
    }
}

impl FromStr for BiologicalSex {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "muž" | "muz" => Ok(BiologicalSex::Male),
            "female" | "f" | "žena" | "zena" => Ok(BiologicalSex::Female),
            other => Err(EngineError::InvalidProfile(format!(
                "unknown biological sex '{}'",
                other
            ))),
        }
    }
}

/// Daily activity level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    #[default]
    Moderate,
    Active,
    VeryActive,
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityLevel::Sedentary => write!(f, "sedentary"),
            ActivityLevel::Light => write!(f, "light"),
            ActivityLevel::Moderate => write!(f, "moderate"),
            ActivityLevel::Active => write!(f, "active"),
            ActivityLevel::VeryActive => write!(f, "very_active"),
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" | "lightly_active" => Ok(ActivityLevel::Light),
            "moderate" | "moderately_active" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "very_active" | "extra_active" => Ok(ActivityLevel::VeryActive),
            other => Err(EngineError::InvalidProfile(format!(
                "unknown activity level '{}'",
                other
            ))),
        }
    }
}

/// Training experience level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperienceLevel::Beginner => write!(f, "beginner"),
            ExperienceLevel::Intermediate => write!(f, "intermediate"),
            ExperienceLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(ExperienceLevel::Beginner),
            "intermediate" => Ok(ExperienceLevel::Intermediate),
            "advanced" => Ok(ExperienceLevel::Advanced),
            other => Err(EngineError::InvalidProfile(format!(
                "unknown experience level '{}'",
                other
            ))),
        }
    }
}

/// A client's intake data
///
/// Produced by the intake-email parser or the manual-entry form and treated
/// as read-only by the engine. Set-valued fields are ordered so that the
/// prompts built from a profile are byte-for-byte stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientProfile {
    pub name: String,

    pub email: String,

    /// Age in years
    pub age: u32,

    #[serde(alias = "gender")]
    pub sex: BiologicalSex,

    /// Body weight in kilograms
    pub weight: f64,

    /// Height in centimeters
    pub height: f64,

    /// Free-text goal as written by the client
    pub goal: String,

    #[serde(default)]
    pub activity_level: ActivityLevel,

    #[serde(default)]
    pub experience_level: ExperienceLevel,

    #[serde(default)]
    pub dietary_restrictions: BTreeSet<String>,

    #[serde(default)]
    pub health_conditions: BTreeSet<String>,

    #[serde(default)]
    pub available_equipment: BTreeSet<String>,
}

impl ClientProfile {
    /// Create a profile with the required fields; optional fields take
    /// their defaults and can be set with the `with_*` methods.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        age: u32,
        sex: BiologicalSex,
        weight: f64,
        height: f64,
        goal: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
            sex,
            weight,
            height,
            goal: goal.into(),
            activity_level: ActivityLevel::default(),
            experience_level: ExperienceLevel::default(),
            dietary_restrictions: BTreeSet::new(),
            health_conditions: BTreeSet::new(),
            available_equipment: BTreeSet::new(),
        }
    }

    pub fn with_activity_level(mut self, level: ActivityLevel) -> Self {
        self.activity_level = level;
        self
    }

    pub fn with_experience_level(mut self, level: ExperienceLevel) -> Self {
        self.experience_level = level;
        self
    }

    pub fn with_dietary_restrictions<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dietary_restrictions = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_health_conditions<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.health_conditions = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_available_equipment<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_equipment = items.into_iter().map(Into::into).collect();
        self
    }

    /// Reject profiles whose numeric fields make no physical sense.
    ///
    /// The engine itself accepts any profile; callers run this before
    /// handing intake data over.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidProfile("name is empty".to_string()));
        }
        if self.age == 0 {
            return Err(EngineError::InvalidProfile(
                "age must be greater than zero".to_string(),
            ));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(EngineError::InvalidProfile(format!(
                "weight must be a positive number, got {}",
                self.weight
            )));
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(EngineError::InvalidProfile(format!(
                "height must be a positive number, got {}",
                self.height
            )));
        }
        Ok(())
    }
}

/// Macro split in percent. Informational only, need not sum to 100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MacroRatio {
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
}

impl Default for MacroRatio {
    fn default() -> Self {
        Self {
            protein: 30,
            carbs: 40,
            fat: 30,
        }
    }
}

/// Where a segment's numbers came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSource {
    /// Parsed from the model's segmentation response
    #[default]
    Model,
    /// Computed locally by the fallback formulas
    Formula,
}

/// Calorie and macro targets for a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSegment {
    /// Segment label, e.g. `weight_loss_male`
    pub segment: String,

    /// Daily calorie target in kcal, always > 0
    pub calorie_target: u32,

    pub protein_grams: u32,

    pub carbs_grams: u32,

    pub fat_grams: u32,

    #[serde(default)]
    pub macro_ratio: MacroRatio,

    /// Training frequency label, e.g. `3x_per_week`
    pub training_frequency: String,

    pub reasoning: String,

    #[serde(default)]
    pub source: SegmentSource,
}

impl ClientSegment {
    /// True when the segment was computed by the fallback formulas
    pub fn is_formula_based(&self) -> bool {
        self.source == SegmentSource::Formula
    }
}

/// Everything the pipeline produces for one client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBundle {
    pub segment: ClientSegment,

    /// Meal plan as returned by the model (Markdown)
    pub meal_plan: String,

    /// Training plan as returned by the model (Markdown)
    pub training_plan: String,
}
