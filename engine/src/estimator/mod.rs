//! Formula-based segment estimator
//!
//! Used whenever the model's segmentation answer is missing or unusable.
//! Pure and deterministic: no network, no clock, no randomness, and total
//! over every `ClientProfile` (including ones `validate()` would reject).
//!
//! - BMR (Mifflin-St Jeor): `10*weight + 6.25*height - 5*age + 5` for men,
//!   `- 161` instead of `+ 5` for women
//! - TDEE: BMR times the activity multiplier
//! - goal keywords move the target by -500 kcal (weight loss) or +300 kcal
//!   (muscle gain); the first matching category wins
//! - protein 2 g/kg, fat 1 g/kg, carbs fill the rest with a 100 g floor
//!
//! Every value is truncated toward zero, as the plans downstream quote whole
//! numbers.

use sdk::{ActivityLevel, BiologicalSex, ClientProfile, ClientSegment, MacroRatio, SegmentSource};

/// Training frequency used for every estimated segment
pub const DEFAULT_TRAINING_FREQUENCY: &str = "3x_per_week";

/// Reasoning text attached to estimated segments
pub const FORMULA_REASONING: &str =
    "Formula-based estimate (Mifflin-St Jeor with standard activity and goal adjustments); \
     not generated by the AI model.";

const MIN_CARBS_GRAMS: u32 = 100;

const WEIGHT_LOSS_KEYWORDS: [&str; 5] = [
    "schudnúť",
    "schudnut",
    "zhubnout",
    "weight loss",
    "chudnutie",
];

const MUSCLE_GAIN_KEYWORDS: [&str; 5] = ["svaly", "muscle", "nabrat", "nabrať", "bulk"];

/// Goal category derived from free-text goal keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalType {
    WeightLoss,
    MuscleGain,
    Maintenance,
}

impl GoalType {
    /// Classify a goal by case-insensitive substring match
    pub fn from_goal(goal: &str) -> Self {
        let goal = goal.to_lowercase();
        if WEIGHT_LOSS_KEYWORDS.iter().any(|k| goal.contains(k)) {
            GoalType::WeightLoss
        } else if MUSCLE_GAIN_KEYWORDS.iter().any(|k| goal.contains(k)) {
            GoalType::MuscleGain
        } else {
            GoalType::Maintenance
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::WeightLoss => "weight_loss",
            GoalType::MuscleGain => "muscle_gain",
            GoalType::Maintenance => "maintenance",
        }
    }

    /// kcal added to TDEE
    pub fn calorie_adjustment(&self) -> f64 {
        match self {
            GoalType::WeightLoss => -500.0,
            GoalType::MuscleGain => 300.0,
            GoalType::Maintenance => 0.0,
        }
    }
}

pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::Light => 1.375,
        ActivityLevel::Moderate => 1.55,
        ActivityLevel::Active => 1.725,
        ActivityLevel::VeryActive => 1.9,
    }
}

/// Basal metabolic rate in kcal/day
pub fn basal_metabolic_rate(profile: &ClientProfile) -> f64 {
    let base = 10.0 * profile.weight + 6.25 * profile.height - 5.0 * f64::from(profile.age);
    match profile.sex {
        BiologicalSex::Male => base + 5.0,
        BiologicalSex::Female => base - 161.0,
    }
}

/// Total daily energy expenditure in kcal/day
pub fn total_daily_energy(profile: &ClientProfile) -> f64 {
    basal_metabolic_rate(profile) * activity_multiplier(profile.activity_level)
}

/// Truncate toward zero into `u32`; negatives and NaN become 0
fn whole(value: f64) -> u32 {
    value.trunc() as u32
}

/// Estimate a segment from the profile alone.
pub fn estimate(profile: &ClientProfile) -> ClientSegment {
    let goal = GoalType::from_goal(&profile.goal);
    let tdee = total_daily_energy(profile);

    // Absurd inputs can push the target to zero or below
    let calorie_target = whole(tdee + goal.calorie_adjustment()).max(1);

    let protein_grams = whole(profile.weight * 2.0);
    let fat_grams = whole(profile.weight);

    let remaining =
        f64::from(calorie_target) - f64::from(protein_grams) * 4.0 - f64::from(fat_grams) * 9.0;
    let carbs_grams = if remaining > 0.0 {
        whole(remaining / 4.0).max(MIN_CARBS_GRAMS)
    } else {
        MIN_CARBS_GRAMS
    };

    ClientSegment {
        segment: format!("{}_{}", goal.as_str(), profile.sex),
        calorie_target,
        protein_grams,
        carbs_grams,
        fat_grams,
        macro_ratio: MacroRatio::default(),
        training_frequency: DEFAULT_TRAINING_FREQUENCY.to_string(),
        reasoning: FORMULA_REASONING.to_string(),
        source: SegmentSource::Formula,
    }
}
