//! Prompt templates
//!
//! Three templates drive the pipeline: `segmentation`, `meal_plan` and
//! `training_plan`. Templates use `{placeholder}` substitution with `{{` and
//! `}}` as literal braces. Built-in templates ship with the crate; a
//! configured prompts directory replaces all three with `<name>.txt` files
//! from disk. A file missing from that directory leaves the template
//! absent, which the orchestrator treats as a configuration error.

use crate::config::{CoreConfig, Language};
use sdk::{BiologicalSex, ClientProfile, ClientSegment, ExperienceLevel};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUILTIN_SEGMENTATION: &str = include_str!("../../prompts/segmentation.txt");
const BUILTIN_MEAL_PLAN: &str = include_str!("../../prompts/meal_plan.txt");
const BUILTIN_TRAINING_PLAN: &str = include_str!("../../prompts/training_plan.txt");

/// Which of the three prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Segmentation,
    MealPlan,
    TrainingPlan,
}

impl PromptKind {
    pub const ALL: [PromptKind; 3] = [
        PromptKind::Segmentation,
        PromptKind::MealPlan,
        PromptKind::TrainingPlan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Segmentation => "segmentation",
            PromptKind::MealPlan => "meal_plan",
            PromptKind::TrainingPlan => "training_plan",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.txt", self.name())
    }

    fn builtin(&self) -> &'static str {
        match self {
            PromptKind::Segmentation => BUILTIN_SEGMENTATION,
            PromptKind::MealPlan => BUILTIN_MEAL_PLAN,
            PromptKind::TrainingPlan => BUILTIN_TRAINING_PLAN,
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors while loading or rendering a template
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Prompt template '{0}' not found")]
    MissingTemplate(PromptKind),

    #[error("Template '{template}' uses unknown placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder {
        template: PromptKind,
        placeholder: String,
    },

    #[error("Template '{template}' has an unclosed '{{' at byte {position}")]
    Unclosed { template: PromptKind, position: usize },

    #[error("Failed to read prompt template {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Substitute `{name}` placeholders from `vars`.
///
/// `{{` and `}}` produce literal braces. A lone `}` is copied through.
pub fn render_template(
    kind: PromptKind,
    template: &str,
    vars: &HashMap<&str, String>,
) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            offset += pos + 2;
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            offset += pos + 2;
        } else if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            offset += pos + 1;
        } else {
            let close = tail.find('}').ok_or(PromptError::Unclosed {
                template: kind,
                position: offset + pos,
            })?;
            let name = tail[1..close].trim();
            let value = vars.get(name).ok_or_else(|| PromptError::UnknownPlaceholder {
                template: kind,
                placeholder: name.to_string(),
            })?;
            out.push_str(value);
            rest = &tail[close + 1..];
            offset += pos + close + 1;
        }
    }
    out.push_str(rest);

    Ok(out)
}

/// Localised labels interpolated into prompts
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    language: Language,
}

impl Labels {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn sex(&self, sex: BiologicalSex) -> &'static str {
        match (self.language, sex) {
            (Language::Sk, BiologicalSex::Male) => "muž",
            (Language::Sk, BiologicalSex::Female) => "žena",
            (Language::En, BiologicalSex::Male) => "male",
            (Language::En, BiologicalSex::Female) => "female",
        }
    }

    pub fn experience(&self, level: ExperienceLevel) -> &'static str {
        match (self.language, level) {
            (Language::Sk, ExperienceLevel::Beginner) => "začiatočník",
            (Language::Sk, ExperienceLevel::Intermediate) => "mierne pokročilý",
            (Language::Sk, ExperienceLevel::Advanced) => "pokročilý",
            (Language::En, ExperienceLevel::Beginner) => "beginner",
            (Language::En, ExperienceLevel::Intermediate) => "intermediate",
            (Language::En, ExperienceLevel::Advanced) => "advanced",
        }
    }

    /// `4x_per_week` → `4x týždenne`; anything unrecognised maps to three
    /// sessions a week.
    pub fn training_frequency(&self, label: &str) -> String {
        let per_week = label
            .trim()
            .strip_suffix("x_per_week")
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=7).contains(n))
            .unwrap_or(3);
        match self.language {
            Language::Sk => format!("{}x týždenne", per_week),
            Language::En => format!("{}x per week", per_week),
        }
    }

    pub fn list(&self, items: &BTreeSet<String>) -> String {
        if items.is_empty() {
            return self.none().to_string();
        }
        join(items)
    }

    pub fn equipment(&self, items: &BTreeSet<String>) -> String {
        if items.is_empty() {
            return match self.language {
                Language::Sk => "Štandardné fitness centrum".to_string(),
                Language::En => "Standard gym".to_string(),
            };
        }
        join(items)
    }

    fn none(&self) -> &'static str {
        match self.language {
            Language::Sk => "Žiadne",
            Language::En => "None",
        }
    }
}

fn join(items: &BTreeSet<String>) -> String {
    items
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The set of templates in use plus the label language
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<PromptKind, String>,
    labels: Labels,
}

impl PromptLibrary {
    /// Templates compiled into the binary
    pub fn builtin(language: Language) -> Self {
        let templates = PromptKind::ALL
            .iter()
            .map(|kind| (*kind, kind.builtin().to_string()))
            .collect();
        Self {
            templates,
            labels: Labels::new(language),
        }
    }

    /// Load `<name>.txt` for each template from `dir`.
    ///
    /// Missing files are logged and left absent.
    pub fn from_dir(dir: &Path, language: Language) -> Result<Self, PromptError> {
        let mut templates = HashMap::new();
        for kind in PromptKind::ALL {
            let path = dir.join(kind.file_name());
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    tracing::debug!("Loaded prompt template {:?}", path);
                    templates.insert(kind, text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!("Prompt template not found: {:?}", path);
                }
                Err(e) => {
                    return Err(PromptError::Io {
                        path,
                        message: e.to_string(),
                    })
                }
            }
        }
        Ok(Self {
            templates,
            labels: Labels::new(language),
        })
    }

    /// Built-in templates unless `core.prompts_dir` is set
    pub fn from_config(core: &CoreConfig) -> Result<Self, PromptError> {
        match &core.prompts_dir {
            Some(dir) => Self::from_dir(dir, core.language),
            None => Ok(Self::builtin(core.language)),
        }
    }

    pub fn with_template(mut self, kind: PromptKind, text: impl Into<String>) -> Self {
        self.templates.insert(kind, text.into());
        self
    }

    pub fn without_template(mut self, kind: PromptKind) -> Self {
        self.templates.remove(&kind);
        self
    }

    pub fn has_template(&self, kind: PromptKind) -> bool {
        self.templates.contains_key(&kind)
    }

    pub fn labels(&self) -> Labels {
        self.labels
    }

    fn render(&self, kind: PromptKind, vars: &HashMap<&str, String>) -> Result<String, PromptError> {
        let template = self
            .templates
            .get(&kind)
            .filter(|t| !t.trim().is_empty())
            .ok_or(PromptError::MissingTemplate(kind))?;
        render_template(kind, template, vars)
    }

    /// Segmentation asks for JSON, so it gets the canonical enum values
    /// rather than localised labels.
    pub fn segmentation_prompt(&self, profile: &ClientProfile) -> Result<String, PromptError> {
        let vars = HashMap::from([
            ("name", profile.name.clone()),
            ("age", profile.age.to_string()),
            ("gender", profile.sex.to_string()),
            ("weight", profile.weight.to_string()),
            ("height", profile.height.to_string()),
            ("goal", profile.goal.clone()),
            ("activity_level", profile.activity_level.to_string()),
            ("experience_level", profile.experience_level.to_string()),
            ("dietary_restrictions", list_or_none(&profile.dietary_restrictions)),
            ("health_conditions", list_or_none(&profile.health_conditions)),
        ]);
        self.render(PromptKind::Segmentation, &vars)
    }

    pub fn meal_plan_prompt(
        &self,
        profile: &ClientProfile,
        segment: &ClientSegment,
    ) -> Result<String, PromptError> {
        let labels = self.labels;
        let vars = HashMap::from([
            ("name", profile.name.clone()),
            ("age", profile.age.to_string()),
            ("gender", labels.sex(profile.sex).to_string()),
            ("weight", profile.weight.to_string()),
            ("height", profile.height.to_string()),
            ("goal", profile.goal.clone()),
            ("calorie_target", segment.calorie_target.to_string()),
            ("protein", segment.protein_grams.to_string()),
            ("carbs", segment.carbs_grams.to_string()),
            ("fat", segment.fat_grams.to_string()),
            ("dietary_restrictions", labels.list(&profile.dietary_restrictions)),
            ("health_conditions", labels.list(&profile.health_conditions)),
        ]);
        self.render(PromptKind::MealPlan, &vars)
    }

    pub fn training_plan_prompt(
        &self,
        profile: &ClientProfile,
        segment: &ClientSegment,
    ) -> Result<String, PromptError> {
        let labels = self.labels;
        let vars = HashMap::from([
            ("name", profile.name.clone()),
            ("experience_level", labels.experience(profile.experience_level).to_string()),
            ("goal", profile.goal.clone()),
            ("training_frequency", labels.training_frequency(&segment.training_frequency)),
            ("health_conditions", labels.list(&profile.health_conditions)),
            ("available_equipment", labels.equipment(&profile.available_equipment)),
        ]);
        self.render(PromptKind::TrainingPlan, &vars)
    }
}

fn list_or_none(items: &BTreeSet<String>) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        join(items)
    }
}
