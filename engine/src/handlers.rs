//! Command handlers for CLI operations
//!
//! - generate: run the full pipeline and write the plans to disk
//! - estimate: formula-only segment
//! - config show / path
//! - key set / delete

use anyhow::{Context, Result};
use sdk::errors::FitErrorExt;
use sdk::{ClientProfile, PlanBundle};
use serde_json::json;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::estimator;
use crate::llm::gemini::GeminiProvider;
use crate::pipeline::{PipelineEvent, PlanEngine};
use crate::secrets::{SecretCache, SecretManager, SecretString, GEMINI_API_KEY, SERVICE_NAME};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Read a client profile from a `.json` or `.toml` file and validate it.
pub fn load_profile(path: &Path) -> Result<ClientProfile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile {:?}", path))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let profile: ClientProfile = match extension.as_deref() {
        Some("toml") => toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML profile {:?}", path))?,
        _ => serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON profile {:?}", path))?,
    };

    profile
        .validate()
        .map_err(|e| anyhow::anyhow!("{}\nHint: {}", e, e.user_hint()))?;
    Ok(profile)
}

/// File-name stem for a client: ASCII lowercase, diacritics folded,
/// everything else collapsed to `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'á' | 'ä' => 'a',
            'č' => 'c',
            'ď' => 'd',
            'é' | 'ě' => 'e',
            'í' => 'i',
            'ĺ' | 'ľ' => 'l',
            'ň' => 'n',
            'ó' | 'ô' | 'ö' => 'o',
            'ŕ' | 'ř' => 'r',
            'š' => 's',
            'ť' => 't',
            'ú' | 'ů' | 'ü' => 'u',
            'ý' => 'y',
            'ž' => 'z',
            c if c.is_ascii_alphanumeric() => c,
            _ => '_',
        };
        if folded == '_' && (slug.is_empty() || slug.ends_with('_')) {
            continue;
        }
        slug.push(folded);
    }
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() {
        "client".to_string()
    } else {
        slug
    }
}

/// Paths written by `write_bundle`
#[derive(Debug, Clone, serde::Serialize)]
pub struct WrittenFiles {
    pub meal_plan: PathBuf,
    pub training_plan: PathBuf,
    pub segment: PathBuf,
}

/// Write `<slug>_meal_plan.md`, `<slug>_training_plan.md` and
/// `<slug>_segment.json` into `dir`, creating it if needed.
pub fn write_bundle(dir: &Path, slug: &str, bundle: &PlanBundle) -> Result<WrittenFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let files = WrittenFiles {
        meal_plan: dir.join(format!("{}_meal_plan.md", slug)),
        training_plan: dir.join(format!("{}_training_plan.md", slug)),
        segment: dir.join(format!("{}_segment.json", slug)),
    };

    std::fs::write(&files.meal_plan, &bundle.meal_plan)
        .with_context(|| format!("Failed to write {:?}", files.meal_plan))?;
    std::fs::write(&files.training_plan, &bundle.training_plan)
        .with_context(|| format!("Failed to write {:?}", files.training_plan))?;
    std::fs::write(
        &files.segment,
        serde_json::to_string_pretty(&bundle.segment)?,
    )
    .with_context(|| format!("Failed to write {:?}", files.segment))?;

    Ok(files)
}

/// Build the production engine: Gemini provider with keychain/env API key
pub fn build_engine(config: &Config) -> Result<PlanEngine> {
    let secrets = Arc::new(SecretCache::new(Arc::new(SecretManager::new(SERVICE_NAME))));
    if let Err(e) = secrets.get_secret(GEMINI_API_KEY) {
        anyhow::bail!("{}\nHint: {}", e, e.user_hint());
    }

    let provider = Arc::new(GeminiProvider::new(config.gemini.clone(), secrets));
    tracing::info!("Using Gemini model {}", provider.model());

    PlanEngine::from_config(config, provider).map_err(|e| anyhow::anyhow!("{}", e))
}

/// Run the full pipeline for one profile
pub async fn handle_generate(
    profile_path: &Path,
    out: Option<PathBuf>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let profile = load_profile(profile_path)?;
    let engine = build_engine(config)?;
    let out_dir = out.unwrap_or_else(|| config.core.output_dir.clone());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling plan generation");
            ctrl_c.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel(16);
    let show_progress = matches!(format, OutputFormat::Text);
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !show_progress {
                continue;
            }
            match event {
                PipelineEvent::StageChanged(stage) => {
                    eprintln!("  -> {:?}", stage);
                }
                PipelineEvent::SegmentReady(segment) => {
                    eprintln!(
                        "     segment {} ({} kcal{})",
                        segment.segment,
                        segment.calorie_target,
                        if segment.is_formula_based() {
                            ", formula estimate"
                        } else {
                            ""
                        }
                    );
                }
                PipelineEvent::MealPlanReady(_) | PipelineEvent::Done(_) => {}
            }
        }
    });

    let started = Instant::now();
    let result = engine
        .orchestrator()
        .generate_all_with_progress(&profile, &cancel, tx)
        .await;
    progress.await.ok();

    let bundle = result.map_err(|e| anyhow::anyhow!("{}\nHint: {}", e, e.user_hint()))?;
    let elapsed = started.elapsed();

    let files = write_bundle(&out_dir, &slugify(&profile.name), &bundle)?;

    match format {
        OutputFormat::Text => {
            println!("Plans generated for {}", profile.name);
            println!(
                "  Segment:        {} ({} kcal, P {} g / C {} g / F {} g)",
                bundle.segment.segment,
                bundle.segment.calorie_target,
                bundle.segment.protein_grams,
                bundle.segment.carbs_grams,
                bundle.segment.fat_grams
            );
            if bundle.segment.is_formula_based() {
                println!("  Note:           segment is a formula-based estimate");
            }
            println!("  Meal plan:      {}", files.meal_plan.display());
            println!("  Training plan:  {}", files.training_plan.display());
            println!("  Segment data:   {}", files.segment.display());
            println!("  Processing time: {:.1}s", elapsed.as_secs_f64());
        }
        OutputFormat::Json => {
            let output = json!({
                "client": profile.name,
                "segment": bundle.segment,
                "files": files,
                "processing_time_secs": elapsed.as_secs_f64(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Formula-only segment for a profile
pub fn handle_estimate(profile_path: &Path, format: OutputFormat) -> Result<()> {
    let profile = load_profile(profile_path)?;
    let segment = estimator::estimate(&profile);

    match format {
        OutputFormat::Text => {
            println!("Formula estimate for {}", profile.name);
            println!("  Segment:   {}", segment.segment);
            println!("  Calories:  {} kcal", segment.calorie_target);
            println!("  Protein:   {} g", segment.protein_grams);
            println!("  Carbs:     {} g", segment.carbs_grams);
            println!("  Fat:       {} g", segment.fat_grams);
            println!("  Training:  {}", segment.training_frequency);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&segment)?);
        }
    }
    Ok(())
}

pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            println!("{}", rendered);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

pub fn handle_config_path(custom: Option<&Path>, format: OutputFormat) -> Result<()> {
    let path = match custom {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    match format {
        OutputFormat::Text => println!("{}", path.display()),
        OutputFormat::Json => println!("{}", json!({ "path": path })),
    }
    Ok(())
}

pub fn handle_key_set() -> Result<()> {
    eprintln!("Paste the Gemini API key and press Enter:");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read API key from stdin")?;

    let key = SecretString::new(line);
    if key.is_empty() {
        anyhow::bail!("No API key given on stdin");
    }

    SecretManager::new(SERVICE_NAME)
        .set_secret(GEMINI_API_KEY, key.unsecure())
        .map_err(|e| anyhow::anyhow!("{}\nHint: {}", e, e.user_hint()))?;
    println!("Gemini API key {} stored in the system keychain.", key.masked());
    Ok(())
}

pub fn handle_key_delete() -> Result<()> {
    SecretManager::new(SERVICE_NAME)
        .delete_secret(GEMINI_API_KEY)
        .map_err(|e| anyhow::anyhow!("{}\nHint: {}", e, e.user_hint()))?;
    println!("Gemini API key removed from the system keychain.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::{ClientSegment, MacroRatio, SegmentSource};

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Ján Novák"), "jan_novak");
        assert_eq!(slugify("  Mária  Šťastná-Kováčová "), "maria_stastna_kovacova");
        assert_eq!(slugify("!!!"), "client");
    }

    #[test]
    fn test_load_json_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jana.json");
        std::fs::write(
            &path,
            r#"{"name": "Jana", "email": "jana@example.com", "age": 34, "gender": "female",
                "weight": 68.5, "height": 170, "goal": "schudnúť",
                "activity_level": "light", "dietary_restrictions": ["vegan"]}"#,
        )
        .unwrap();

        let profile = load_profile(&path).unwrap();
        assert_eq!(profile.name, "Jana");
        assert_eq!(profile.age, 34);
        assert!(profile.dietary_restrictions.contains("vegan"));
    }

    #[test]
    fn test_load_toml_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peter.toml");
        std::fs::write(
            &path,
            r#"
name = "Peter"
email = "peter@example.com"
age = 41
sex = "male"
weight = 92.0
height = 185.0
goal = "nabrať svaly"
experience_level = "advanced"
"#,
        )
        .unwrap();

        let profile = load_profile(&path).unwrap();
        assert_eq!(profile.name, "Peter");
        assert_eq!(profile.weight, 92.0);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"name": "X", "email": "", "age": 0, "sex": "male",
                "weight": 80, "height": 180, "goal": ""}"#,
        )
        .unwrap();
        assert!(load_profile(&path).is_err());
    }

    #[test]
    fn test_write_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = PlanBundle {
            segment: ClientSegment {
                segment: "maintenance_male".into(),
                calorie_target: 2500,
                protein_grams: 160,
                carbs_grams: 300,
                fat_grams: 80,
                macro_ratio: MacroRatio::default(),
                training_frequency: "3x_per_week".into(),
                reasoning: String::new(),
                source: SegmentSource::Model,
            },
            meal_plan: "# Jedálniček".into(),
            training_plan: "# Tréning".into(),
        };

        let files = write_bundle(&dir.path().join("out"), "jan_novak", &bundle).unwrap();
        assert!(files.meal_plan.ends_with("jan_novak_meal_plan.md"));
        assert_eq!(std::fs::read_to_string(&files.training_plan).unwrap(), "# Tréning");

        let segment: ClientSegment =
            serde_json::from_str(&std::fs::read_to_string(&files.segment).unwrap()).unwrap();
        assert_eq!(segment.calorie_target, 2500);
    }
}
