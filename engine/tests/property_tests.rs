use fitplan_engine::estimator;
use fitplan_engine::pipeline::parse_segment;
use fitplan_engine::retry::RetryPolicy;
use proptest::prelude::*;
use sdk::{ActivityLevel, BiologicalSex, ClientProfile};
use std::time::Duration;

fn arb_profile() -> impl Strategy<Value = ClientProfile> {
    (
        1u32..=110,
        any::<bool>(),
        30.0f64..250.0,
        120.0f64..220.0,
        prop_oneof![
            Just(ActivityLevel::Sedentary),
            Just(ActivityLevel::Light),
            Just(ActivityLevel::Moderate),
            Just(ActivityLevel::Active),
            Just(ActivityLevel::VeryActive),
        ],
        "\\PC{0,60}",
    )
        .prop_map(|(age, male, weight, height, activity, goal)| {
            let sex = if male {
                BiologicalSex::Male
            } else {
                BiologicalSex::Female
            };
            ClientProfile::new("P", "p@example.com", age, sex, weight, height, goal)
                .with_activity_level(activity)
        })
}

proptest! {
    // Fallback estimator never panics and always yields a usable segment
    #[test]
    fn test_estimate_is_total(profile in arb_profile()) {
        let segment = estimator::estimate(&profile);
        prop_assert!(segment.calorie_target > 0);
        prop_assert!(segment.carbs_grams >= 100);
        prop_assert!(segment.is_formula_based());
        prop_assert!(segment.segment.ends_with(&profile.sex.to_string()));
    }

    // Same profile, same answer
    #[test]
    fn test_estimate_is_deterministic(profile in arb_profile()) {
        prop_assert_eq!(estimator::estimate(&profile), estimator::estimate(&profile));
    }

    // Backoff is within [min(cap, base * 2^(n-1)), cap + 1s]
    #[test]
    fn test_backoff_bounds(
        base_ms in 0u64..10_000,
        extra_ms in 0u64..120_000,
        attempt in 1u32..12,
        jitter in 0.0f64..1.0,
    ) {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(base_ms),
            backoff_cap: Duration::from_millis(base_ms + extra_ms),
        };
        let delay = policy.backoff_delay(attempt, jitter).as_secs_f64();
        let exponential = (base_ms as f64 / 1000.0) * 2f64.powi(attempt as i32 - 1);
        let cap = policy.backoff_cap.as_secs_f64();

        prop_assert!(delay + 1e-6 >= exponential.min(cap));
        prop_assert!(delay <= cap + 1.0 + 1e-6);
    }

    // Arbitrary model output never panics the parser
    #[test]
    fn test_parse_segment_never_panics(text in "\\PC{0,400}") {
        let _ = parse_segment(&text);
    }

    // Whatever wraps a valid object, the numbers survive
    #[test]
    fn test_parse_segment_ignores_surrounding_prose(
        calories in 1u32..6000,
        protein in 0u32..400,
        prefix in "[a-zA-Z .,:]{0,40}",
        suffix in "[a-zA-Z .,:]{0,40}",
        fenced in any::<bool>(),
    ) {
        let object = format!(
            r#"{{"calorie_target": {}, "protein_grams": {}, "carbs_grams": 200, "fat_grams": 70}}"#,
            calories, protein
        );
        let body = if fenced {
            format!("```json\n{}\n```", object)
        } else {
            object
        };
        let text = format!("{}\n{}\n{}", prefix, body, suffix);

        let segment = parse_segment(&text).unwrap();
        prop_assert_eq!(segment.calorie_target, calories);
        prop_assert_eq!(segment.protein_grams, protein);
    }
}
