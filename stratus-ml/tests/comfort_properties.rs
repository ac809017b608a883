//! Comfort classifier properties across the trained input range

use proptest::prelude::*;
use stratus_ml::comfort::MAX_AGE_CLASS;
use stratus_ml::{ComfortClassifier, ComfortLabel, ComfortProfile};

proptest! {
    #[test]
    fn probability_is_a_probability(
        age in 0u8..=MAX_AGE_CLASS,
        sex in 0u8..=1,
        temperature in -10.0f32..50.0,
    ) {
        let profile = ComfortProfile::new(age, sex).unwrap();
        let result = ComfortClassifier::default().classify(&profile, temperature).unwrap();
        prop_assert!(result.probability > 0.0 && result.probability < 1.0);
    }

    #[test]
    fn label_matches_threshold(
        age in 0u8..=MAX_AGE_CLASS,
        sex in 0u8..=1,
        temperature in 10.0f32..40.0,
        threshold in 0.05f32..0.95,
    ) {
        let profile = ComfortProfile::new(age, sex).unwrap();
        let classifier = ComfortClassifier::with_threshold(threshold).unwrap();
        let result = classifier.classify(&profile, temperature).unwrap();

        let expected = if result.probability >= threshold {
            ComfortLabel::Comfortable
        } else {
            ComfortLabel::Uncomfortable
        };
        prop_assert_eq!(result.label, expected);
    }

    #[test]
    fn warming_never_raises_comfort(
        age in 0u8..=MAX_AGE_CLASS,
        sex in 0u8..=1,
        low in 10.0f32..30.0,
        delta in 0.5f32..10.0,
    ) {
        let profile = ComfortProfile::new(age, sex).unwrap();
        let classifier = ComfortClassifier::default();
        let cool = classifier.classify(&profile, low).unwrap();
        let warm = classifier.classify(&profile, low + delta).unwrap();
        prop_assert!(warm.probability <= cool.probability);
    }
}

#[test]
fn profiles_round_trip_through_registry_shape() {
    let profile = ComfortProfile::new(3, 1).unwrap();
    let json = serde_json::to_string(&profile).unwrap();
    assert_eq!(json, r#"{"age":3,"sex":1}"#);
}
