//! Comfort model, occupant profile and classifier

use thiserror_no_std::Error;

/// Highest age class the model was trained on (classes 0..=3)
pub const MAX_AGE_CLASS: u8 = 3;

/// Threshold the first deployment shipped with
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Threshold from the later tuning pass
pub const TUNED_THRESHOLD: f32 = 0.63;

/// Result type for comfort operations
pub type MlResult<T> = Result<T, MlError>;

/// Comfort classification errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MlError {
    /// Profile values outside what the model was trained on
    #[error("Invalid profile: {reason}")]
    InvalidProfile {
        /// Which field was rejected
        reason: &'static str,
    },

    /// Temperature is not a finite number
    #[error("Invalid temperature input")]
    InvalidTemperature,

    /// Decision threshold outside (0, 1)
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(f32),
}

/// Occupant features the model conditions on
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ComfortProfile {
    /// Age class (0 = youngest band)
    pub age: u8,
    /// 0 = female, 1 = male
    pub sex: u8,
}

impl ComfortProfile {
    /// Build a validated profile
    pub fn new(age: u8, sex: u8) -> MlResult<Self> {
        let profile = Self { age, sex };
        profile.validate()?;
        Ok(profile)
    }

    /// Check both features are in the trained range
    pub fn validate(&self) -> MlResult<()> {
        if self.age > MAX_AGE_CLASS {
            return Err(MlError::InvalidProfile { reason: "age class out of range" });
        }
        if self.sex > 1 {
            return Err(MlError::InvalidProfile { reason: "sex must be 0 or 1" });
        }
        Ok(())
    }
}

/// Binary comfort outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComfortLabel {
    /// Predicted uncomfortable (label 0)
    Uncomfortable,
    /// Predicted comfortable (label 1)
    Comfortable,
}

impl ComfortLabel {
    /// Numeric label used on the wire
    pub const fn as_u8(&self) -> u8 {
        match self {
            ComfortLabel::Uncomfortable => 0,
            ComfortLabel::Comfortable => 1,
        }
    }

    /// Status word, doubling as the indicator mode name
    pub const fn as_str(&self) -> &'static str {
        match self {
            ComfortLabel::Uncomfortable => "UNCOMFORTABLE",
            ComfortLabel::Comfortable => "COMFORTABLE",
        }
    }
}

/// One classifier output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortAssessment {
    /// Thresholded label
    pub label: ComfortLabel,
    /// Model probability of comfort
    pub probability: f32,
}

impl ComfortAssessment {
    /// Check if the occupant is predicted comfortable
    pub fn is_comfortable(&self) -> bool {
        self.label == ComfortLabel::Comfortable
    }
}

/// Pretrained logistic regression coefficients
///
/// Feature order is (age class, sex, temperature °C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortModel {
    /// Linear weights
    pub weights: [f32; 3],
    /// Intercept
    pub bias: f32,
    /// Per-feature standardization mean
    pub mean: [f32; 3],
    /// Per-feature standardization scale
    pub scale: [f32; 3],
}

impl ComfortModel {
    /// Coefficients from the offline training run
    pub const SHIPPED: ComfortModel = ComfortModel {
        weights: [0.060531, 0.029_132_46, -0.260_136_6],
        bias: 0.562_622_4,
        mean: [0.817_782_74, 0.597_842_26, 25.365_692],
        scale: [0.859_416_93, 0.490_333_45, 4.310_826_4],
    };

    /// Linear score before the logistic transform
    pub fn score(&self, features: [f32; 3]) -> f32 {
        features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .zip(self.weights.iter())
            .map(|(x, w)| w * x)
            .sum::<f32>()
            + self.bias
    }

    /// Probability of comfort for raw features
    pub fn probability(&self, features: [f32; 3]) -> f32 {
        sigmoid(self.score(features))
    }
}

impl Default for ComfortModel {
    fn default() -> Self {
        Self::SHIPPED
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + libm::expf(-z))
}

/// Stateless comfort classifier: model plus decision threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortClassifier {
    model: ComfortModel,
    threshold: f32,
}

impl Default for ComfortClassifier {
    fn default() -> Self {
        Self {
            model: ComfortModel::SHIPPED,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ComfortClassifier {
    /// Shipped model with the tuned threshold
    pub fn tuned() -> Self {
        Self {
            threshold: TUNED_THRESHOLD,
            ..Self::default()
        }
    }

    /// Custom model and threshold
    pub fn new(model: ComfortModel, threshold: f32) -> MlResult<Self> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(MlError::InvalidThreshold(threshold));
        }
        Ok(Self { model, threshold })
    }

    /// Shipped model with a custom threshold
    pub fn with_threshold(threshold: f32) -> MlResult<Self> {
        Self::new(ComfortModel::SHIPPED, threshold)
    }

    /// Decision threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Model coefficients
    pub fn model(&self) -> &ComfortModel {
        &self.model
    }

    /// Classify one occupant at one temperature
    ///
    /// Label is `Comfortable` when the probability is at or above the
    /// threshold.
    pub fn classify(&self, profile: &ComfortProfile, temperature: f32) -> MlResult<ComfortAssessment> {
        if !temperature.is_finite() {
            return Err(MlError::InvalidTemperature);
        }

        let features = [f32::from(profile.age), f32::from(profile.sex), temperature];
        let probability = self.model.probability(features);
        let label = if probability >= self.threshold {
            ComfortLabel::Comfortable
        } else {
            ComfortLabel::Uncomfortable
        };

        Ok(ComfortAssessment { label, probability })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_case_is_comfortable() {
        let classifier = ComfortClassifier::default();
        let profile = ComfortProfile::new(3, 1).unwrap();
        let result = classifier.classify(&profile, 30.0).unwrap();

        assert_eq!(result.label, ComfortLabel::Comfortable);
        assert!((result.probability - 0.613).abs() < 0.002);
    }

    #[test]
    fn tuned_threshold_flips_reference_case() {
        let profile = ComfortProfile::new(3, 1).unwrap();
        let result = ComfortClassifier::tuned().classify(&profile, 30.0).unwrap();
        assert_eq!(result.label, ComfortLabel::Uncomfortable);
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = ComfortClassifier::default();
        let profile = ComfortProfile::new(1, 0).unwrap();
        let first = classifier.classify(&profile, 22.5).unwrap();
        for _ in 0..10 {
            assert_eq!(classifier.classify(&profile, 22.5).unwrap(), first);
        }
    }

    #[test]
    fn warmer_is_less_comfortable() {
        // Negative temperature weight
        let model = ComfortModel::SHIPPED;
        assert!(model.probability([1.0, 0.0, 18.0]) > model.probability([1.0, 0.0, 32.0]));
    }

    #[test]
    fn mean_input_scores_bias() {
        let model = ComfortModel::SHIPPED;
        assert!((model.score(model.mean) - model.bias).abs() < 1e-6);
    }

    #[test]
    fn profile_validation() {
        assert!(ComfortProfile::new(0, 0).is_ok());
        assert!(ComfortProfile::new(3, 1).is_ok());
        assert!(matches!(ComfortProfile::new(4, 0), Err(MlError::InvalidProfile { .. })));
        assert!(matches!(ComfortProfile::new(9, 0), Err(MlError::InvalidProfile { .. })));
        assert!(matches!(ComfortProfile::new(2, 2), Err(MlError::InvalidProfile { .. })));
    }

    #[test]
    fn bad_inputs_rejected() {
        let profile = ComfortProfile::new(2, 1).unwrap();
        assert_eq!(
            ComfortClassifier::default().classify(&profile, f32::NAN),
            Err(MlError::InvalidTemperature)
        );
        assert_eq!(ComfortClassifier::with_threshold(1.0), Err(MlError::InvalidThreshold(1.0)));
        assert!(ComfortClassifier::with_threshold(0.5).is_ok());
    }

    #[test]
    fn label_wire_forms() {
        assert_eq!(ComfortLabel::Comfortable.as_u8(), 1);
        assert_eq!(ComfortLabel::Uncomfortable.as_str(), "UNCOMFORTABLE");
    }
}
