//! Thermal Comfort Classification for Edge Devices
//!
//! ## Overview
//!
//! A pretrained logistic regression maps an occupant profile (age class and
//! sex) plus the measured air temperature to a binary comfort label. The model
//! was trained offline on the ASHRAE Global Thermal Comfort Database II; only
//! the coefficients ship to the node.
//!
//! ## Why Logistic Regression?
//!
//! 1. **Tiny**: three weights, a bias and two normalization vectors
//! 2. **Deterministic**: the same input always yields the same label
//! 3. **Cheap**: one dot product and one `exp` per sample
//! 4. **Calibrated**: the output is a probability, so the decision threshold
//!    is a deployment knob rather than a retraining job
//!
//! ## Scoring
//!
//! ```text
//! xᵢ   = (featureᵢ - meanᵢ) / scaleᵢ
//! z    = Σ wᵢ·xᵢ + b
//! p    = 1 / (1 + e^(-z))
//! label = comfortable  if p ≥ threshold
//! ```
//!
//! ## Secondary Lamp
//!
//! [`ComfortLamp`] drives the green/red lamp pair from each assessment,
//! independently of the main status indicator.
//!
//! ```rust
//! use stratus_ml::{ComfortClassifier, ComfortLabel, ComfortProfile};
//!
//! let classifier = ComfortClassifier::default();
//! let profile = ComfortProfile::new(3, 1).unwrap();
//! let assessment = classifier.classify(&profile, 30.0).unwrap();
//!
//! assert_eq!(assessment.label, ComfortLabel::Comfortable);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod comfort;
pub mod lamp;

pub use comfort::{
    ComfortAssessment, ComfortClassifier, ComfortLabel, ComfortModel, ComfortProfile, MlError,
    MlResult,
};
pub use lamp::{ComfortLamp, LampState};
