//! Disease classifier registry.
//!
//! Each disease type maps to a classifier plus its label vocabulary, so
//! call sites never branch on disease names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::preprocess::ImageTensor;
use super::DiagnosisError;
use crate::models::DiseaseType;

/// A pre-trained binary classifier for one disease.
///
/// External collaborator: given a normalized tensor it returns the
/// probability of disease in [0, 1].
pub trait ImageClassifier: Send + Sync {
    fn predict(&self, tensor: &ImageTensor) -> Result<f64, DiagnosisError>;
}

/// A registered disease: classifier plus display vocabulary.
pub struct DiseaseEntry {
    pub classifier: Box<dyn ImageClassifier>,
    pub positive_label: &'static str,
    pub negative_label: &'static str,
}

impl DiseaseEntry {
    pub fn label(&self, has_disease: bool) -> &'static str {
        if has_disease {
            self.positive_label
        } else {
            self.negative_label
        }
    }
}

/// Maps disease types to their classifier and labels. Built once at
/// startup; extending it never touches aggregation call sites.
pub struct ClassifierRegistry {
    entries: HashMap<DiseaseType, DiseaseEntry>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a classifier with the standard vocabulary for its disease.
    pub fn register(&mut self, disease: DiseaseType, classifier: Box<dyn ImageClassifier>) {
        let (positive_label, negative_label) = vocabulary(disease);
        self.entries.insert(
            disease,
            DiseaseEntry {
                classifier,
                positive_label,
                negative_label,
            },
        );
    }

    pub fn get(&self, disease: DiseaseType) -> Result<&DiseaseEntry, DiagnosisError> {
        self.entries
            .get(&disease)
            .ok_or(DiagnosisError::UnsupportedDiseaseType(disease))
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed per-disease label vocabulary.
fn vocabulary(disease: DiseaseType) -> (&'static str, &'static str) {
    match disease {
        DiseaseType::Pneumonia => ("Pneumonia", "Normal"),
        DiseaseType::Tuberculosis => ("Tuberculosis", "Normal"),
        DiseaseType::Melanoma => ("Melanoma", "Benign"),
    }
}

// ── Remote inference client ─────────────────────────────────────────────

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a [f32],
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct InferenceResponse {
    probability: f64,
}

/// Classifier served over HTTP by an inference endpoint.
///
/// Posts the normalized tensor and reads back a scalar probability.
pub struct RemoteClassifier {
    endpoint: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl RemoteClassifier {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }
}

impl ImageClassifier for RemoteClassifier {
    fn predict(&self, tensor: &ImageTensor) -> Result<f64, DiagnosisError> {
        let body = InferenceRequest {
            inputs: &tensor.pixels,
            width: tensor.width,
            height: tensor.height,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DiagnosisError::CollaboratorUnavailable(format!(
                        "inference timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    DiagnosisError::CollaboratorUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiagnosisError::CollaboratorUnavailable(format!(
                "inference endpoint returned {status}"
            )));
        }

        let parsed: InferenceResponse = response
            .json()
            .map_err(|e| DiagnosisError::CollaboratorUnavailable(e.to_string()))?;

        if !(0.0..=1.0).contains(&parsed.probability) {
            return Err(DiagnosisError::CollaboratorUnavailable(format!(
                "probability out of range: {}",
                parsed.probability
            )));
        }
        Ok(parsed.probability)
    }
}
