use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use super::preprocess::{self, ImageInput};
use super::registry::ClassifierRegistry;
use super::DiagnosisError;
use crate::db::repository;
use crate::models::{DiseaseType, ImageResult, Participant, Report};

/// Decision threshold: strictly above means disease-positive, so a mean
/// of exactly 0.5 is negative.
const DECISION_THRESHOLD: f64 = 0.5;

/// Aggregated verdict over one diagnosis submission, before persistence.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub disease_type: DiseaseType,
    pub disease_name: String,
    pub probability: f64,
    pub has_disease: bool,
    pub confidence_percentage: f64,
    pub image_results: Vec<ImageResult>,
    pub images_requested: u32,
    pub images_evaluated: u32,
}

/// Generates report ids unique under rapid repeated calls.
///
/// Wall-clock seconds alone collide under load. A random per-instance tag
/// plus a monotonic counter keeps ids unique within one generator and
/// across generators sharing a database (restarts, multiple cores).
pub struct ReportIdGenerator {
    instance: String,
    counter: AtomicU64,
}

impl ReportIdGenerator {
    pub fn new() -> Self {
        let tag = Uuid::new_v4().simple().to_string();
        Self {
            instance: tag[..8].to_string(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("RPT-{stamp}-{}-{n}", self.instance)
    }
}

impl Default for ReportIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns N classifier outputs into one clinical verdict plus a durable
/// report record.
pub struct AggregationEngine {
    registry: ClassifierRegistry,
    report_ids: ReportIdGenerator,
}

impl AggregationEngine {
    pub fn new(registry: ClassifierRegistry) -> Self {
        Self {
            registry,
            report_ids: ReportIdGenerator::new(),
        }
    }

    /// Score every image with the disease classifier and aggregate via
    /// arithmetic mean.
    ///
    /// An image that fails to decode or score is dropped; the result
    /// records how many images succeeded versus were requested. The call
    /// fails only when no image yields a probability.
    pub fn predict(
        &self,
        images: &[ImageInput],
        disease: DiseaseType,
    ) -> Result<AggregateResult, DiagnosisError> {
        let entry = self.registry.get(disease)?;
        if images.is_empty() {
            return Err(DiagnosisError::EmptyInput);
        }

        let mut probabilities = Vec::with_capacity(images.len());
        let mut collaborator_failure: Option<String> = None;
        let mut preprocess_failure: Option<String> = None;

        for (index, input) in images.iter().enumerate() {
            let tensor = match preprocess::normalize(input) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(index, error = %e, "image dropped during preprocessing");
                    preprocess_failure = Some(e.to_string());
                    continue;
                }
            };
            match entry.classifier.predict(&tensor) {
                Ok(p) => probabilities.push(p),
                Err(e) => {
                    tracing::warn!(index, error = %e, "image dropped: classifier call failed");
                    collaborator_failure = Some(e.to_string());
                }
            }
        }

        if probabilities.is_empty() {
            // No safe fallback prediction exists, so the whole call fails.
            return Err(match (collaborator_failure, preprocess_failure) {
                (Some(reason), _) => DiagnosisError::CollaboratorUnavailable(reason),
                (None, Some(reason)) => DiagnosisError::Preprocessing(reason),
                (None, None) => DiagnosisError::EmptyInput,
            });
        }

        let mean = probabilities.iter().sum::<f64>() / probabilities.len() as f64;
        let has_disease = mean > DECISION_THRESHOLD;
        let disease_name = entry.label(has_disease).to_string();

        let image_results = probabilities
            .iter()
            .map(|&p| ImageResult {
                probability: p,
                label: entry.label(p > DECISION_THRESHOLD).to_string(),
            })
            .collect();

        tracing::info!(
            disease = disease.as_str(),
            evaluated = probabilities.len(),
            requested = images.len(),
            mean,
            "aggregation complete"
        );

        Ok(AggregateResult {
            disease_type: disease,
            disease_name,
            probability: mean,
            has_disease,
            confidence_percentage: round2(mean * 100.0),
            image_results,
            images_requested: images.len() as u32,
            images_evaluated: probabilities.len() as u32,
        })
    }

    /// Persist an aggregation result as an immutable report.
    ///
    /// A storage failure here always surfaces; losing a diagnosis is a
    /// correctness violation.
    pub fn persist_report(
        &self,
        conn: &Connection,
        result: &AggregateResult,
        doctor_email: &str,
        patient: Option<&Participant>,
    ) -> Result<Report, DiagnosisError> {
        let report = Report {
            report_id: self.report_ids.next_id(),
            patient_email: patient.map(|p| p.email.clone()),
            patient_name: patient.map(|p| p.display_name.clone()).unwrap_or_default(),
            patient_age: patient.and_then(|p| p.age),
            patient_gender: patient.and_then(|p| p.gender.clone()),
            doctor_email: doctor_email.to_string(),
            disease_type: result.disease_type,
            disease_name: result.disease_name.clone(),
            probability: result.probability,
            has_disease: result.has_disease,
            confidence_percentage: result.confidence_percentage,
            image_results: result.image_results.clone(),
            images_requested: result.images_requested,
            images_evaluated: result.images_evaluated,
            created_at: Utc::now(),
        };

        repository::insert_report(conn, &report)?;
        tracing::info!(report_id = %report.report_id, "report persisted");
        Ok(report)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
