use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::DiseaseType;

/// Outcome of one image inside an aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    pub probability: f64,
    pub label: String,
}

/// The persisted record of one diagnosis aggregation run.
///
/// Written exactly once; `probability` and `has_disease` are consistent
/// under the fixed 0.5 decision threshold. Referenced by AI conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    /// Known patient identity, when the submitting doctor attached one.
    pub patient_email: Option<String>,
    pub patient_name: String,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
    pub doctor_email: String,
    pub disease_type: DiseaseType,
    pub disease_name: String,
    pub probability: f64,
    pub has_disease: bool,
    pub confidence_percentage: f64,
    pub image_results: Vec<ImageResult>,
    pub images_requested: u32,
    pub images_evaluated: u32,
    pub created_at: DateTime<Utc>,
}
