//! Multi-image diagnosis aggregation: per-image classifier probabilities
//! combined into one clinical verdict and a durable report.

pub mod engine;
pub mod preprocess;
pub mod registry;

pub use engine::{AggregateResult, AggregationEngine, ReportIdGenerator};
pub use preprocess::{ImageInput, ImageTensor};
pub use registry::{ClassifierRegistry, DiseaseEntry, ImageClassifier, RemoteClassifier};

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::DiseaseType;

#[derive(Error, Debug)]
pub enum DiagnosisError {
    #[error("No classifier registered for disease type: {0:?}")]
    UnsupportedDiseaseType(DiseaseType),

    #[error("No images provided")]
    EmptyInput,

    #[error("No image could be decoded or normalized: {0}")]
    Preprocessing(String),

    #[error("Classifier unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
