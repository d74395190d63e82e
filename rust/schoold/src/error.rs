use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("unknown assessment category: {0}")]
    UnknownCategory(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("grade level {grade_level} cannot hold more than {max_sections} sections of {capacity}")]
    CapacityExceeded {
        grade_level: String,
        capacity: usize,
        max_sections: usize,
    },
    #[error("percentage {0} is outside [0, 100]")]
    OutOfRange(f64),
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        CoreError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Stable wire code for the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "validation_failed",
            CoreError::UnknownCategory(_) => "unknown_category",
            CoreError::NotFound(_) => "not_found",
            CoreError::CapacityExceeded { .. } => "capacity_exceeded",
            CoreError::OutOfRange(_) => "out_of_range",
            CoreError::Store(_) => "store_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::Validation { details, .. } => details.clone(),
            CoreError::UnknownCategory(c) => Some(json!({
                "category": c,
                "allowed": ["test", "assignment", "midExam", "finalExam"],
            })),
            CoreError::CapacityExceeded {
                grade_level,
                capacity,
                max_sections,
            } => Some(json!({
                "gradeLevel": grade_level,
                "capacity": capacity,
                "maxSections": max_sections,
            })),
            _ => None,
        }
    }
}
