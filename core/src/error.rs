use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid conditions on rule '{rule_id}': {reason}")]
    InvalidConditions { rule_id: String, reason: String },

    #[error("Complaint '{complaint_id}' not found")]
    ComplaintNotFound { complaint_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
