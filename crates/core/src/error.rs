use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A transaction could not be opened or committed. Batch drivers
    /// propagate this instead of counting it as a per-record failure.
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl CoreError {
    /// Whether this error threatens the integrity of a whole batch run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Transaction(_))
    }
}
