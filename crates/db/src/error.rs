//! Mapping of sqlx errors into [`CoreError`].

use esg_core::CoreError;

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// PostgreSQL `check_violation`.
const CHECK_VIOLATION: &str = "23514";

/// Classify a statement error.
pub fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return CoreError::Conflict(format!(
                    "Duplicate record: {}",
                    db_err.constraint().unwrap_or("unique constraint")
                ))
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return CoreError::Conflict(format!(
                    "Record is referenced elsewhere: {}",
                    db_err.constraint().unwrap_or("foreign key")
                ))
            }
            Some(CHECK_VIOLATION) => {
                return CoreError::Validation(format!(
                    "Constraint failed: {}",
                    db_err.constraint().unwrap_or("check constraint")
                ))
            }
            _ => {}
        }
    }
    CoreError::Storage(err.to_string())
}

/// Errors opening or committing a transaction threaten the whole batch.
pub fn map_tx_error(err: sqlx::Error) -> CoreError {
    CoreError::Transaction(err.to_string())
}
