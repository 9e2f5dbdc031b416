//! Error types for the persistence toolkit.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for repository and migration operations.
#[derive(Error, Debug)]
pub enum RepoError {
    /// An entity with this identity is already tracked.
    #[error("An entity with Id='{0}' already exists!, you can't add it again.")]
    EntityAlreadyExists(Uuid),

    /// The entity is staged for deletion; only a commit may remove it.
    #[error("An entity with Id='{0}' is already deleted!, you can commit changes to delete it from database.")]
    EntityAlreadyDeleted(Uuid),

    /// No entity with this identity is tracked.
    #[error("An entity with Id='{0}' not found!")]
    EntityNotFound(Uuid),

    /// A column definition was given out-of-range type parameters.
    #[error("Column '{column}': {message}")]
    ColumnBuilder { column: String, message: String },

    /// A table model failed structural validation.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server or database unreachable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver-level database error.
    #[error("Database error: {0}")]
    Db(#[from] tiberius::error::Error),

    /// Catalog metadata could not be read or reconstructed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Migration generation or application failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A queued change failed to execute; the transaction was rolled back.
    #[error("Commit SQL transaction failed!")]
    CommitFailed(#[source] Box<RepoError>),

    /// Rollback after a failed commit also failed. Unrecoverable: the
    /// transaction outcome is unknown. Must propagate, never downgraded.
    #[error("Rollback after failed commit also failed! commit: {commit}; rollback: {rollback}")]
    RollbackFailed {
        commit: Box<RepoError>,
        rollback: Box<RepoError>,
    },

    /// IO error (migration file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (catalog metadata deserialization).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error (configuration files).
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RepoError {
    /// Create a ColumnBuilder error for a named column.
    pub fn column(column: impl Into<String>, message: impl Into<String>) -> Self {
        RepoError::ColumnBuilder {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a Catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        RepoError::Catalog(message.into())
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_failed_keeps_cause() {
        let cause = RepoError::Connection("socket closed".into());
        let err = RepoError::CommitFailed(Box::new(cause));
        let detailed = err.format_detailed();
        assert!(detailed.contains("Commit SQL transaction failed"));
        assert!(detailed.contains("socket closed"));
    }

    #[test]
    fn test_rollback_failed_names_both() {
        let err = RepoError::RollbackFailed {
            commit: Box::new(RepoError::Connection("lost".into())),
            rollback: Box::new(RepoError::Connection("still lost".into())),
        };
        let text = err.to_string();
        assert!(text.contains("lost"));
        assert!(text.contains("still lost"));
    }
}
