//! Error handling for catalog migration operations.
//!
//! Record-level validation failures are recovered by filtering, store
//! failures inside a batch are contained by the batch processor, and
//! everything else aborts the run wrapped in a stage-tagged
//! [`MigratorError::Migration`].

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Lifecycle stage of a migration run, attached to run-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    Connect,
    BeginTransaction,
    Execute,
    Commit,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStage::Connect => "connect",
            MigrationStage::BeginTransaction => "begin-transaction",
            MigrationStage::Execute => "execute",
            MigrationStage::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid {field} '{value}': {reason}")]
    Validation {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Database error during {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Store is not connected")]
    NotConnected,

    #[error("Transaction error: {message}")]
    TransactionState { message: String },

    #[error("Migration {migration} failed at {stage}: {source}")]
    Migration {
        migration: String,
        stage: MigrationStage,
        #[source]
        source: Box<MigratorError>,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Interrupted: {reason}")]
    Interrupted { reason: String },
}

impl MigratorError {
    pub fn validation(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::TransactionState {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }

    /// Wrap a failure with the migration name and the stage it happened in.
    pub fn at_stage(self, migration: impl Into<String>, stage: MigrationStage) -> Self {
        Self::Migration {
            migration: migration.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// Stage of a run-level failure, if this error carries one.
    pub fn stage(&self) -> Option<MigrationStage> {
        match self {
            Self::Migration { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Format error with full details including error chain
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

pub type Result<T> = std::result::Result<T, MigratorError>;
