//! Error types for migration loading, planning and execution
//!
//! Every failure in this crate is fatal for the operation that produced it;
//! nothing is retried. Messages are worded for the operator who has to fix
//! the migrations directory or the migrations table by hand.

use thiserror::Error;

use crate::filename::Direction;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Reasons a single migration filename can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameError {
    #[error("missing numeric ID prefix")]
    MissingIdPrefix,

    #[error("invalid ID: {0}")]
    InvalidId(String),

    #[error("missing {0:?} extension")]
    MissingExtension(String),

    #[error("multiple {forward:?} and/or {backward:?} suffixes")]
    AmbiguousDirection { forward: String, backward: String },

    #[error("multiple {0:?} suffixes")]
    DuplicateNoTxSuffix(String),

    #[error("exactly one of the {forward:?} and {backward:?} suffixes has to be used")]
    MissingDirectionMarker { forward: String, backward: String },
}

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("error parsing filename {filename:?}: {source}")]
    InvalidFilename {
        filename: String,
        #[source]
        source: FilenameError,
    },

    #[error("duplicate {direction} migration for ID {id}: {existing:?} and {duplicate:?}")]
    DuplicateMigration {
        direction: Direction,
        id: u64,
        existing: String,
        duplicate: String,
    },

    #[error("migration without forward step - {0:?}")]
    MigrationWithoutForwardStep(String),

    #[error(
        "forward and backward migrations ({forward_file:?} and {backward_file:?}) have different description ({forward_description:?} and {backward_description:?})"
    )]
    DescriptionMismatch {
        forward_file: String,
        backward_file: String,
        forward_description: String,
        backward_description: String,
    },

    #[error("the first migration ID must be 1 but it is {0}")]
    FirstIdNotOne(u64),

    #[error("missing migration ID (gap): {0}")]
    IdGap(u64),

    #[error(
        "there is at least one entry in the migrations table without an existing migration file (examine it with the status command and fix it manually) - entry={0:?}"
    )]
    AppliedWithoutFile(String),

    #[error(
        "there is at least one unapplied migration before applied migration {0:?} (examine it with the status command and fix it manually)"
    )]
    UnappliedBeforeApplied(String),

    #[error("invalid target migration - {0:?}")]
    InvalidTarget(String),

    #[error("migration {0:?} doesn't have a backward step")]
    NoBackwardStep(String),

    #[error(
        "error setting state for migration {name:?} in the migrations table: {affected} rows affected (examine it with the status command and fix it manually)"
    )]
    UnexpectedAffectedRowCount { name: String, affected: u64 },

    #[error("error loading migrations dir {dir:?}: {source}")]
    ListDir {
        dir: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("signal: {signal}")]
    Interrupted { signal: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_error_messages() {
        assert_eq!(
            FilenameError::MissingExtension(".sqlx".into()).to_string(),
            r#"missing ".sqlx" extension"#
        );
        assert_eq!(
            FilenameError::AmbiguousDirection {
                forward: ".fw".into(),
                backward: ".bw".into(),
            }
            .to_string(),
            r#"multiple ".fw" and/or ".bw" suffixes"#
        );
        assert_eq!(
            FilenameError::DuplicateNoTxSuffix(".nt".into()).to_string(),
            r#"multiple ".nt" suffixes"#
        );
    }

    #[test]
    fn test_invalid_filename_wraps_cause() {
        let err = MigrateError::InvalidFilename {
            filename: "woof.sql".into(),
            source: FilenameError::MissingIdPrefix,
        };
        assert_eq!(
            err.to_string(),
            r#"error parsing filename "woof.sql": missing numeric ID prefix"#
        );
    }

    #[test]
    fn test_duplicate_migration_message() {
        let err = MigrateError::DuplicateMigration {
            direction: Direction::Backward,
            id: 1,
            existing: "001_initial.bw.sql".into(),
            duplicate: "1_meow.bw.nt.sql".into(),
        };
        assert!(err
            .to_string()
            .starts_with("duplicate backward migration for ID 1:"));
    }
}
