//! Driver errors

use stepmigrate_core::MigrateError;
use thiserror::Error;

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unknown driver {name:?} (available: {available})")]
    UnknownDriver { name: String, available: String },

    #[error("unable to detect the database driver from DSN {0}")]
    UndetectableDriver(String),

    #[error("error connecting to {driver} database {dsn}: {source}")]
    Connect {
        driver: &'static str,
        /// DSN with the password redacted
        dsn: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<DriverError> for MigrateError {
    fn from(err: DriverError) -> Self {
        MigrateError::Database(err.to_string())
    }
}
