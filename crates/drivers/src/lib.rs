//! SQL engine adapters for stepmigrate
//!
//! Each engine sits behind its own cargo feature and implements the
//! collaborator traits of `stepmigrate-core` on top of a single sqlx
//! connection. [`DriverRegistry`] maps driver names to adapters.

pub mod dsn;
pub mod error;
pub mod registry;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{DriverError, DriverResult};
pub use registry::{Driver, DriverRegistry};

#[cfg(feature = "mysql")]
pub use mysql::{MySqlDriver, MySqlMigrationConnection};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresDriver, PostgresMigrationConnection};
