//! stepmigrate core
//!
//! Filename parsing, migration loading, planning and step execution for
//! versioned SQL schema migrations. Database access goes through the
//! collaborator traits in [`store`]; concrete SQL engines live in
//! `stepmigrate-drivers`.

pub mod config;
pub mod error;
pub mod filename;
pub mod interrupt;
pub mod migration;
pub mod plan;
pub mod status;
pub mod step;
pub mod store;

pub use config::{ConfigError, FilenameConfig};
pub use error::{FilenameError, MigrateError, MigrateResult};
pub use filename::{parse_filename, Direction, ParsedFilename};
pub use interrupt::{InterruptDetector, Signal};
pub use migration::{migration_name, Migration, MigrationFiles, Migrations, Step};
pub use plan::{check_applied_state, create_plan, Target, TARGET_INITIAL, TARGET_LATEST};
pub use status::{MigrationStatus, StatusReport};
pub use step::{execute, execute_and_log};
pub use store::{
    Connection, Database, DirectoryLister, Execer, FileReader, FsDirectoryLister, FsFileReader,
    StateReader, StateWriter, TableInitializer, Transaction,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
