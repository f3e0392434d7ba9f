//! Collaborator traits
//!
//! The core never talks to a database or the filesystem directly. SQL
//! dialect adapters implement the narrow capability traits below; tests
//! substitute in-memory fakes.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use async_trait::async_trait;

use crate::error::MigrateResult;

/// Runs raw SQL text
#[async_trait]
pub trait Execer: Send {
    /// Execute `sql`, which may contain several statements.
    async fn execute(&mut self, sql: &str) -> MigrateResult<()>;
}

/// Records migration state in the migrations table
#[async_trait]
pub trait StateWriter: Send {
    /// Insert (`forward_migrated`) or delete the row for `migration_name`
    /// and return the number of affected rows.
    async fn set_migration_state(
        &mut self,
        migration_name: &str,
        forward_migrated: bool,
    ) -> MigrateResult<u64>;
}

/// Reads migration state from the migrations table
#[async_trait]
pub trait StateReader: Send {
    /// Every migration name currently recorded as forward-migrated.
    async fn forward_migrated_names(&mut self) -> MigrateResult<BTreeSet<String>>;
}

/// Creates the migrations table
#[async_trait]
pub trait TableInitializer: Send {
    /// Create the migrations table unless it already exists.
    async fn create_migrations_table(&mut self) -> MigrateResult<()>;
}

/// An open database transaction
#[async_trait]
pub trait Transaction: Execer + StateWriter {
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// The execution surface a step runs against
#[async_trait]
pub trait Database: Execer + StateWriter {
    /// Begin a transaction on this connection.
    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn Transaction + 'a>>;

    /// Whether DDL statements can be rolled back as part of a transaction.
    ///
    /// Engines that commit DDL implicitly report `false`; every step then
    /// runs the way a no-transaction step does.
    fn transactional_ddl(&self) -> bool {
        true
    }
}

/// Everything a command needs from one database connection
#[async_trait]
pub trait Connection: Database + StateReader + TableInitializer {
    async fn close(self: Box<Self>) -> MigrateResult<()>;
}

/// Reads migration file contents
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Lists the files of the migrations directory
pub trait DirectoryLister: Send + Sync {
    /// Names of the non-directory entries in `dir`.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// [`FileReader`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileReader;

#[async_trait]
impl FileReader for FsFileReader {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// [`DirectoryLister`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryLister;

impl DirectoryLister for FsDirectoryLister {
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}
