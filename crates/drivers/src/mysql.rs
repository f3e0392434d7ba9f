//! MySQL driver
//!
//! MySQL commits DDL implicitly, so the connection reports no transactional
//! DDL and the executor runs every step directly.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use sqlx::{Connection as _, MySql};
use stepmigrate_core::{
    Connection, Database, Execer, MigrateResult, StateReader, StateWriter, TableInitializer,
    Transaction,
};

use crate::dsn;
use crate::error::{DriverError, DriverResult};
use crate::registry::Driver;

/// Quote `s` as a MySQL identifier.
pub fn quote_identifier(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

pub fn create_table_sql(quoted_table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {quoted_table} (
    `name` VARCHAR(255) PRIMARY KEY,
    `time` DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)"
    )
}

pub fn set_state_sql(quoted_table: &str, forward_migrated: bool) -> String {
    if forward_migrated {
        format!("INSERT INTO {quoted_table} (`name`) VALUES (?)")
    } else {
        format!("DELETE FROM {quoted_table} WHERE `name` = ?")
    }
}

pub fn select_names_sql(quoted_table: &str) -> String {
    format!("SELECT `name` FROM {quoted_table}")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

#[async_trait]
impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["mysql"]
    }

    async fn open(&self, dsn: &str, table: &str) -> DriverResult<Box<dyn Connection>> {
        let conn = MySqlConnection::connect(dsn)
            .await
            .map_err(|source| DriverError::Connect {
                driver: "mysql",
                dsn: dsn::redact(dsn),
                source,
            })?;
        Ok(Box::new(MySqlMigrationConnection::new(conn, table)))
    }
}

pub struct MySqlMigrationConnection {
    conn: MySqlConnection,
    table: String,
}

impl MySqlMigrationConnection {
    pub fn new(conn: MySqlConnection, table: &str) -> Self {
        Self {
            conn,
            table: quote_identifier(table),
        }
    }
}

async fn execute_script(conn: &mut MySqlConnection, sql: &str) -> MigrateResult<()> {
    sqlx::Executor::execute(conn, sql)
        .await
        .map_err(DriverError::from)?;
    Ok(())
}

async fn set_state(
    conn: &mut MySqlConnection,
    table: &str,
    name: &str,
    forward_migrated: bool,
) -> MigrateResult<u64> {
    let sql = set_state_sql(table, forward_migrated);
    let result = sqlx::query::<MySql>(&sql)
        .bind(name)
        .execute(conn)
        .await
        .map_err(DriverError::from)?;
    Ok(result.rows_affected())
}

#[async_trait]
impl Execer for MySqlMigrationConnection {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        execute_script(&mut self.conn, sql).await
    }
}

#[async_trait]
impl StateWriter for MySqlMigrationConnection {
    async fn set_migration_state(&mut self, name: &str, forward_migrated: bool) -> MigrateResult<u64> {
        set_state(&mut self.conn, &self.table, name, forward_migrated).await
    }
}

#[async_trait]
impl StateReader for MySqlMigrationConnection {
    async fn forward_migrated_names(&mut self) -> MigrateResult<BTreeSet<String>> {
        let sql = select_names_sql(&self.table);
        let names = sqlx::query_scalar::<MySql, String>(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(DriverError::from)?;
        Ok(names.into_iter().collect())
    }
}

#[async_trait]
impl TableInitializer for MySqlMigrationConnection {
    async fn create_migrations_table(&mut self) -> MigrateResult<()> {
        tracing::debug!(table = %self.table, "creating migrations table");
        execute_script(&mut self.conn, &create_table_sql(&self.table)).await
    }
}

#[async_trait]
impl Database for MySqlMigrationConnection {
    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn Transaction + 'a>> {
        let tx = self.conn.begin().await.map_err(DriverError::from)?;
        Ok(Box::new(MySqlMigrationTransaction {
            tx,
            table: &self.table,
        }))
    }

    fn transactional_ddl(&self) -> bool {
        false
    }
}

#[async_trait]
impl Connection for MySqlMigrationConnection {
    async fn close(self: Box<Self>) -> MigrateResult<()> {
        self.conn.close().await.map_err(DriverError::from)?;
        Ok(())
    }
}

/// Only used for DML; DDL would be committed implicitly.
pub struct MySqlMigrationTransaction<'c> {
    tx: sqlx::Transaction<'c, MySql>,
    table: &'c str,
}

#[async_trait]
impl<'c> Execer for MySqlMigrationTransaction<'c> {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        execute_script(&mut self.tx, sql).await
    }
}

#[async_trait]
impl<'c> StateWriter for MySqlMigrationTransaction<'c> {
    async fn set_migration_state(&mut self, name: &str, forward_migrated: bool) -> MigrateResult<u64> {
        set_state(&mut self.tx, self.table, name, forward_migrated).await
    }
}

#[async_trait]
impl<'c> Transaction for MySqlMigrationTransaction<'c> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.tx.commit().await.map_err(DriverError::from)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.tx.rollback().await.map_err(DriverError::from)?;
        Ok(())
    }
}
