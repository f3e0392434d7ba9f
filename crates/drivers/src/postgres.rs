//! PostgreSQL driver

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Connection as _, Postgres};
use stepmigrate_core::{
    Connection, Database, Execer, MigrateResult, StateReader, StateWriter, TableInitializer,
    Transaction,
};

use crate::dsn;
use crate::error::{DriverError, DriverResult};
use crate::registry::Driver;

/// Quote `s` as a PostgreSQL identifier.
pub fn quote_identifier(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub fn create_table_sql(quoted_table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {quoted_table} (
    "name" TEXT PRIMARY KEY,
    "time" TIMESTAMP WITHOUT TIME ZONE NOT NULL DEFAULT (now() AT TIME ZONE 'UTC')
)"#
    )
}

pub fn set_state_sql(quoted_table: &str, forward_migrated: bool) -> String {
    if forward_migrated {
        format!(r#"INSERT INTO {quoted_table} ("name") VALUES ($1)"#)
    } else {
        format!(r#"DELETE FROM {quoted_table} WHERE "name" = $1"#)
    }
}

pub fn select_names_sql(quoted_table: &str) -> String {
    format!(r#"SELECT "name" FROM {quoted_table}"#)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

#[async_trait]
impl Driver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["postgres", "postgresql"]
    }

    async fn open(&self, dsn: &str, table: &str) -> DriverResult<Box<dyn Connection>> {
        let conn = PgConnection::connect(dsn)
            .await
            .map_err(|source| DriverError::Connect {
                driver: "postgres",
                dsn: dsn::redact(dsn),
                source,
            })?;
        Ok(Box::new(PostgresMigrationConnection::new(conn, table)))
    }
}

pub struct PostgresMigrationConnection {
    conn: PgConnection,
    table: String,
}

impl PostgresMigrationConnection {
    pub fn new(conn: PgConnection, table: &str) -> Self {
        Self {
            conn,
            table: quote_identifier(table),
        }
    }
}

async fn execute_script(conn: &mut PgConnection, sql: &str) -> MigrateResult<()> {
    // A bare &str runs over the simple query protocol, so scripts may hold
    // several statements.
    sqlx::Executor::execute(conn, sql)
        .await
        .map_err(DriverError::from)?;
    Ok(())
}

async fn set_state(
    conn: &mut PgConnection,
    table: &str,
    name: &str,
    forward_migrated: bool,
) -> MigrateResult<u64> {
    let sql = set_state_sql(table, forward_migrated);
    let result = sqlx::query::<Postgres>(&sql)
        .bind(name)
        .execute(conn)
        .await
        .map_err(DriverError::from)?;
    Ok(result.rows_affected())
}

#[async_trait]
impl Execer for PostgresMigrationConnection {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        execute_script(&mut self.conn, sql).await
    }
}

#[async_trait]
impl StateWriter for PostgresMigrationConnection {
    async fn set_migration_state(&mut self, name: &str, forward_migrated: bool) -> MigrateResult<u64> {
        set_state(&mut self.conn, &self.table, name, forward_migrated).await
    }
}

#[async_trait]
impl StateReader for PostgresMigrationConnection {
    async fn forward_migrated_names(&mut self) -> MigrateResult<BTreeSet<String>> {
        let sql = select_names_sql(&self.table);
        let names = sqlx::query_scalar::<Postgres, String>(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(DriverError::from)?;
        Ok(names.into_iter().collect())
    }
}

#[async_trait]
impl TableInitializer for PostgresMigrationConnection {
    async fn create_migrations_table(&mut self) -> MigrateResult<()> {
        tracing::debug!(table = %self.table, "creating migrations table");
        execute_script(&mut self.conn, &create_table_sql(&self.table)).await
    }
}

#[async_trait]
impl Database for PostgresMigrationConnection {
    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn Transaction + 'a>> {
        let tx = self.conn.begin().await.map_err(DriverError::from)?;
        Ok(Box::new(PostgresMigrationTransaction {
            tx,
            table: &self.table,
        }))
    }
}

#[async_trait]
impl Connection for PostgresMigrationConnection {
    async fn close(self: Box<Self>) -> MigrateResult<()> {
        self.conn.close().await.map_err(DriverError::from)?;
        Ok(())
    }
}

pub struct PostgresMigrationTransaction<'c> {
    tx: sqlx::Transaction<'c, Postgres>,
    table: &'c str,
}

#[async_trait]
impl<'c> Execer for PostgresMigrationTransaction<'c> {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        execute_script(&mut self.tx, sql).await
    }
}

#[async_trait]
impl<'c> StateWriter for PostgresMigrationTransaction<'c> {
    async fn set_migration_state(&mut self, name: &str, forward_migrated: bool) -> MigrateResult<u64> {
        set_state(&mut self.tx, self.table, name, forward_migrated).await
    }
}

#[async_trait]
impl<'c> Transaction for PostgresMigrationTransaction<'c> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.tx.commit().await.map_err(DriverError::from)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.tx.rollback().await.map_err(DriverError::from)?;
        Ok(())
    }
}
