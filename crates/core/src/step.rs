//! Step executor
//!
//! Applies one planned step: reads its SQL file, runs it and records the new
//! migration state. Ordinary steps run the SQL and the bookkeeping write in
//! one transaction; no-transaction steps (and every step on engines without
//! transactional DDL) run both directly against the connection.

use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{MigrateError, MigrateResult};
use crate::filename::Direction;
use crate::migration::Step;
use crate::store::{Database, Execer, FileReader, StateWriter};

/// Execute `step` against `db`, reading its SQL from `dir`.
pub async fn execute<D>(
    step: &Step,
    dir: &Path,
    reader: &dyn FileReader,
    db: &mut D,
) -> MigrateResult<()>
where
    D: Database + ?Sized,
{
    let path = dir.join(&step.filename);
    let bytes = reader.read_file(&path).await?;
    // Drivers take SQL text; non-UTF-8 files are rejected rather than mangled.
    let sql = String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let started = Instant::now();

    if step.no_tx() || !db.transactional_ddl() {
        debug!(step = %step, "executing step without a transaction");
        apply(db, step, &sql).await?;
    } else {
        let mut tx = db.begin().await?;
        match apply(&mut *tx, step, &sql).await {
            Ok(()) => tx.commit().await?,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(step = %step, error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        }
    }

    info!(
        step = %step,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "executed step"
    );
    Ok(())
}

/// Like [`execute`], but writes `<step> ... ` before and `OK`/`FAILED` after.
pub async fn execute_and_log<D>(
    step: &Step,
    dir: &Path,
    reader: &dyn FileReader,
    db: &mut D,
    out: &mut dyn Write,
) -> MigrateResult<()>
where
    D: Database + ?Sized,
{
    write!(out, "{} ... ", step)?;
    out.flush()?;

    match execute(step, dir, reader, db).await {
        Ok(()) => {
            writeln!(out, "OK")?;
            Ok(())
        }
        Err(err) => {
            writeln!(out, "FAILED")?;
            Err(err)
        }
    }
}

async fn apply<E>(target: &mut E, step: &Step, sql: &str) -> MigrateResult<()>
where
    E: Execer + StateWriter + ?Sized,
{
    target.execute(sql).await?;

    let forward_migrated = step.direction() == Direction::Forward;
    let affected = target
        .set_migration_state(&step.migration_name, forward_migrated)
        .await?;
    if affected != 1 {
        return Err(MigrateError::UnexpectedAffectedRowCount {
            name: step.migration_name.clone(),
            affected,
        });
    }
    Ok(())
}
