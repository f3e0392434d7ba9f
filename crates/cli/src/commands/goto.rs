use std::io::Write;
use std::path::Path;

use stepmigrate_core::{
    execute_and_log, Connection, FileReader, FsFileReader, InterruptDetector, MigrateResult,
    Migrations, Target,
};
use stepmigrate_drivers::DriverRegistry;

use crate::args::{DbArgs, DirArgs, TargetArgs};

pub async fn run(
    db: &DbArgs,
    dir: &DirArgs,
    target: &TargetArgs,
    registry: &DriverRegistry,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let target = target.target()?;
    let migrations = super::load_migrations(dir)?;
    let mut conn = super::connect(registry, db).await?;

    let mut interrupts = InterruptDetector::listen()?;
    let result = migrate(
        conn.as_mut(),
        &target,
        &migrations,
        &dir.dir,
        &FsFileReader,
        &interrupts,
        out,
    )
    .await;
    interrupts.shutdown().await;

    super::close_after(conn, result).await?;
    Ok(())
}

/// Plan towards `target` and execute the steps one by one, checking for a
/// termination signal before each step. Returns the number of steps run.
pub async fn migrate(
    conn: &mut dyn Connection,
    target: &Target,
    migrations: &Migrations,
    dir: &Path,
    reader: &dyn FileReader,
    interrupts: &InterruptDetector,
    out: &mut dyn Write,
) -> MigrateResult<usize> {
    let steps = super::load_state_and_plan(&mut *conn, target, migrations).await?;
    if steps.is_empty() {
        writeln!(out, "Nothing to migrate.")?;
        return Ok(0);
    }

    for step in &steps {
        interrupts.check()?;
        execute_and_log(step, dir, reader, &mut *conn, out).await?;
    }

    tracing::info!(steps = steps.len(), %target, "migration finished");
    Ok(steps.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::io;
    use std::sync::Arc;
    use stepmigrate_core::{
        Database, Execer, FilenameConfig, MigrateError, Signal, StateReader, StateWriter,
        TableInitializer, Transaction,
    };
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct MemoryConnection {
        applied: BTreeSet<String>,
        executed: Vec<String>,
    }

    #[async_trait]
    impl Execer for MemoryConnection {
        async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
            self.executed.push(sql.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl StateWriter for MemoryConnection {
        async fn set_migration_state(&mut self, name: &str, forward: bool) -> MigrateResult<u64> {
            let changed = if forward {
                self.applied.insert(name.to_string())
            } else {
                self.applied.remove(name)
            };
            Ok(changed as u64)
        }
    }

    #[async_trait]
    impl StateReader for MemoryConnection {
        async fn forward_migrated_names(&mut self) -> MigrateResult<BTreeSet<String>> {
            Ok(self.applied.clone())
        }
    }

    #[async_trait]
    impl TableInitializer for MemoryConnection {
        async fn create_migrations_table(&mut self) -> MigrateResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Database for MemoryConnection {
        async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn Transaction + 'a>> {
            Ok(Box::new(MemoryTransaction { conn: self }))
        }
    }

    #[async_trait]
    impl Connection for MemoryConnection {
        async fn close(self: Box<Self>) -> MigrateResult<()> {
            Ok(())
        }
    }

    struct MemoryTransaction<'a> {
        conn: &'a mut MemoryConnection,
    }

    #[async_trait]
    impl<'a> Execer for MemoryTransaction<'a> {
        async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
            self.conn.execute(sql).await
        }
    }

    #[async_trait]
    impl<'a> StateWriter for MemoryTransaction<'a> {
        async fn set_migration_state(&mut self, name: &str, forward: bool) -> MigrateResult<u64> {
            self.conn.set_migration_state(name, forward).await
        }
    }

    #[async_trait]
    impl<'a> Transaction for MemoryTransaction<'a> {
        async fn commit(self: Box<Self>) -> MigrateResult<()> {
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> MigrateResult<()> {
            Ok(())
        }
    }

    /// Serves the filename as the SQL text, optionally raising a signal
    /// while the first file is read.
    struct EchoReader {
        interrupt_on_first_read: Option<(mpsc::Sender<Signal>, Arc<InterruptDetector>)>,
    }

    #[async_trait]
    impl FileReader for EchoReader {
        async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
            if let Some((signals, detector)) = &self.interrupt_on_first_read {
                if !detector.is_interrupted() {
                    let _ = signals.send(Signal::Terminate).await;
                    while !detector.is_interrupted() {
                        tokio::task::yield_now().await;
                    }
                }
            }
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            Ok(name.into_owned().into_bytes())
        }
    }

    fn migrations() -> Migrations {
        Migrations::load(
            ["1_a.sql", "1_a.back.sql", "2_b.sql", "2_b.back.sql", "3_c.sql"],
            &FilenameConfig::default(),
        )
        .unwrap()
    }

    fn idle_detector() -> (mpsc::Sender<Signal>, InterruptDetector) {
        let (tx, rx) = mpsc::channel(1);
        (tx, InterruptDetector::with_receiver(rx))
    }

    #[tokio::test]
    async fn test_goto_latest_then_initial() {
        let ms = migrations();
        let mut conn = MemoryConnection::default();
        let reader = EchoReader { interrupt_on_first_read: None };
        let (_tx, interrupts) = idle_detector();

        let mut out = Vec::new();
        let count = migrate(&mut conn, &Target::Latest, &ms, Path::new("m"), &reader, &interrupts, &mut out)
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(conn.executed, ["1_a.sql", "2_b.sql", "3_c.sql"]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "forward-migrate 1_a.sql ... OK\n\
             forward-migrate 2_b.sql ... OK\n\
             forward-migrate 3_c.sql ... OK\n"
        );

        let mut out = Vec::new();
        let err = migrate(&mut conn, &Target::Initial, &ms, Path::new("m"), &reader, &interrupts, &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), r#"migration "3_c.sql" doesn't have a backward step"#);
        assert!(out.is_empty());

        let mut out = Vec::new();
        migrate(&mut conn, &Target::from("1"), &ms, Path::new("m"), &reader, &interrupts, &mut out)
            .await
            .unwrap_err();

        conn.applied.remove("0003_c");
        let mut out = Vec::new();
        migrate(&mut conn, &Target::from("0001_a"), &ms, Path::new("m"), &reader, &interrupts, &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "backward-migrate 2_b.back.sql ... OK\n");
        assert_eq!(conn.applied.iter().collect::<Vec<_>>(), ["0001_a"]);
    }

    #[tokio::test]
    async fn test_nothing_to_migrate() {
        let ms = migrations();
        let mut conn = MemoryConnection::default();
        let (_tx, interrupts) = idle_detector();

        let mut out = Vec::new();
        let count = migrate(
            &mut conn,
            &Target::Initial,
            &ms,
            Path::new("m"),
            &EchoReader { interrupt_on_first_read: None },
            &interrupts,
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "Nothing to migrate.\n");
    }

    #[tokio::test]
    async fn test_pending_signal_prevents_any_step() {
        let ms = migrations();
        let mut conn = MemoryConnection::default();
        let (tx, mut interrupts) = idle_detector();
        tx.send(Signal::Interrupt).await.unwrap();
        interrupts.shutdown().await;

        let mut out = Vec::new();
        let err = migrate(
            &mut conn,
            &Target::Latest,
            &ms,
            Path::new("m"),
            &EchoReader { interrupt_on_first_read: None },
            &interrupts,
            &mut out,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MigrateError::Interrupted { signal: "interrupt" }));
        assert!(conn.executed.is_empty());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_signal_during_step_stops_before_the_next() {
        let ms = migrations();
        let mut conn = MemoryConnection::default();
        let (tx, rx) = mpsc::channel(1);
        let interrupts = Arc::new(InterruptDetector::with_receiver(rx));
        let reader = EchoReader {
            interrupt_on_first_read: Some((tx, Arc::clone(&interrupts))),
        };

        let mut out = Vec::new();
        let err = migrate(&mut conn, &Target::Latest, &ms, Path::new("m"), &reader, &interrupts, &mut out)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "signal: terminated");
        // The step in flight completes and stays committed.
        assert_eq!(conn.executed, ["1_a.sql"]);
        assert_eq!(conn.applied.iter().collect::<Vec<_>>(), ["0001_a"]);
        assert_eq!(String::from_utf8(out).unwrap(), "forward-migrate 1_a.sql ... OK\n");
    }
}
