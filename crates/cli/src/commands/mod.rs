pub mod goto;
pub mod init;
pub mod plan;
pub mod status;
pub mod version;

use stepmigrate_core::{
    create_plan, Connection, FsDirectoryLister, MigrateResult, Migrations, Step, Target,
};
use stepmigrate_drivers::DriverRegistry;

use crate::args::{DbArgs, DirArgs};

pub(crate) async fn connect(
    registry: &DriverRegistry,
    db: &DbArgs,
) -> anyhow::Result<Box<dyn Connection>> {
    let dsn = db.validated_dsn()?;
    let conn = registry.open(db.driver(), dsn, &db.migrations_table).await?;
    Ok(conn)
}

pub(crate) fn load_migrations(dir: &DirArgs) -> anyhow::Result<Migrations> {
    let config = dir.filename_config()?;
    Ok(Migrations::load_dir(&dir.dir, &config, &FsDirectoryLister)?)
}

pub(crate) async fn load_state_and_plan<'m>(
    conn: &mut dyn Connection,
    target: &Target,
    migrations: &'m Migrations,
) -> MigrateResult<Vec<&'m Step>> {
    let applied = conn.forward_migrated_names().await?;
    create_plan(target, migrations, &applied)
}

/// Close `conn`, then hand back `result`.
///
/// An error in `result` takes precedence over a failure to close.
pub(crate) async fn close_after<T, E>(
    conn: Box<dyn Connection>,
    result: Result<T, E>,
) -> anyhow::Result<T>
where
    E: Into<anyhow::Error>,
{
    let closed = conn.close().await;
    let value = result.map_err(Into::into)?;
    closed?;
    Ok(value)
}
