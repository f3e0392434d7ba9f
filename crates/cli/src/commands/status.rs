use std::io::Write;

use stepmigrate_core::StatusReport;
use stepmigrate_drivers::DriverRegistry;

use crate::args::{DbArgs, DirArgs, StatusFormat};

pub async fn run(
    db: &DbArgs,
    dir: &DirArgs,
    format: StatusFormat,
    registry: &DriverRegistry,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let migrations = super::load_migrations(dir)?;
    let mut conn = super::connect(registry, db).await?;
    let applied = conn.forward_migrated_names().await;
    let applied = super::close_after(conn, applied).await?;

    render(&StatusReport::new(&migrations, &applied), format, out)
}

pub fn render(report: &StatusReport, format: StatusFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    match format {
        StatusFormat::Text => write!(out, "{}", report)?,
        StatusFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
