use std::io::Write;

use stepmigrate_drivers::DriverRegistry;

use crate::args::DbArgs;

pub async fn run(db: &DbArgs, registry: &DriverRegistry, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut conn = super::connect(registry, db).await?;
    let result = conn.create_migrations_table().await;
    super::close_after(conn, result).await?;

    writeln!(out, "Init success.")?;
    Ok(())
}
