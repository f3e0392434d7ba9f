use std::io::{self, Write};

use stepmigrate_core::Step;
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

    let steps = super::load_state_and_plan(conn.as_mut(), &target, &migrations).await;
    let steps = super::close_after(conn, steps).await?;

    print_plan(&steps, out)?;
    Ok(())
}

pub fn print_plan(steps: &[&Step], out: &mut dyn Write) -> io::Result<()> {
    if steps.is_empty() {
        return writeln!(out, "Nothing to migrate.");
    }
    for step in steps {
        writeln!(out, "{}", step)?;
    }
    Ok(())
}
