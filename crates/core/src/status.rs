//! Status report
//!
//! Renders applied/unapplied state per migration and lists entries of the
//! migrations table that have no migration file.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::migration::Migrations;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub forward_file: String,
    pub backward_file: Option<String>,
    pub applied: bool,
    pub forward_no_tx: bool,
    pub backward_no_tx: bool,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.applied { 'X' } else { ' ' };
        write!(f, "[{}] {}", mark, self.forward_file)?;
        if self.forward_no_tx {
            f.write_str(" [no-forward-transaction]")?;
        }
        match self.backward_file {
            None => f.write_str(" [no-backward-migration]")?,
            Some(_) if self.backward_no_tx => f.write_str(" [no-backward-transaction]")?,
            Some(_) => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub migrations: Vec<MigrationStatus>,
    /// Applied names without a migration, sorted
    pub orphans: Vec<String>,
}

impl StatusReport {
    pub fn new(migrations: &Migrations, forward_migrated: &BTreeSet<String>) -> Self {
        let statuses = migrations
            .iter()
            .map(|m| MigrationStatus {
                name: m.name().to_string(),
                forward_file: m.forward.filename.clone(),
                backward_file: m.backward.as_ref().map(|b| b.filename.clone()),
                applied: forward_migrated.contains(m.name()),
                forward_no_tx: m.forward.no_tx(),
                backward_no_tx: m.backward.as_ref().is_some_and(|b| b.no_tx()),
            })
            .collect();

        let known: BTreeSet<&str> = migrations.iter().map(|m| m.name()).collect();
        // BTreeSet iteration keeps the orphans sorted.
        let orphans = forward_migrated
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();

        Self {
            migrations: statuses,
            orphans,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty() && self.orphans.is_empty()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "There are no migrations.");
        }
        for status in &self.migrations {
            writeln!(f, "{}", status)?;
        }
        for orphan in &self.orphans {
            writeln!(f, " !  Entry in the migration table without migration files: {}", orphan)?;
        }
        Ok(())
    }
}
