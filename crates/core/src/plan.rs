//! Migration planner
//!
//! Computes the steps that take the database from its current applied state
//! to a target migration: backward steps for applied migrations above the
//! target (descending), then forward steps for unapplied migrations up to and
//! including the target (ascending).

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{MigrateError, MigrateResult};
use crate::migration::{Migrations, Step};

pub const TARGET_INITIAL: &str = "initial";
pub const TARGET_LATEST: &str = "latest";

/// A target expression as given by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Before the first migration
    Initial,
    /// The last migration
    Latest,
    /// Bare ID, padded ID, canonical name or forward filename
    Named(String),
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        match s {
            TARGET_INITIAL => Target::Initial,
            TARGET_LATEST => Target::Latest,
            other => Target::Named(other.to_string()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Initial => f.write_str(TARGET_INITIAL),
            Target::Latest => f.write_str(TARGET_LATEST),
            Target::Named(name) => f.write_str(name),
        }
    }
}

impl Target {
    /// Position of the target in the sorted migrations, `None` meaning
    /// "before the first migration".
    pub fn resolve(&self, migrations: &Migrations) -> MigrateResult<Option<usize>> {
        match self {
            Target::Initial => Ok(None),
            Target::Latest => Ok(migrations.len().checked_sub(1)),
            Target::Named(name) => migrations
                .position(name)
                .map(Some)
                .ok_or_else(|| MigrateError::InvalidTarget(name.clone())),
        }
    }
}

/// Check that the applied set is consistent with the migration files.
///
/// Every applied name must belong to a migration, and applied migrations
/// must form a contiguous prefix of the sorted sequence.
pub fn check_applied_state(
    migrations: &Migrations,
    forward_migrated: &BTreeSet<String>,
) -> MigrateResult<()> {
    // Only canonical names count; an ID or filename alias in the table is an orphan.
    let is_canonical = |name: &str| {
        migrations
            .position(name)
            .and_then(|position| migrations.get(position))
            .is_some_and(|migration| migration.name() == name)
    };
    if let Some(orphan) = forward_migrated.iter().find(|name| !is_canonical(name)) {
        return Err(MigrateError::AppliedWithoutFile(orphan.clone()));
    }

    let mut seen_unapplied = false;
    for migration in migrations {
        let applied = forward_migrated.contains(migration.name());
        if applied && seen_unapplied {
            return Err(MigrateError::UnappliedBeforeApplied(
                migration.forward.filename.clone(),
            ));
        }
        seen_unapplied |= !applied;
    }

    Ok(())
}

/// Compute the ordered steps that reach `target`.
///
/// An empty plan means the database is already at the target.
pub fn create_plan<'m>(
    target: &Target,
    migrations: &'m Migrations,
    forward_migrated: &BTreeSet<String>,
) -> MigrateResult<Vec<&'m Step>> {
    check_applied_state(migrations, forward_migrated)?;

    let target_position = target.resolve(migrations)?;
    // Migrations below the boundary are forward-migrated, the rest reverted.
    let boundary = target_position.map_or(0, |position| position + 1);
    let sorted = migrations.sorted();

    let mut steps = Vec::new();

    for migration in sorted[boundary..].iter().rev() {
        if !forward_migrated.contains(migration.name()) {
            continue;
        }
        let backward = migration
            .backward
            .as_ref()
            .ok_or_else(|| MigrateError::NoBackwardStep(migration.forward.filename.clone()))?;
        steps.push(backward);
    }

    for migration in &sorted[..boundary] {
        if !forward_migrated.contains(migration.name()) {
            steps.push(&migration.forward);
        }
    }

    tracing::debug!(%target, ?target_position, steps = steps.len(), "created migration plan");
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilenameConfig;

    fn test_config() -> FilenameConfig {
        FilenameConfig::new(".fw", ".bw", ".nt", ".sql")
    }

    fn load(files: &[&str]) -> Migrations {
        Migrations::load(files, &test_config()).unwrap()
    }

    fn applied(ms: &Migrations, count: usize) -> BTreeSet<String> {
        ms.iter().take(count).map(|m| m.name().to_string()).collect()
    }

    fn plan(target: &str, ms: &Migrations, forward_migrated: &BTreeSet<String>) -> MigrateResult<Vec<String>> {
        create_plan(&Target::from(target), ms, forward_migrated)
            .map(|steps| steps.iter().map(|s| s.to_string()).collect())
    }

    fn reversible_set() -> Migrations {
        load(&[
            "00001_initial.fw.sql",
            "00001_initial.bw.sql",
            "00002.fw.sql",
            "00002.bw.sql",
            "00003_woof.fw.sql",
            "00003_woof.bw.sql",
        ])
    }

    #[test]
    fn test_no_migrations() {
        let ms = load(&[]);
        let none = BTreeSet::new();
        assert_eq!(plan("initial", &ms, &none).unwrap(), Vec::<String>::new());
        assert_eq!(plan("latest", &ms, &none).unwrap(), Vec::<String>::new());

        for target in ["0", "023", "woof"] {
            assert_eq!(
                plan(target, &ms, &none).unwrap_err().to_string(),
                format!("invalid target migration - {target:?}")
            );
        }
    }

    #[test]
    fn test_forward_from_nothing_applied() {
        let ms = reversible_set();
        let none = BTreeSet::new();

        let first = vec!["forward-migrate 00001_initial.fw.sql".to_string()];
        for target in ["1", "00001", "0001_initial", "00001_initial.fw.sql"] {
            assert_eq!(plan(target, &ms, &none).unwrap(), first, "target {target}");
        }

        assert_eq!(
            plan("2", &ms, &none).unwrap(),
            ["forward-migrate 00001_initial.fw.sql", "forward-migrate 00002.fw.sql"]
        );

        let all = [
            "forward-migrate 00001_initial.fw.sql",
            "forward-migrate 00002.fw.sql",
            "forward-migrate 00003_woof.fw.sql",
        ];
        assert_eq!(plan("00003", &ms, &none).unwrap(), all);
        assert_eq!(plan("latest", &ms, &none).unwrap(), all);
        assert!(plan("initial", &ms, &none).unwrap().is_empty());
    }

    #[test]
    fn test_partially_applied() {
        let ms = reversible_set();
        let one = applied(&ms, 1);

        assert_eq!(
            plan("initial", &ms, &one).unwrap(),
            ["backward-migrate 00001_initial.bw.sql"]
        );
        assert!(plan("1", &ms, &one).unwrap().is_empty());
        assert_eq!(
            plan("latest", &ms, &one).unwrap(),
            ["forward-migrate 00002.fw.sql", "forward-migrate 00003_woof.fw.sql"]
        );

        let two = applied(&ms, 2);
        assert_eq!(
            plan("0001_initial", &ms, &two).unwrap(),
            ["backward-migrate 00002.bw.sql"]
        );
        assert_eq!(
            plan("3", &ms, &two).unwrap(),
            ["forward-migrate 00003_woof.fw.sql"]
        );
    }

    #[test]
    fn test_fully_applied_back_to_initial() {
        let ms = load(&["1.fw.sql", "1.bw.sql", "2_users.fw.sql", "2_users.bw.sql"]);
        let all = applied(&ms, 2);

        assert_eq!(
            plan("initial", &ms, &all).unwrap(),
            ["backward-migrate 2_users.bw.sql", "backward-migrate 1.bw.sql"]
        );
    }

    #[test]
    fn test_reaching_current_state_is_a_no_op() {
        let ms = reversible_set();
        for count in 0..=ms.len() {
            let state = applied(&ms, count);
            let targets: Vec<String> = match count {
                0 => vec!["initial".into()],
                n => {
                    let m = &ms.sorted()[n - 1];
                    let mut t = vec![
                        m.id().to_string(),
                        m.forward.parsed.id_str.clone(),
                        m.name().to_string(),
                        m.forward.filename.clone(),
                    ];
                    if n == ms.len() {
                        t.push("latest".into());
                    }
                    t
                }
            };
            for target in targets {
                assert!(plan(&target, &ms, &state).unwrap().is_empty(), "{count} applied, target {target}");
            }
        }
    }

    #[test]
    fn test_up_then_down_is_symmetric() {
        let ms = reversible_set();
        for target in ["1", "2", "3"] {
            let up = create_plan(&Target::from(target), &ms, &BTreeSet::new()).unwrap();
            let now_applied: BTreeSet<String> =
                up.iter().map(|s| s.migration_name.clone()).collect();

            let down = create_plan(&Target::Initial, &ms, &now_applied).unwrap();
            let up_names: Vec<&str> = up.iter().rev().map(|s| s.migration_name.as_str()).collect();
            let down_names: Vec<&str> = down.iter().map(|s| s.migration_name.as_str()).collect();
            assert_eq!(up_names, down_names);
            assert!(down.iter().all(|s| s.direction() == crate::Direction::Backward));
        }
    }

    #[test]
    fn test_some_migrations_have_no_backward_step() {
        let ms = load(&[
            "001_initial.fw.sql",
            "001_initial.bw.sql",
            "002.fw.sql",
            "003.fw.sql",
            "004_woof.fw.sql",
            "004_woof.bw.sql",
        ]);

        let four = applied(&ms, 4);
        assert_eq!(
            plan("003", &ms, &four).unwrap(),
            ["backward-migrate 004_woof.bw.sql"]
        );
        assert_eq!(
            plan("2", &ms, &four).unwrap_err().to_string(),
            r#"migration "003.fw.sql" doesn't have a backward step"#
        );

        let one = applied(&ms, 1);
        assert_eq!(
            plan("initial", &ms, &one).unwrap(),
            ["backward-migrate 001_initial.bw.sql"]
        );
    }

    #[test]
    fn test_no_backward_step_for_applied_migration() {
        let ms = load(&["001.fw.sql", "002_users.fw.sql"]);
        let all = applied(&ms, 2);
        assert_eq!(
            plan("initial", &ms, &all).unwrap_err().to_string(),
            r#"migration "002_users.fw.sql" doesn't have a backward step"#
        );
    }

    #[test]
    fn test_unapplied_migration_gap() {
        let ms = load(&[
            "001.fw.sql", "001.bw.sql", "002.fw.sql", "002.bw.sql",
            "003.fw.sql", "003.bw.sql", "004.fw.sql", "004.bw.sql",
        ]);
        let state: BTreeSet<String> = ["0001", "0003"].iter().map(|s| s.to_string()).collect();

        for target in ["initial", "latest", "2"] {
            assert_eq!(
                plan(target, &ms, &state).unwrap_err().to_string(),
                r#"there is at least one unapplied migration before applied migration "003.fw.sql" (examine it with the status command and fix it manually)"#
            );
        }
    }

    #[test]
    fn test_invalid_target() {
        let ms = reversible_set();
        assert!(matches!(
            plan("9", &ms, &BTreeSet::new()),
            Err(MigrateError::InvalidTarget(t)) if t == "9"
        ));
    }

    #[test]
    fn test_applied_entry_without_file() {
        let ms = load(&["001.fw.sql", "001.bw.sql"]);
        let state: BTreeSet<String> = ["0001", "0002_missing"].iter().map(|s| s.to_string()).collect();

        for target in ["initial", "latest", "1"] {
            assert_eq!(
                plan(target, &ms, &state).unwrap_err().to_string(),
                r#"there is at least one entry in the migrations table without an existing migration file (examine it with the status command and fix it manually) - entry="0002_missing""#
            );
        }
    }

    #[test]
    fn test_applied_entry_matching_only_an_alias_is_orphaned() {
        let ms = load(&["001.fw.sql"]);
        let state: BTreeSet<String> = ["1".to_string()].into_iter().collect();
        assert!(matches!(
            check_applied_state(&ms, &state),
            Err(MigrateError::AppliedWithoutFile(name)) if name == "1"
        ));
    }
}
