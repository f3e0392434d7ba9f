//! Migration model and loader
//!
//! Groups parsed filenames into forward/backward pairs, checks the set-level
//! invariants (unique IDs, a contiguous run starting at 1, a forward step for
//! every migration, matching descriptions) and indexes every accepted target
//! expression.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use crate::config::FilenameConfig;
use crate::error::{MigrateError, MigrateResult};
use crate::filename::{parse_filename, Direction, ParsedFilename};
use crate::store::DirectoryLister;

/// One executable half of a migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub filename: String,
    /// Canonical name; empty until the step's migration has been indexed.
    pub migration_name: String,
    pub parsed: ParsedFilename,
}

impl Step {
    pub fn new(filename: impl Into<String>, parsed: ParsedFilename) -> Self {
        Self {
            filename: filename.into(),
            migration_name: String::new(),
            parsed,
        }
    }

    /// Parse `filename` and wrap it in an unindexed step.
    pub fn parse(filename: &str, config: &FilenameConfig) -> MigrateResult<Self> {
        let parsed =
            parse_filename(filename, config).map_err(|source| MigrateError::InvalidFilename {
                filename: filename.to_string(),
                source,
            })?;
        Ok(Self::new(filename, parsed))
    }

    pub fn direction(&self) -> Direction {
        self.parsed.direction
    }

    pub fn no_tx(&self) -> bool {
        self.parsed.no_tx
    }
}

// Scraped by tooling; keep the format stable.
impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parsed.direction {
            Direction::Forward => write!(f, "forward-migrate {}", self.filename)?,
            Direction::Backward => write!(f, "backward-migrate {}", self.filename)?,
        }
        if self.parsed.no_tx {
            write!(f, " [no-transaction]")?;
        }
        Ok(())
    }
}

/// The files found for one migration ID, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationFiles {
    pub forward: Option<Step>,
    pub backward: Option<Step>,
}

impl MigrationFiles {
    /// Put `step` into its direction's slot.
    pub fn insert(&mut self, step: Step) -> MigrateResult<()> {
        let slot = match step.direction() {
            Direction::Forward => &mut self.forward,
            Direction::Backward => &mut self.backward,
        };

        if let Some(existing) = slot {
            return Err(MigrateError::DuplicateMigration {
                direction: step.direction(),
                id: step.parsed.id,
                existing: existing.filename.clone(),
                duplicate: step.filename,
            });
        }

        *slot = Some(step);
        Ok(())
    }
}

/// A validated migration: a forward step and an optional backward step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub forward: Step,
    pub backward: Option<Step>,
}

impl Migration {
    pub fn id(&self) -> u64 {
        self.forward.parsed.id
    }

    /// Canonical name stored in the migrations table
    pub fn name(&self) -> &str {
        &self.forward.migration_name
    }

    pub fn is_reversible(&self) -> bool {
        self.backward.is_some()
    }
}

/// Canonical name: the ID zero-padded to four digits followed by the description.
pub fn migration_name(id: u64, description: &str) -> String {
    format!("{:04}{}", id, description)
}

/// The validated, sorted and indexed migration set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Migrations {
    sorted: Vec<Migration>,
    names: HashMap<String, usize>,
}

impl Migrations {
    /// Parse and group `filenames`, then validate and index the result.
    pub fn load<I, S>(filenames: I, config: &FilenameConfig) -> MigrateResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_id: BTreeMap<u64, MigrationFiles> = BTreeMap::new();

        for filename in filenames {
            let step = Step::parse(filename.as_ref(), config)?;
            by_id.entry(step.parsed.id).or_default().insert(step)?;
        }

        Self::from_files(by_id)
    }

    /// List `dir` and load every file in it.
    pub fn load_dir(
        dir: &Path,
        config: &FilenameConfig,
        lister: &dyn DirectoryLister,
    ) -> MigrateResult<Self> {
        let entries = lister.list_files(dir).map_err(|source| MigrateError::ListDir {
            dir: dir.to_path_buf(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), files = entries.len(), "listed migrations directory");

        Self::load(entries, config)
    }

    /// Validate and index migrations grouped by ID.
    pub fn from_files(by_id: BTreeMap<u64, MigrationFiles>) -> MigrateResult<Self> {
        let mut sorted = Vec::with_capacity(by_id.len());

        // BTreeMap iteration yields ascending IDs.
        for (_, files) in by_id {
            let Some(mut forward) = files.forward else {
                let backward = files
                    .backward
                    .map(|step| step.filename)
                    .unwrap_or_default();
                return Err(MigrateError::MigrationWithoutForwardStep(backward));
            };

            let name = migration_name(forward.parsed.id, &forward.parsed.description);
            forward.migration_name = name.clone();

            let backward = match files.backward {
                Some(mut backward) => {
                    if backward.parsed.description != forward.parsed.description {
                        return Err(MigrateError::DescriptionMismatch {
                            forward_file: forward.filename,
                            backward_file: backward.filename,
                            forward_description: forward.parsed.description,
                            backward_description: backward.parsed.description,
                        });
                    }
                    backward.migration_name = name;
                    Some(backward)
                }
                None => None,
            };

            sorted.push(Migration { forward, backward });
        }

        let mut names = HashMap::with_capacity(sorted.len() * 4);
        for (position, migration) in sorted.iter().enumerate() {
            let forward = &migration.forward;
            names.insert(forward.parsed.id.to_string(), position);
            names.insert(forward.parsed.id_str.clone(), position);
            names.insert(forward.migration_name.clone(), position);
            names.insert(forward.filename.clone(), position);
        }

        if let Some(first) = sorted.first() {
            if first.id() != 1 {
                return Err(MigrateError::FirstIdNotOne(first.id()));
            }
        }
        for pair in sorted.windows(2) {
            let expected = pair[0].id() + 1;
            if pair[1].id() != expected {
                return Err(MigrateError::IdGap(expected));
            }
        }

        tracing::debug!(migrations = sorted.len(), "indexed migrations");
        Ok(Self { sorted, names })
    }

    /// Migrations in ascending ID order
    pub fn sorted(&self) -> &[Migration] {
        &self.sorted
    }

    /// Every accepted target expression mapped to its position in [`Migrations::sorted`]
    pub fn names(&self) -> &HashMap<String, usize> {
        &self.names
    }

    /// Position of the migration a bare ID, padded ID, canonical name or
    /// forward filename refers to.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn get(&self, position: usize) -> Option<&Migration> {
        self.sorted.get(position)
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.sorted.iter()
    }
}

impl<'a> IntoIterator for &'a Migrations {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.sorted.iter()
    }
}
