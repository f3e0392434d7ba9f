//! Driver registry
//!
//! Built once at startup with the compiled-in drivers and handed to the
//! commands by reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use stepmigrate_core::Connection;

use crate::dsn;
use crate::error::{DriverError, DriverResult};

/// A SQL engine adapter
#[async_trait]
pub trait Driver: Send + Sync {
    /// Name used to select the driver (`--driver`)
    fn name(&self) -> &'static str;

    /// DSN URL schemes this driver accepts
    fn schemes(&self) -> &'static [&'static str];

    /// Connect to `dsn`, keeping migration state in `table`.
    async fn open(&self, dsn: &str, table: &str) -> DriverResult<Box<dyn Connection>>;
}

#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<&'static str, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every driver enabled at compile time.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver));
        #[cfg(feature = "mysql")]
        registry.register(Arc::new(crate::mysql::MySqlDriver));
        registry
    }

    /// Register `driver`, replacing any driver of the same name.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.name(), driver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    /// Registered driver names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.drivers.keys().copied().collect()
    }

    /// Name of the driver whose schemes include the scheme of `dsn`.
    pub fn detect_from_url(&self, dsn: &str) -> DriverResult<&'static str> {
        let undetectable = || DriverError::UndetectableDriver(dsn::redact(dsn));
        let scheme = dsn::scheme(dsn).ok_or_else(undetectable)?;

        self.drivers
            .values()
            .find(|driver| driver.schemes().contains(&scheme.as_str()))
            .map(|driver| driver.name())
            .ok_or_else(undetectable)
    }

    /// Open a connection with the driver called `name`, or the one detected
    /// from `dsn` when no name is given.
    pub async fn open(
        &self,
        name: Option<&str>,
        dsn: &str,
        table: &str,
    ) -> DriverResult<Box<dyn Connection>> {
        let name = match name {
            Some(name) => name,
            None => self.detect_from_url(dsn)?,
        };
        let driver = self.get(name).ok_or_else(|| DriverError::UnknownDriver {
            name: name.to_string(),
            available: self.names().join(", "),
        })?;

        tracing::debug!(driver = driver.name(), dsn = %dsn::redact(dsn), table, "opening connection");
        driver.open(dsn, table).await
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
