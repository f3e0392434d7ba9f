use std::env::consts::{ARCH, OS};
use std::io::{self, Write};

use stepmigrate_drivers::DriverRegistry;

/// Set at compile time through the environment of `cargo build`.
const BUILD_DATE: Option<&str> = option_env!("STEPMIGRATE_BUILD_DATE");
const GIT_HASH: Option<&str> = option_env!("STEPMIGRATE_GIT_HASH");

pub fn run(registry: &DriverRegistry, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "version     : {}", stepmigrate_core::VERSION)?;
    if let Some(date) = BUILD_DATE.filter(|s| !s.is_empty()) {
        writeln!(out, "build date  : {}", date)?;
    }
    if let Some(hash) = GIT_HASH.filter(|s| !s.is_empty()) {
        writeln!(out, "git hash    : {}", hash)?;
    }
    writeln!(out, "platform    : {}/{}", OS, ARCH)?;
    writeln!(out, "db drivers  : {}", registry.names().join(", "))?;
    Ok(())
}
