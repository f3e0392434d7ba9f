mod args;
mod commands;
mod logging;

use std::io::{self, Write};
use std::process;

use clap::{Parser, Subcommand};
use stepmigrate_core::MigrateError;
use stepmigrate_drivers::DriverRegistry;

use args::{DbArgs, DirArgs, StatusFormat, TargetArgs};
use commands::{goto, init, plan, status, version};

#[derive(Parser)]
#[command(name = "stepmigrate")]
#[command(version = stepmigrate_core::VERSION)]
#[command(about = "Versioned, reversible SQL schema migrations driven by filename conventions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the migrations table if it doesn't exist
    Init {
        #[command(flatten)]
        db: DbArgs,
    },

    /// Show which migrations have been applied
    Status {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        dir: DirArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: StatusFormat,
    },

    /// Print the steps goto would execute, without executing them
    Plan {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        dir: DirArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Migrate forward or backward to the target migration
    Goto {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        dir: DirArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print version and build information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match logging::LoggingConfig::from_env() {
        Ok(config) => {
            if let Err(err) = logging::init_logging(config) {
                eprintln!("Failed to initialize logging: {}", err);
            }
        }
        Err(err) => eprintln!("Invalid logging configuration: {}", err),
    }

    let registry = DriverRegistry::with_defaults();
    let mut out = io::stdout();

    let result = match &cli.command {
        Commands::Init { db } => init::run(db, &registry, &mut out).await,
        Commands::Status { db, dir, format } => {
            status::run(db, dir, *format, &registry, &mut out).await
        }
        Commands::Plan { db, dir, target } => plan::run(db, dir, target, &registry, &mut out).await,
        Commands::Goto { db, dir, target } => goto::run(db, dir, target, &registry, &mut out).await,
        Commands::Version => version::run(&registry, &mut out).map_err(Into::into),
    };

    if let Err(err) = &result {
        if report_interrupt(err, &mut io::stderr()) {
            process::exit(1);
        }
    }
    result
}

/// Print the signal that stopped a goto run. Returns false for other errors.
fn report_interrupt(err: &anyhow::Error, diag: &mut dyn Write) -> bool {
    match err.downcast_ref::<MigrateError>() {
        Some(interrupted @ MigrateError::Interrupted { .. }) => {
            let _ = writeln!(diag, "\n{}", interrupted);
            let _ = diag.flush();
            true
        }
        _ => false,
    }
}
