mod banner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use logbook_common::{Error, Result};
use logbook_config::ConfigLoader;
use logbook_db::{
    BackupManager, ConnectionManager, ConnectionRegistry, DatabaseSettings, InitMethod,
    MigrationManager,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "logbook", version)]
#[command(about = "Schema migrations and backups for the logbook database")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to <data_dir>/config.yml
    #[arg(long, global = true, env = "LOGBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the database, bootstrapping or migrating it as needed
    Init,
    /// Apply pending migrations
    Migrate,
    /// Show migration status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show every recorded migration attempt
    History,
    /// Manage database backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommands {
    /// Create a new backup
    Create {
        /// Tag stored in the backup file name
        #[arg(long, default_value = "manual")]
        reason: String,
    },
    /// List available backups
    List,
    /// Check that a backup file is a readable database
    Validate { path: PathBuf },
    /// Replace the live database with a backup
    Restore { path: PathBuf },
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Everything below is blocking SQLite and filesystem work.
    let outcome = tokio::task::spawn_blocking(move || run(cli))
        .await
        .context("command task panicked")
        .and_then(|r| r);

    if let Err(e) = outcome {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ConfigLoader::load(cli.config.as_deref()).context("failed to load config")?;
    let settings = config.database_settings();
    let registry = ConnectionRegistry::new();

    let result = dispatch(cli.command, &registry, &settings);
    if let Err(e) = registry.close_all() {
        error!("failed to close database: {e}");
    }
    Ok(result?)
}

fn dispatch(command: Commands, registry: &Arc<ConnectionRegistry>, settings: &DatabaseSettings) -> Result<()> {
    match command {
        Commands::Init => {
            let db = registry.get_or_create(&settings.path)?;
            match db.initialize_database(settings)? {
                Some(report) => {
                    match report.method {
                        InitMethod::Bootstrap => info!(
                            "bootstrapped new database ({} tables)",
                            report.tables_created.unwrap_or(0)
                        ),
                        InitMethod::Migrations => info!(
                            "existing database, {} migration(s) applied",
                            report.migrations_applied.unwrap_or(0)
                        ),
                    }
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                None => println!("database already initialized"),
            }
        }
        Commands::Migrate => {
            let db = connect(registry, settings)?;
            let report = MigrationManager::new(db, settings.clone()).run_migrations()?;
            if let Some(backup) = &report.backup {
                println!("backup: {}", backup.display());
            }
            if report.applied.is_empty() {
                println!("nothing to migrate ({} already applied)", report.already_applied);
            }
            for name in &report.applied {
                println!("applied {name}");
            }
        }
        Commands::Status { json } => {
            let db = connect(registry, settings)?;
            let status = MigrationManager::new(Arc::clone(&db), settings.clone()).get_migration_status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                let backups = BackupManager::new(db, settings.backup.clone())
                    .get_backup_list()
                    .map(|list| list.len())
                    .unwrap_or(0);
                banner::print_status_panel(settings, &status, backups);
            }
        }
        Commands::History => {
            let db = connect(registry, settings)?;
            let history = MigrationManager::new(db, settings.clone()).get_migration_history()?;
            if history.is_empty() {
                println!("No migrations recorded.");
            }
            for record in history {
                let outcome = if record.success { "ok" } else { "FAILED" };
                println!(
                    "{:<8} {:<6} {:>6}ms  {}  {}",
                    record.version,
                    outcome,
                    record.execution_time_ms,
                    record.applied_at.format("%Y-%m-%d %H:%M:%S"),
                    record.description
                );
                if let Some(message) = record.error_message {
                    println!("         {message}");
                }
            }
        }
        Commands::Backup { command } => run_backup(command, registry, settings)?,
    }
    Ok(())
}

fn run_backup(
    command: BackupCommands,
    registry: &Arc<ConnectionRegistry>,
    settings: &DatabaseSettings,
) -> Result<()> {
    match command {
        BackupCommands::Create { reason } => {
            let backups = BackupManager::new(connect(registry, settings)?, settings.backup.clone());
            let artifact = backups.create_backup(&reason)?;
            println!("Backup created");
            println!("  Path: {}", artifact.path.display());
            println!("  Size: {}", artifact.size_display());
        }
        BackupCommands::List => {
            let db = registry.get_or_create(&settings.path)?;
            let backups = BackupManager::new(db, settings.backup.clone()).get_backup_list()?;
            if backups.is_empty() {
                println!("No backups found.");
                return Ok(());
            }
            for backup in backups {
                println!(
                    "{}  {:>10}  {:<14}  {}",
                    backup.created_at.format("%Y-%m-%d %H:%M:%S"),
                    backup.size_display(),
                    backup.reason,
                    backup.file_name()
                );
            }
        }
        BackupCommands::Validate { path } => {
            let db = registry.get_or_create(&settings.path)?;
            if !BackupManager::new(db, settings.backup.clone()).validate_backup(&path) {
                return Err(Error::Backup(format!("{} is not a valid backup", path.display())));
            }
            println!("{} is valid", path.display());
        }
        BackupCommands::Restore { path } => {
            // Restoring over a missing database is allowed; there is nothing to open yet.
            let db = registry.get_or_create(&settings.path)?;
            if settings.path.exists() {
                db.connect(&settings.journal_mode)?;
            }
            BackupManager::new(db, settings.backup.clone()).restore_from_backup(&path)?;
            check_reopens(registry, settings, &path)?;
            println!("Restored {}", settings.path.display());
        }
    }
    Ok(())
}

/// Open an existing database. Creating one is left to `init`, which also
/// bootstraps the schema.
fn connect(registry: &Arc<ConnectionRegistry>, settings: &DatabaseSettings) -> Result<Arc<ConnectionManager>> {
    if !settings.path.is_file() {
        return Err(Error::NotFound(format!(
            "database {} does not exist; run `logbook init` first",
            settings.path.display()
        )));
    }
    let db = registry.get_or_create(&settings.path)?;
    db.connect(&settings.journal_mode)?;
    Ok(db)
}

/// The restore closed the live connection; make sure the new file opens.
fn check_reopens(registry: &Arc<ConnectionRegistry>, settings: &DatabaseSettings, source: &Path) -> Result<()> {
    let db = connect(registry, settings)?;
    db.get("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|e| {
            Error::Database(format!("restored database from {} does not open: {e}", source.display()))
        })?;
    Ok(())
}
