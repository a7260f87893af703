//! # Command Line Interface
//!
//! Administrative commands for managing tenant config records and the tables
//! that hold them.

use crate::config::{load_config, Settings, StoreSettings};
use crate::errors::{BudError, Misconfiguration};
use crate::overrides::ServiceKind;
use crate::services::AesGcmEncrypter;
use crate::storage::{create_pool, SqlConfigTable};
use crate::stores::{database, ConfigMap, ConfigStoreManager, StoreEnvironment};
use crate::tenancy::{BasicTenancy, BasicTenant};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::collections::BTreeMap;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bud")]
#[command(about = "Bud tenant config store administration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "bud.toml")]
    pub config: String,

    /// Config store to use instead of the default
    #[arg(short, long)]
    pub store: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a tenant's config record
    Get {
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Store a tenant's config record, replacing any existing one
    Set {
        #[command(flatten)]
        record: RecordArgs,

        /// Config as a JSON object
        config: String,
    },

    /// Remove a tenant's config record
    Forget {
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Create the tables used by database config stores
    Migrate {
        /// Dry run - show which tables would be created
        #[arg(long)]
        dry_run: bool,
    },

    /// Encryption key management
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Generate a new base64-encoded encryption key
    Generate,
}

/// Identifies a single config record
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Tenancy name
    #[arg(long)]
    pub tenancy: String,

    /// Tenant identifier
    #[arg(long)]
    pub tenant: String,

    /// Service the config is for
    pub service: ServiceKind,

    /// Name of the service instance
    pub name: String,
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }

    let settings = load_config(&cli.config)?;
    crate::observability::init_logging(&settings.logging)?;

    match cli.command {
        Commands::Get { record } => {
            let manager = store_manager(&settings).await?;
            let (tenancy, tenant) = record.tenant();
            let store = manager.get(cli.store.as_deref())?;

            match store.get(&tenancy, &tenant, record.service.as_str(), &record.name).await? {
                Some(config) => println!("{}", serde_json::to_string_pretty(&config)?),
                None => {
                    eprintln!(
                        "No {} config for [{}] for tenant [{}] on tenancy [{}]",
                        record.service, record.name, record.tenant, record.tenancy
                    );
                    process::exit(1);
                }
            }
        }

        Commands::Set { record, config } => {
            let config = parse_config(&config)?;
            let manager = store_manager(&settings).await?;
            let (tenancy, tenant) = record.tenant();
            let store = manager.get(cli.store.as_deref())?;

            store.set(&tenancy, &tenant, record.service.as_str(), &record.name, &config).await?;
            println!("Stored {} config for [{}] in store [{}]", record.service, record.name, store.name());
        }

        Commands::Forget { record } => {
            let manager = store_manager(&settings).await?;
            let (tenancy, tenant) = record.tenant();
            let store = manager.get(cli.store.as_deref())?;

            if store.forget(&tenancy, &tenant, record.service.as_str(), &record.name).await? {
                println!("Removed {} config for [{}]", record.service, record.name);
            } else {
                println!("No {} config for [{}] to remove", record.service, record.name);
            }
        }

        Commands::Migrate { dry_run } => {
            handle_migrate(&settings, dry_run).await?;
        }

        Commands::Key { command: KeyCommands::Generate } => {
            println!("{}", AesGcmEncrypter::generate_key()?);
        }
    }

    Ok(())
}

impl RecordArgs {
    fn tenant(&self) -> (BasicTenancy, BasicTenant) {
        let tenant = BasicTenant::new(self.tenant.clone());
        (BasicTenancy::with_tenant(self.tenancy.clone(), Arc::new(tenant.clone())), tenant)
    }
}

async fn store_manager(settings: &Settings) -> anyhow::Result<ConfigStoreManager> {
    let env = StoreEnvironment::from_settings(settings).await?;
    Ok(ConfigStoreManager::new(settings.stores_settings(), env))
}

/// Parse a JSON object given on the command line
fn parse_config(raw: &str) -> anyhow::Result<ConfigMap> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(config) => Ok(config),
        _ => anyhow::bail!("Config must be a JSON object"),
    }
}

/// Tables needed by each connection, from every store using the database
/// driver
fn database_tables(settings: &Settings) -> Result<BTreeMap<String, Vec<String>>, BudError> {
    let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, store) in &settings.stores {
        if store_driver(name, store) != database::DRIVER {
            continue;
        }

        let table = store
            .option_str("table")
            .ok_or_else(|| Misconfiguration::missing_value(name, "table"))?;
        let connection =
            store.option_str("connection").unwrap_or(database::DEFAULT_CONNECTION).to_string();

        let entry = tables.entry(connection).or_default();
        if !entry.iter().any(|t| t == table) {
            entry.push(table.to_string());
        }
    }

    Ok(tables)
}

fn store_driver<'a>(name: &'a str, store: &'a StoreSettings) -> &'a str {
    store.driver.as_deref().filter(|driver| !driver.is_empty()).unwrap_or(name)
}

/// Ensure the tables of every database store exist
async fn handle_migrate(settings: &Settings, dry_run: bool) -> anyhow::Result<()> {
    let tables = database_tables(settings)?;

    if tables.is_empty() {
        println!("No database config stores are configured");
        return Ok(());
    }

    for (connection, names) in &tables {
        let connection_settings = settings.connections.get(connection).ok_or_else(|| {
            BudError::config(format!("Connection [{}] is not configured", connection))
        })?;

        if dry_run {
            for table in names {
                println!("Would ensure table [{}] on connection [{}]", table, connection);
            }
            continue;
        }

        let source = SqlConfigTable::new(create_pool(connection_settings).await?);
        for table in names {
            source.ensure_table(table).await?;
            println!("Ensured table [{}] on connection [{}]", table, connection);
        }
    }

    Ok(())
}
