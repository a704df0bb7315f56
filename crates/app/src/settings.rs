//! Handles settings for the importer.
//!
//! Sources, later ones winning: the TOML file (`config/importer.toml` unless
//! `--config` says otherwise), `LEDGER_IMPORTER__*` environment variables,
//! then command-line overrides.

use clap::{Args, Parser, Subcommand};
use config::{ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/importer.toml";

#[derive(Parser, Debug)]
#[command(name = "ledger_importer")]
#[command(about = "Imports ledger transaction feeds into SQL warehouse tables")]
pub struct Cli {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Override the database connection string.
    #[arg(long, global = true)]
    pub database_url: Option<String>,
    /// Override the ledger base URL.
    #[arg(long, global = true)]
    pub ledger_url: Option<String>,
    /// Override the log level.
    #[arg(long, global = true)]
    pub level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile the optional column document, then import every feed until Ctrl-C.
    Run(RunArgs),
    /// Reconcile the tables with a column document and exit.
    Migrate(MigrateArgs),
    /// Print the DDL of the data tables.
    Schema,
    /// Print the persisted custom columns as a JSON document.
    Columns,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON document of custom column declarations.
    #[arg(long)]
    pub columns: Option<String>,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// JSON document of custom column declarations.
    #[arg(long)]
    pub columns: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    8
}

fn default_connect_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct Ledger {
    pub base_url: String,
    /// `user:secret`, sent as basic auth.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_long_poll")]
    pub long_poll_timeout_ms: u64,
}

fn default_long_poll() -> u64 {
    60_000
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Feed {
    pub alias: String,
    #[serde(default)]
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub database: Database,
    pub ledger: Option<Ledger>,
    #[serde(default)]
    pub backoff: Backoff,
    #[serde(default)]
    pub feeds: Vec<Feed>,
    /// Column document applied by `run` when `--columns` is not given.
    pub columns: Option<String>,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let mut builder = config::Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("LEDGER_IMPORTER").separator("__"));

        if let Some(url) = &cli.database_url {
            builder = builder.set_override("database.url", url.as_str())?;
        }
        if let Some(url) = &cli.ledger_url {
            builder = builder.set_override("ledger.base_url", url.as_str())?;
        }
        if let Some(level) = &cli.level {
            builder = builder.set_override("app.level", level.as_str())?;
        }

        builder.build()?.try_deserialize()
    }
}
