use std::{error::Error, sync::Arc, time::Duration};

use clap::Parser;
use importer::{FeedApi, HttpFeedClient, Importer, RetryPolicy, open_feed};
use sea_orm::{ConnectOptions, DatabaseConnection};
use tokio_util::sync::CancellationToken;
use warehouse::{Config, Table, Warehouse, store};

use settings::{Cli, Command, Settings};

mod settings;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger_importer={level},importer={level},warehouse={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let db = connect(&settings.database).await?;

    match cli.command {
        Command::Columns => {
            let config = store::load(&db).await?.unwrap_or_default();
            println!(
                "{}",
                serde_json::to_string_pretty(&config.to_declarations())?
            );
        }
        Command::Schema => {
            let warehouse = Warehouse::bootstrap(db).await?;
            let catalog = warehouse.catalog().await;
            for table in Table::ALL {
                println!("{};\n", catalog.schema(table).ddl_statement());
            }
        }
        Command::Migrate(args) => {
            let warehouse = Warehouse::bootstrap(db).await?;
            reconcile(&warehouse, &args.columns).await?;
        }
        Command::Run(args) => {
            let warehouse = Warehouse::bootstrap(db).await?;
            if let Some(path) = args.columns.as_ref().or(settings.columns.as_ref()) {
                reconcile(&warehouse, path).await?;
            }
            run(&settings, Arc::new(warehouse)).await?;
        }
    }

    Ok(())
}

async fn connect(config: &settings::Database) -> Result<DatabaseConnection, BoxError> {
    if config.url.trim().is_empty() {
        return Err("database.url is empty".into());
    }
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .test_before_acquire(true);

    let database = sea_orm::Database::connect(options).await?;
    Ok(database)
}

async fn reconcile(warehouse: &Warehouse, path: &str) -> Result<(), BoxError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let desired = Config::from_json(&raw)?;
    let migration = warehouse.reconcile(desired).await?;
    if migration.is_empty() {
        tracing::info!(columns = path, "schema already matches column document");
    }
    Ok(())
}

async fn run(settings: &Settings, warehouse: Arc<Warehouse>) -> Result<(), BoxError> {
    let ledger = settings
        .ledger
        .as_ref()
        .ok_or("missing [ledger] settings")?;
    if settings.feeds.is_empty() {
        return Err("no [[feeds]] configured".into());
    }

    let client: Arc<dyn FeedApi> = Arc::new(HttpFeedClient::new(
        &ledger.base_url,
        ledger.access_token.as_deref(),
    )?);
    let retry = RetryPolicy::new(settings.backoff.initial_ms, settings.backoff.max_ms);
    let long_poll = Duration::from_millis(ledger.long_poll_timeout_ms);

    let token = CancellationToken::new();
    let mut tasks = tokio::task::JoinSet::new();
    for feed in &settings.feeds {
        let current = open_feed(client.as_ref(), &feed.alias, &feed.filter).await?;
        let mut importer = Importer::new(client.clone(), warehouse.clone(), current)
            .with_long_poll(long_poll)
            .with_retry(retry);
        let token = token.clone();
        tasks.spawn(async move { importer.run(token).await });
    }
    tracing::info!(feeds = settings.feeds.len(), "importing");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down");
        }
        _ = tasks.join_next() => {
            tracing::error!("an importer stopped unexpectedly, shutting down");
        }
    }
    token.cancel();

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            tracing::error!("importer task failed: {err}");
        }
    }
    Ok(())
}
