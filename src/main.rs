use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use market_watch::config::{Config, EnvConfig};
use market_watch::data::catalog::ItemCatalog;
use market_watch::data::icons::IconClient;
use market_watch::data::steam_api::SteamMarketClient;
use market_watch::monitoring::logger::CsvLogger;
use market_watch::notify::{Announcer, CommandHandler, Dispatcher, MessageFormatter, NotifySink, WebhookSink};
use market_watch::storage::open_store;
use market_watch::tracking::differ::DiffOptions;
use market_watch::tracking::poller::{Poller, PollerSettings};

#[derive(Parser)]
#[command(name = "market-watch", about = "Steam Community Market listing monitor")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the market and announce new listings (default)
    Watch,
    /// Search the item catalog
    Search { query: String },
    /// Price overview plus highest buy order for one item
    Price { item: String },
    /// Highest buy order for one item
    BuyOrder { item: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Missing config file is fine; every section has defaults
    let mut config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", cli.config);
        Config::default()
    };
    let env_config = EnvConfig::load()?;
    config.apply_env(&env_config);

    let client = Arc::new(SteamMarketClient::new(
        &config.market,
        &config.lookup,
        env_config.steam_cookie.clone(),
    )?);

    let formatter = MessageFormatter::new(
        config.market.base_url.clone(),
        config.market.app_id,
        config.notify.max_message_len,
    );

    let event_log = if config.monitoring.csv_logging {
        Some(Arc::new(CsvLogger::new(&config.monitoring.csv_log_path)?))
    } else {
        None
    };

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch_market(&config, &env_config, client, formatter, event_log).await,
        Command::Search { query } => {
            let handler = command_handler(&config, client, formatter, event_log);
            println!("{}", handler.search(&query).await);
            Ok(())
        }
        Command::Price { item } => {
            let handler = command_handler(&config, client, formatter, event_log);
            println!("{}", handler.price(&item).await);
            Ok(())
        }
        Command::BuyOrder { item } => {
            let handler = command_handler(&config, client, formatter, event_log);
            println!("{}", handler.buy_order(&item).await);
            Ok(())
        }
    }
}

fn command_handler(
    config: &Config,
    client: Arc<SteamMarketClient>,
    formatter: MessageFormatter,
    event_log: Option<Arc<CsvLogger>>,
) -> CommandHandler<SteamMarketClient> {
    let handler = CommandHandler::new(
        client,
        ItemCatalog::load(&config.commands.catalog_path),
        formatter,
        config.commands.search_limit,
        Duration::from_secs(config.commands.price_cache_ttl_secs),
    )
    .with_icons(IconClient::new(config.commands.icon_base_url.clone()));

    match event_log {
        Some(logger) => handler.with_event_log(logger),
        None => handler,
    }
}

async fn watch_market(
    config: &Config,
    env_config: &EnvConfig,
    client: Arc<SteamMarketClient>,
    formatter: MessageFormatter,
    event_log: Option<Arc<CsvLogger>>,
) -> Result<()> {
    tracing::info!("🚀 Market monitor starting for AppID {}", config.market.app_id);
    tracing::info!("Storage: {:?} at {}", config.storage.backend, config.storage.path());

    let store = open_store(&config.storage)?;

    let sink = match &env_config.discord_webhook_url {
        Some(url) => NotifySink::Webhook(WebhookSink::new(url.clone())?),
        None => {
            tracing::warn!("DISCORD_WEBHOOK_URL not set, notifications go to the log only");
            NotifySink::Log
        }
    };
    let dispatcher = Arc::new(Dispatcher::new(sink));
    dispatcher.mark_ready().await;

    let mut announcer = Announcer::new(formatter, dispatcher, config.polling.recent_count);
    if let Some(logger) = event_log {
        announcer = announcer.with_event_log(logger);
    }

    let settings = PollerSettings {
        interval: Duration::from_secs(config.polling.interval_secs),
        diff: DiffOptions {
            price_change_threshold: config.diff.price_change_threshold,
        },
        announce_on_start: config.polling.announce_on_start,
    };
    let mut poller = Poller::new(client, store, Arc::new(announcer), settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    poller.run(shutdown_rx).await;
    Ok(())
}
