use std::sync::Arc;

use anyhow::Error;
use teloxide::dptree;
use teloxide::prelude::*;

use crate::admins::AdminRegistry;
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::database::DatabasePool;
use crate::gate::SubscriptionGate;
use crate::handlers::{callback_handler, text_handler, TelegramChannel};
use crate::registry::{RegistryStore, SqliteRegistry};
use crate::router::{Router, RouterSettings};

mod admins;
mod commands;
mod config;
mod conversation;
mod database;
mod gate;
mod handlers;
mod registry;
mod router;

fn init_logging() -> Result<(), Error> {
    use log::LevelFilter;
    use std::env;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::Mutex;

    let console_level = match env::var("CONSOLE_LOG_LEVEL")
        .unwrap_or_else(|_| "INFO".to_string())
        .to_uppercase()
        .as_str()
    {
        "ERROR" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    let file_level_config = match env::var("FILE_LOG_LEVEL")
        .unwrap_or_else(|_| "OFF".to_string())
        .to_uppercase()
        .as_str()
    {
        "ERROR" => Some(LevelFilter::Error),
        "ALL" | "INFO" => Some(LevelFilter::Info),
        _ => None,
    };

    // The logger must let through the most verbose of the two sinks.
    let max_level = std::cmp::max(console_level, file_level_config.unwrap_or(LevelFilter::Off));

    let log_file = if file_level_config.is_some() {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open("bot_errors.log")?;
        Some(Arc::new(Mutex::new(file)))
    } else {
        None
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .filter(None, max_level)
        .format(move |buf, record| {
            let formatted_record = format!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            );

            if record.level() <= console_level {
                writeln!(buf, "{}", formatted_record)?;
            }

            if let (Some(file_level), Some(file_handle)) = (file_level_config, &log_file) {
                if record.level() <= file_level {
                    if let Ok(mut guard) = file_handle.lock() {
                        let _ = writeln!(guard, "{}", formatted_record);
                    }
                }
            }
            Ok(())
        })
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Logging reads its levels from the environment, so .env goes first.
    let dotenv_loaded = dotenv::dotenv();
    init_logging()?;
    if let Err(e) = dotenv_loaded {
        log::debug!("No .env file loaded: {}", e);
    }

    log::info!("Starting code gate bot...");
    let start_time = std::time::Instant::now();

    if let Err(e) = config::load_environment() {
        log::error!("Failed to load environment: {}", e);
        return Err(e);
    }
    let config = Config::from_env()?;

    if let Err(e) = database::init_database(&config.database_path) {
        log::error!("Failed to initialize the database: {}", e);
        return Err(e.into());
    }

    let db_pool = Arc::new(DatabasePool::new(
        config.database_path.clone(),
        3 // Maximum 3 simultaneous database connections
    ));
    log::info!("Database initialized at {:?}", db_pool.path());
    let registry: Arc<dyn RegistryStore> = Arc::new(SqliteRegistry::new(db_pool));

    let bot = Bot::new(config.bot_token.clone());
    let me = bot.get_me().await?;
    log::info!("Authorized as @{}", me.username());

    let admins = Arc::new(AdminRegistry::new(config.admin_ids.iter().copied()));
    log::info!("Admins: {:?}", admins.list().await);

    let gate = Arc::new(SubscriptionGate::new(
        Arc::new(TelegramChannel::new(bot.clone())),
        config.channel.clone(),
        config.subscription_timeout,
    ));
    log::info!("Subscription required for {}", gate.channel());

    let router = Arc::new(Router::new(
        registry,
        admins,
        gate,
        Arc::new(ConversationStore::new()),
        RouterSettings {
            bot_username: me.username().to_string(),
            advertise_contact: config.advertise_contact.clone(),
            sponsor_card: config.sponsor_card.clone(),
            link_domain: config.link_domain.clone(),
        },
    ));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(text_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    log::info!("Bot initialization completed in {:.2?}", start_time.elapsed());
    log::info!("Starting to dispatch updates...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot shutdown complete");
    Ok(())
}
