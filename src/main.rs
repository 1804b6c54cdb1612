use dotenvy::dotenv;
use referral_buddy::{
    bot::{self, BotData},
    config::{database, program},
    core::rollover,
    errors::{Error, Result},
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the program configuration
    let config = program::load_default_config()
        .inspect_err(|e| error!("Failed to load program configuration: {e}"))?;
    let year = config.current_academic_year();
    info!("Program configuration loaded, current academic year {year}");

    // 4. Initialize database
    let db = database::create_connection(&database::get_database_url())
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Seed tiers and campuses on first run
    program::seed_program(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed program data: {e}"))?;

    // 6. Carry benefits into a new academic year if one has started
    if let Some(result) = rollover::process_rollover(&db, year, false).await? {
        info!("{}", rollover::format_rollover_summary(&result)?);
    }

    // 7. Run the bot
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {e}"))
        .map_err(Error::EnvVar)?;

    bot::run_bot(token, BotData::new(db, config)).await
}
