//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the referral program,
//! including all slash commands, autocomplete handlers, and the shared bot
//! context. Commands only parse options and format replies; every rule lives
//! in [`crate::core`].

/// Discord command implementations (referrals, ambassadors, analytics, admin)
pub mod commands;
/// Discord interaction handlers (autocomplete, option parsing)
pub mod handlers;

use crate::{
    config::program::ProgramConfig,
    core::{academic_year::AcademicYear, live::LiveFeed},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, instrument, warn};

/// A live feed bound to one channel message.
///
/// The relay task edits the message whenever the feed publishes. Dropping the
/// session stops both the feed and the relay.
#[derive(Debug)]
pub struct LiveSession {
    /// Background refresh of the filtered lead list
    pub feed: LiveFeed,
    relay: JoinHandle<()>,
}

impl LiveSession {
    /// Pairs a feed with the task relaying it to Discord.
    #[must_use]
    pub const fn new(feed: LiveFeed, relay: JoinHandle<()>) -> Self {
        Self { feed, relay }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

/// Shared data available to all bot commands.
/// This structure holds the database connection, the program configuration
/// and the live feeds currently running per channel.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Program settings loaded at startup
    pub config: ProgramConfig,
    /// At most one live feed per channel
    pub live_sessions: Mutex<HashMap<serenity::ChannelId, LiveSession>>,
}

impl BotData {
    /// Creates a new `BotData` instance with the given database connection
    /// and program configuration.
    #[must_use]
    pub fn new(database: DatabaseConnection, config: ProgramConfig) -> Self {
        Self {
            database,
            config,
            live_sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The academic year benefits are counted in right now.
    #[must_use]
    pub fn current_year(&self) -> AcademicYear {
        self.config.current_academic_year()
    }

    /// Binds `session` to `channel`, returning the session it replaces.
    pub async fn start_live_session(
        &self,
        channel: serenity::ChannelId,
        session: LiveSession,
    ) -> Option<LiveSession> {
        self.live_sessions.lock().await.insert(channel, session)
    }

    /// Unbinds the session running in `channel`, if any.
    pub async fn stop_live_session(&self, channel: serenity::ChannelId) -> Option<LiveSession> {
        self.live_sessions.lock().await.remove(&channel)
    }
}

/// Text shown to the operator when a command fails.
///
/// Expected failures carry their own message; anything else is reported
/// generically and logged in full.
#[must_use]
pub fn error_reply(error: &Error) -> String {
    if error.is_expected() {
        format!("❌ {error}")
    } else {
        "❌ Something went wrong while running this command. Please try again later.".to_string()
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            if error.is_expected() {
                warn!("Command `{}` rejected: {error}", ctx.command().name);
            } else {
                error!("Error in command `{}`: {error:?}", ctx.command().name);
            }
            if let Err(e) = ctx.say(error_reply(&error)).await {
                error!("Failed to send error message: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Connects to Discord and serves commands until the gateway closes.
#[instrument(skip_all)]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::referral(),
                commands::bulk(),
                commands::ambassador(),
                commands::dashboard(),
                commands::leaderboard(),
                commands::campus_stats(),
                commands::slab(),
                commands::campus(),
                commands::student(),
                commands::rollover(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {e:?}"))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {e:?}"))?;
    Ok(())
}

pub use commands::*;
pub use handlers::*;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::referral::ReferralFilter, test_utils::*};
    use std::time::Duration;
    use tokio::{sync::oneshot, time};

    /// A session whose relay never finishes; `closed` resolves once the relay
    /// is aborted.
    fn idle_session(db: &DatabaseConnection) -> (LiveSession, oneshot::Receiver<()>) {
        let feed = LiveFeed::spawn(db.clone(), ReferralFilter::default(), Duration::from_secs(60));
        let (alive, closed) = oneshot::channel::<()>();
        let relay = tokio::spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await;
        });
        (LiveSession::new(feed, relay), closed)
    }

    #[test]
    fn test_error_reply_hides_infrastructure_errors() {
        let expected = error_reply(&Error::not_found("Lead", 7));
        assert_eq!(expected, "❌ Lead 7 not found");

        let io = Error::Io(std::io::Error::other("disk on fire"));
        let reply = error_reply(&io);
        assert!(!reply.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_live_session_replacement_stops_old_relay() -> Result<()> {
        let db = setup_test_db().await?;
        let data = BotData::new(db.clone(), ProgramConfig::default());
        let channel = serenity::ChannelId::new(42);

        let (first, first_closed) = idle_session(&db);
        assert!(data.start_live_session(channel, first).await.is_none());
        assert!(data.live_sessions.try_lock().is_ok());

        let (second, mut second_closed) = idle_session(&db);
        let replaced = data.start_live_session(channel, second).await;
        assert!(replaced.is_some());
        drop(replaced);
        assert!(time::timeout(Duration::from_secs(5), first_closed).await.is_ok());
        assert!(second_closed.try_recv().is_err());

        let stopped = data.stop_live_session(channel).await;
        assert!(stopped.is_some());
        drop(stopped);
        assert!(time::timeout(Duration::from_secs(5), second_closed).await.is_ok());
        assert!(data.stop_live_session(channel).await.is_none());
        Ok(())
    }
}
