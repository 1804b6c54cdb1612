//! General Discord commands - ping and help.
//! This module contains simple commands that don't require database operations
//! and provide basic bot functionality and operator assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Referral Buddy Help**\n\
        Tracks referral leads from parents, staff and alumni and the fee benefits they earn.\n\n\
        **Referrals**\n\
        • `/referral add|list|show|edit|delete` - Record and browse leads.\n\
        • `/referral follow_up|confirm|reject` - Move a lead through its lifecycle.\n\
        • `/referral convert` - Turn a confirmed lead into a student record.\n\
        • `/referral export` - Download the filtered listing as CSV.\n\
        • `/referral live` - Keep a refreshing lead list in this channel.\n\
        • `/bulk confirm|reject|delete|convert` - Act on many leads at once.\n\n\
        **Ambassadors**\n\
        • `/ambassador register|info|list|edit|deactivate|activate|delete|recompute`\n\n\
        **Analytics**\n\
        • `/dashboard`, `/leaderboard`, `/campus_stats`\n\n\
        **Administration**\n\
        • `/slab list|add|edit|delete` - Benefit tier table.\n\
        • `/campus add|list|fee` - Campuses and grade fees.\n\
        • `/student add|list|edit` - Student records.\n\
        • `/rollover [force]` - Start the new academic year's benefit counts.\n\n\
        Destructive commands ask for `confirm: True`.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
