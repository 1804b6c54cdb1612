//! Analytics Discord commands - dashboard, leaderboard and campus comparison.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::{
                autocomplete,
                input::{self, FilterArgs},
            },
        },
        core::{
            analytics::{self, RoleShare},
            report,
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;

    fn format_role_shares(shares: &[RoleShare]) -> Result<String> {
        let mut text = String::new();
        for share in shares {
            writeln!(
                text,
                "{}: {} ({})",
                share.role,
                share.count,
                report::format_percent(share.percent)
            )?;
        }
        if text.is_empty() {
            text.push('-');
        }
        Ok(text)
    }

    /// Shows lead totals, conversion and estimated benefit value.
    #[poise::command(slash_command)]
    pub async fn dashboard(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Only leads from ambassadors with this role"]
        #[autocomplete = "autocomplete::autocomplete_role"]
        role: Option<String>,
        #[description = "Only leads for this campus"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Created on or after (YYYY-MM-DD)"] from: Option<String>,
        #[description = "Created on or before (YYYY-MM-DD)"] to: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let filter = FilterArgs {
            role,
            campus,
            from,
            to,
            ..Default::default()
        }
        .into_filter(db)
        .await?;
        let summary = analytics::load_dashboard(db, &filter, ctx.data().current_year()).await?;
        let leads = &summary.leads;

        let embed = serenity::CreateEmbed::default()
            .title("📈 Referral dashboard")
            .color(0x0058_65F2)
            .field("Total leads", leads.total().to_string(), true)
            .field("Confirmed", leads.confirmed.to_string(), true)
            .field(
                "Conversion",
                report::format_percent(summary.conversion_rate),
                true,
            )
            .field("New", leads.new.to_string(), true)
            .field("Follow-up", leads.follow_up.to_string(), true)
            .field("Rejected", leads.rejected.to_string(), true)
            .field(
                "Ambassadors",
                format!(
                    "{} ({} active)",
                    summary.total_ambassadors, summary.active_ambassadors
                ),
                true,
            )
            .field("Students", summary.students.to_string(), true)
            .field(
                "Estimated benefit value",
                report::format_currency(summary.estimated_value),
                true,
            )
            .field(
                "Leads by role",
                format_role_shares(&summary.leads_by_role)?,
                true,
            )
            .field(
                "Ambassadors by role",
                format_role_shares(&summary.ambassadors_by_role)?,
                true,
            );

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows the top ambassadors by confirmed referrals this year.
    #[poise::command(slash_command)]
    pub async fn leaderboard(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Number of entries (default from config)"]
        #[min = 1]
        #[max = 25]
        limit: Option<u32>,
    ) -> Result<()> {
        let data = ctx.data();
        let limit = match limit {
            Some(limit) => usize::try_from(limit)?,
            None => data.config.leaderboard_size,
        };
        let entries = analytics::load_leaderboard(&data.database, data.current_year(), limit).await?;

        if entries.is_empty() {
            ctx.say("🏆 No confirmed referrals yet this year.").await?;
            return Ok(());
        }

        let mut text = String::from("🏆 **Leaderboard**\n");
        for entry in &entries {
            let medal = match entry.rank {
                1 => "🥇",
                2 => "🥈",
                3 => "🥉",
                _ => "▫️",
            };
            writeln!(
                text,
                "{medal} {}. **{}** ({}, {}) - {} confirmed · {}",
                entry.rank,
                entry.full_name,
                entry.role,
                entry.referral_code,
                entry.confirmed_count,
                entry.tier_name
            )?;
        }

        ctx.say(input::fit_message(&text)).await?;
        Ok(())
    }

    /// Compares lead volume and conversion across campuses.
    #[poise::command(slash_command)]
    pub async fn campus_stats(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let stats = analytics::load_campus_comparison(&ctx.data().database).await?;
        if stats.is_empty() {
            ctx.say("🏫 No campuses yet.").await?;
            return Ok(());
        }

        let mut text = String::from(
            "🏫 **Campus comparison**\n```\nCampus       Leads  Conf  Rej  Pend  Conv%  Ambassadors\n",
        );
        for row in &stats {
            writeln!(
                text,
                "{:<12} {:>5} {:>5} {:>4} {:>5} {:>6.1} {:>12}",
                row.campus_code,
                row.total,
                row.confirmed,
                row.rejected,
                row.pending,
                row.conversion_rate,
                row.ambassador_count
            )?;
        }
        text.push_str("```");

        ctx.say(input::fit_message(&text)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
