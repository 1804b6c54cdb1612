//! Ambassador Discord commands - registration, reports and account changes.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::{autocomplete, input},
        },
        core::{
            ambassador::{self, AmbassadorStatus, AmbassadorUpdate, NewAmbassador, Role},
            analytics, report,
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;

    /// Recent leads listed in `/ambassador info`
    const RECENT_LEADS: usize = 5;
    /// Ambassadors listed per message
    const LIST_LIMIT: usize = 40;

    /// Parent command for ambassador management.
    #[poise::command(
        slash_command,
        subcommands(
            "ambassador_register",
            "ambassador_info",
            "ambassador_list",
            "ambassador_edit",
            "ambassador_deactivate",
            "ambassador_activate",
            "ambassador_delete",
            "ambassador_recompute"
        )
    )]
    pub async fn ambassador(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Ambassador command. Available subcommands:\n\
            `/ambassador register` - Register a parent, staff member or alumnus\n\
            `/ambassador info` - Benefit report for one ambassador\n\
            `/ambassador list` - List ambassadors\n\
            `/ambassador edit` - Change contact details or fee\n\
            `/ambassador deactivate` / `activate` - Stop or resume accepting leads\n\
            `/ambassador delete` - Remove an ambassador and their leads\n\
            `/ambassador recompute` - Recalculate every cached benefit";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Registers a new ambassador and hands out their referral code.
    #[poise::command(slash_command, rename = "register")]
    pub async fn ambassador_register(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Full name"] full_name: String,
        #[description = "Mobile number"] mobile: String,
        #[description = "Parent, Staff or Alumni"]
        #[autocomplete = "autocomplete::autocomplete_role"]
        role: String,
        #[description = "Annual fee the year-fee benefit applies to"] student_fee: f64,
        #[description = "Home campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Custom referral code; generated when omitted"] referral_code: Option<
            String,
        >,
    ) -> Result<()> {
        let data = ctx.data();
        let db = &data.database;
        let role: Role = role.parse()?;

        let created = ambassador::create_ambassador(
            db,
            NewAmbassador {
                full_name,
                mobile,
                role,
                campus_id: input::optional_campus_id(db, campus.as_deref()).await?,
                student_fee,
                referral_code,
            },
            data.current_year(),
        )
        .await?;

        ctx.say(format!(
            "✅ Registered **{}** as {}. Referral code **{}**\n🔗 {}",
            created.full_name,
            created.role,
            created.referral_code,
            ambassador::referral_link(&data.config.referral_base_url, &created.referral_code)
        ))
        .await?;
        Ok(())
    }

    /// Shows an ambassador's benefits, leads and progress to the next tier.
    #[poise::command(slash_command, rename = "info")]
    pub async fn ambassador_info(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Referral code"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: String,
    ) -> Result<()> {
        let data = ctx.data();
        let db = &data.database;
        let amb = input::ambassador_for_code(db, &referral_code).await?;
        let built = report::generate_ambassador_report(
            db,
            amb.id,
            data.current_year(),
            &data.config.referral_base_url,
            RECENT_LEADS,
        )
        .await?;
        let amb = &built.ambassador;

        let mut history = String::new();
        for (year, count) in &built.history {
            writeln!(history, "{year}: {count}")?;
        }
        if history.is_empty() {
            history.push_str("No confirmed referrals yet");
        }

        let progress = match &built.next_tier {
            Some((tier, missing)) => format!(
                "{} - {missing} more for **{}** ({})",
                report::format_progress_bar(
                    u32::try_from(amb.confirmed_referral_count)?,
                    tier.referral_count,
                    10
                ),
                tier.tier_name,
                report::format_percent(tier.year_fee_benefit_percent)
            ),
            None => "🏆 Highest tier reached".to_string(),
        };

        let mut recent = String::new();
        for row in &built.recent_leads {
            writeln!(recent, "{}", report::format_lead_summary(row))?;
        }
        if recent.is_empty() {
            recent.push_str("No leads yet");
        }

        let embed = serenity::CreateEmbed::default()
            .title(format!("🏅 {} ({})", amb.full_name, amb.referral_code))
            .color(0x0058_65F2)
            .description(&built.referral_link)
            .field("Role", &amb.role, true)
            .field("Status", &amb.status, true)
            .field("Benefit", &amb.benefit_status, true)
            .field(
                "This year",
                format!(
                    "{} confirmed · tier **{}**",
                    amb.confirmed_referral_count, amb.tier_name
                ),
                true,
            )
            .field(
                "Year-fee benefit",
                report::format_percent(amb.year_fee_benefit_percent),
                true,
            )
            .field(
                "Long-term benefit",
                report::format_percent(amb.long_term_benefit_percent),
                true,
            )
            .field(
                "Estimated savings",
                report::format_currency(built.estimated_savings),
                true,
            )
            .field(
                "Leads",
                format!(
                    "{} total · {} pending · {} confirmed · {} rejected ({} conversion)",
                    built.leads.total(),
                    built.leads.pending(),
                    built.leads.confirmed,
                    built.leads.rejected,
                    report::format_percent(built.leads.conversion_rate())
                ),
                false,
            )
            .field("Next tier", progress, false)
            .field("Confirmed by year", history, true)
            .field("Recent leads", input::fit_message(&recent), false);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Lists ambassadors with their current tier.
    #[poise::command(slash_command, rename = "list")]
    pub async fn ambassador_list(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Only this role"]
        #[autocomplete = "autocomplete::autocomplete_role"]
        role: Option<String>,
        #[description = "Active or Inactive"] status: Option<String>,
    ) -> Result<()> {
        let role = input::parse_choice::<Role>(role.as_deref())?;
        let status = input::parse_choice::<AmbassadorStatus>(status.as_deref())?;
        let ambassadors =
            ambassador::list_ambassadors(&ctx.data().database, role, status).await?;

        if ambassadors.is_empty() {
            ctx.say("👥 No ambassadors found.").await?;
            return Ok(());
        }

        let year = ctx.data().current_year();
        let mut text = format!("👥 **Ambassadors** ({})\n```\n", ambassadors.len());
        for amb in ambassadors.iter().take(LIST_LIMIT) {
            // Not yet rolled over to this year
            let (tier_name, percent) = if analytics::is_cached_for(amb, year) {
                (amb.tier_name.as_str(), amb.year_fee_benefit_percent)
            } else {
                ("-", 0.0)
            };
            writeln!(
                text,
                "{:<10} {:<24} {:<7} {:<8} {:>3} {} ({})",
                amb.referral_code,
                amb.full_name,
                amb.role,
                amb.status,
                analytics::confirmed_in(amb, year),
                tier_name,
                report::format_percent(percent)
            )?;
        }
        text.push_str("```");
        if ambassadors.len() > LIST_LIMIT {
            write!(text, "…and {} more", ambassadors.len() - LIST_LIMIT)?;
        }

        ctx.say(input::fit_message(&text)).await?;
        Ok(())
    }

    /// Changes an ambassador's contact details, campus or fee base.
    #[poise::command(slash_command, rename = "edit")]
    pub async fn ambassador_edit(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Referral code"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: String,
        #[description = "Full name"] full_name: Option<String>,
        #[description = "Mobile number"] mobile: Option<String>,
        #[description = "Home campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Annual fee the year-fee benefit applies to"] student_fee: Option<f64>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let amb = input::ambassador_for_code(db, &referral_code).await?;
        let updated = ambassador::update_ambassador(
            db,
            amb.id,
            AmbassadorUpdate {
                full_name,
                mobile,
                campus_id: input::optional_campus_id(db, campus.as_deref()).await?,
                student_fee,
            },
        )
        .await?;

        ctx.say(format!(
            "✅ Updated **{}** ({}).",
            updated.full_name, updated.referral_code
        ))
        .await?;
        Ok(())
    }

    /// Stops an ambassador's code from accepting new leads.
    #[poise::command(slash_command, rename = "deactivate")]
    pub async fn ambassador_deactivate(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Referral code"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: String,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let amb = input::ambassador_for_code(db, &referral_code).await?;
        let updated =
            ambassador::set_ambassador_status(db, amb.id, AmbassadorStatus::Inactive).await?;
        ctx.say(format!(
            "⏸️ **{}** is now inactive. Existing leads are kept.",
            updated.full_name
        ))
        .await?;
        Ok(())
    }

    /// Lets an inactive ambassador accept leads again.
    #[poise::command(slash_command, rename = "activate")]
    pub async fn ambassador_activate(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Referral code"] referral_code: String,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let amb = input::ambassador_for_code(db, &referral_code).await?;
        let updated =
            ambassador::set_ambassador_status(db, amb.id, AmbassadorStatus::Active).await?;
        ctx.say(format!("▶️ **{}** is active again.", updated.full_name))
            .await?;
        Ok(())
    }

    /// Deletes an ambassador and all of their leads.
    #[poise::command(slash_command, rename = "delete")]
    pub async fn ambassador_delete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Referral code"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: String,
        #[description = "Set to True to confirm the deletion"] confirm: bool,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let amb = input::ambassador_for_code(db, &referral_code).await?;
        if !confirm {
            ctx.say(format!(
                "⚠️ Deleting **{}** also deletes all of their leads. Re-run with `confirm: True` to proceed.",
                amb.full_name
            ))
            .await?;
            return Ok(());
        }

        let removed = ambassador::delete_ambassador(db, amb.id).await?;
        ctx.say(format!(
            "🗑️ Deleted **{}** and {removed} lead(s).",
            amb.full_name
        ))
        .await?;
        Ok(())
    }

    /// Recomputes every ambassador's cached benefits for the current year.
    #[poise::command(slash_command, rename = "recompute")]
    pub async fn ambassador_recompute(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.defer().await?;
        let data = ctx.data();
        let year = data.current_year();
        let count = ambassador::recompute_all_ambassadors(&data.database, year).await?;
        ctx.say(format!("🔄 Recomputed benefits of {count} ambassadors for {year}."))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
