//! Administration Discord commands - benefit slabs, campuses, students and
//! the academic-year rollover.
//!
//! Slab changes alter every ambassador's tier, so each slab command ends by
//! recomputing the cached benefits for the current academic year.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::{autocomplete, input},
        },
        core::{
            ambassador,
            campus::{self, NewCampus},
            report, rollover,
            student::{self, NewStudent, StudentUpdate},
            tier::{self, NewSlab},
        },
        errors::{Error, Result},
    };
    use std::fmt::Write;
    use tracing::info;

    /// Students listed per message
    const STUDENT_LIST_LIMIT: usize = 40;

    async fn recompute_after_slab_change(ctx: poise::Context<'_, BotData, Error>) -> Result<usize> {
        let data = ctx.data();
        let count = ambassador::recompute_all_ambassadors(&data.database, data.current_year()).await?;
        info!("Slab table changed, recomputed {count} ambassadors");
        Ok(count)
    }

    /// Parent command for the benefit tier table.
    #[poise::command(
        slash_command,
        subcommands("slab_list", "slab_add", "slab_edit", "slab_delete")
    )]
    pub async fn slab(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Benefit slab command. Available subcommands:\n\
            `/slab list` - Show the tier table\n\
            `/slab add` - Add a tier\n\
            `/slab edit` - Change a tier\n\
            `/slab delete` - Remove a tier";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Shows the tier table ordered by threshold.
    #[poise::command(slash_command, rename = "list")]
    pub async fn slab_list(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let slabs = tier::list_slabs(&ctx.data().database).await?;
        if slabs.is_empty() {
            ctx.say("📊 The tier table is empty; every ambassador is on the base tier.")
                .await?;
            return Ok(());
        }

        let mut text = String::from("📊 **Benefit tiers**\n```\n#   Tier         Refs  Year%  LT base%  LT extra%\n");
        for slab in &slabs {
            writeln!(
                text,
                "{:<3} {:<12} {:>4}  {:>5.1}  {:>8.1}  {:>9.1}",
                slab.id,
                slab.tier_name,
                slab.referral_count,
                slab.year_fee_benefit_percent,
                slab.base_long_term_percent,
                slab.long_term_extra_percent
            )?;
        }
        text.push_str("```");

        ctx.say(input::fit_message(&text)).await?;
        Ok(())
    }

    /// Adds a tier. Thresholds must stay increasing and percentages
    /// non-decreasing.
    #[poise::command(slash_command, rename = "add")]
    pub async fn slab_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Tier name (e.g. 'Gold')"] tier_name: String,
        #[description = "Confirmed referrals needed in the year"] referral_count: u32,
        #[description = "Year-fee benefit percent"] year_fee_benefit_percent: f64,
        #[description = "Long-term base percent (default 0)"] base_long_term_percent: Option<f64>,
        #[description = "Long-term extra percent per referral above the threshold (default 0)"]
        long_term_extra_percent: Option<f64>,
    ) -> Result<()> {
        let created = tier::create_slab(
            &ctx.data().database,
            NewSlab {
                tier_name,
                referral_count,
                year_fee_benefit_percent,
                base_long_term_percent: base_long_term_percent.unwrap_or_default(),
                long_term_extra_percent: long_term_extra_percent.unwrap_or_default(),
            },
        )
        .await?;
        let count = recompute_after_slab_change(ctx).await?;

        ctx.say(format!(
            "✅ Tier **{}** added at {} referrals ({}). {count} ambassadors recomputed.",
            created.tier_name,
            created.referral_count,
            report::format_percent(created.year_fee_benefit_percent)
        ))
        .await?;
        Ok(())
    }

    /// Replaces every field of a tier.
    #[poise::command(slash_command, rename = "edit")]
    pub async fn slab_edit(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Tier number from /slab list"] slab_id: i64,
        #[description = "Tier name"] tier_name: String,
        #[description = "Confirmed referrals needed in the year"] referral_count: u32,
        #[description = "Year-fee benefit percent"] year_fee_benefit_percent: f64,
        #[description = "Long-term base percent (default 0)"] base_long_term_percent: Option<f64>,
        #[description = "Long-term extra percent per referral above the threshold (default 0)"]
        long_term_extra_percent: Option<f64>,
    ) -> Result<()> {
        let updated = tier::update_slab(
            &ctx.data().database,
            slab_id,
            NewSlab {
                tier_name,
                referral_count,
                year_fee_benefit_percent,
                base_long_term_percent: base_long_term_percent.unwrap_or_default(),
                long_term_extra_percent: long_term_extra_percent.unwrap_or_default(),
            },
        )
        .await?;
        let count = recompute_after_slab_change(ctx).await?;

        ctx.say(format!(
            "✅ Tier **{}** updated. {count} ambassadors recomputed.",
            updated.tier_name
        ))
        .await?;
        Ok(())
    }

    /// Removes a tier.
    #[poise::command(slash_command, rename = "delete")]
    pub async fn slab_delete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Tier number from /slab list"] slab_id: i64,
        #[description = "Set to True to confirm the deletion"] confirm: bool,
    ) -> Result<()> {
        if !confirm {
            ctx.say(format!(
                "⚠️ Deleting tier #{slab_id} changes ambassador benefits. Re-run with `confirm: True` to proceed."
            ))
            .await?;
            return Ok(());
        }

        tier::delete_slab(&ctx.data().database, slab_id).await?;
        let count = recompute_after_slab_change(ctx).await?;
        ctx.say(format!(
            "🗑️ Tier #{slab_id} deleted. {count} ambassadors recomputed."
        ))
        .await?;
        Ok(())
    }

    /// Parent command for campuses and their fee tables.
    #[poise::command(slash_command, subcommands("campus_add", "campus_list", "campus_fee"))]
    pub async fn campus(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Campus command. Available subcommands:\n\
            `/campus add` - Add a campus\n\
            `/campus list` - List campuses with their grade fees\n\
            `/campus fee` - Set the annual fees of a grade";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Adds a campus.
    #[poise::command(slash_command, rename = "add")]
    pub async fn campus_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Campus name"] name: String,
        #[description = "Short unique code (e.g. 'ADYAR')"] code: String,
        #[description = "Location"] location: String,
        #[description = "Student capacity"] capacity: i32,
    ) -> Result<()> {
        let created = campus::create_campus(
            &ctx.data().database,
            NewCampus {
                name,
                code,
                location,
                capacity,
            },
        )
        .await?;
        ctx.say(format!(
            "🏫 Campus **{}** added with code **{}**.",
            created.name, created.code
        ))
        .await?;
        Ok(())
    }

    /// Lists campuses with their grade fees.
    #[poise::command(slash_command, rename = "list")]
    pub async fn campus_list(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let db = &ctx.data().database;
        let campuses = campus::list_campuses(db).await?;
        if campuses.is_empty() {
            ctx.say("🏫 No campuses yet. Add one with `/campus add`.").await?;
            return Ok(());
        }

        let mut text = String::from("🏫 **Campuses**\n");
        for entry in &campuses {
            writeln!(
                text,
                "**{}** ({}) - {} · capacity {}",
                entry.name, entry.code, entry.location, entry.capacity
            )?;
            for fee in campus::list_grade_fees(db, entry.id).await? {
                writeln!(
                    text,
                    "  • {}: OTP {} / WOTP {}",
                    fee.grade,
                    report::format_currency(fee.otp_fee),
                    report::format_currency(fee.wotp_fee)
                )?;
            }
        }

        ctx.say(input::fit_message(&text)).await?;
        Ok(())
    }

    /// Sets the annual fees of one grade at a campus.
    #[poise::command(slash_command, rename = "fee")]
    pub async fn campus_fee(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: String,
        #[description = "Grade (e.g. 'Grade 5')"] grade: String,
        #[description = "Annual fee with one-time payment"] otp_fee: f64,
        #[description = "Annual fee in installments"] wotp_fee: f64,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let campus_id = input::campus_id_for_code(db, &campus).await?;
        let fee = campus::set_grade_fee(db, campus_id, &grade, otp_fee, wotp_fee).await?;
        ctx.say(format!(
            "✅ {} fees set: OTP {} / WOTP {}.",
            fee.grade,
            report::format_currency(fee.otp_fee),
            report::format_currency(fee.wotp_fee)
        ))
        .await?;
        Ok(())
    }

    /// Parent command for student records.
    #[poise::command(slash_command, subcommands("student_add", "student_list", "student_edit"))]
    pub async fn student(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Student command. Available subcommands:\n\
            `/student add` - Add a student directly\n\
            `/student list` - List students\n\
            `/student edit` - Change a student's details\n\
            Use `/referral convert` to create a student from a confirmed lead.";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Adds a student record that did not come from a referral.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, rename = "add")]
    pub async fn student_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Student's name"] name: String,
        #[description = "Grade"] grade: String,
        #[description = "Campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: String,
        #[description = "Referral code of the parent ambassador"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        parent_referral_code: String,
        #[description = "Annual base fee"] base_fee: f64,
        #[description = "Discount percent (default 0)"] discount_percent: Option<f64>,
        #[description = "Section"] section: Option<String>,
        #[description = "Roll number"] roll_number: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let campus_id = input::campus_id_for_code(db, &campus).await?;
        let parent = input::ambassador_for_code(db, &parent_referral_code).await?;

        let created = student::create_student(
            db,
            NewStudent {
                name,
                grade,
                section,
                roll_number,
                campus_id,
                parent_ambassador_id: parent.id,
                base_fee,
                discount_percent: discount_percent.unwrap_or_default(),
            },
        )
        .await?;

        ctx.say(format!(
            "🎓 Student #{} **{}** ({}) added under {}.",
            created.id, created.name, created.grade, parent.full_name
        ))
        .await?;
        Ok(())
    }

    /// Lists students, optionally for one campus.
    #[poise::command(slash_command, rename = "list")]
    pub async fn student_list(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let campus_id = input::optional_campus_id(db, campus.as_deref()).await?;
        let students = student::list_students(db, campus_id).await?;

        if students.is_empty() {
            ctx.say("🎓 No students found.").await?;
            return Ok(());
        }

        let mut text = format!("🎓 **Students** ({})\n```\n", students.len());
        for s in students.iter().take(STUDENT_LIST_LIMIT) {
            let origin = s
                .lead_id
                .map_or_else(String::new, |lead_id| format!(" · lead #{lead_id}"));
            writeln!(
                text,
                "#{:<4} {:<24} {:<10} {:<4} {} - {}{origin}",
                s.id,
                s.name,
                s.grade,
                s.section.as_deref().unwrap_or("-"),
                report::format_currency(s.base_fee),
                report::format_percent(s.discount_percent)
            )?;
        }
        text.push_str("```");
        if students.len() > STUDENT_LIST_LIMIT {
            write!(text, "…and {} more", students.len() - STUDENT_LIST_LIMIT)?;
        }

        ctx.say(input::fit_message(&text)).await?;
        Ok(())
    }

    /// Changes a student's details.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, rename = "edit")]
    pub async fn student_edit(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Student number"] student_id: i64,
        #[description = "Name"] name: Option<String>,
        #[description = "Grade"] grade: Option<String>,
        #[description = "Section"] section: Option<String>,
        #[description = "Roll number"] roll_number: Option<String>,
        #[description = "Campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Annual base fee"] base_fee: Option<f64>,
        #[description = "Discount percent"] discount_percent: Option<f64>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let update = StudentUpdate {
            name,
            grade,
            section,
            roll_number,
            campus_id: input::optional_campus_id(db, campus.as_deref()).await?,
            base_fee,
            discount_percent,
        };

        let updated = student::update_student(db, student_id, update).await?;
        ctx.say(format!("✅ Student #{} updated.", updated.id)).await?;
        Ok(())
    }

    /// Moves cached benefits to the current academic year.
    ///
    /// Runs automatically at startup; use `force` to repeat it after fixing
    /// data for the current year.
    #[poise::command(slash_command)]
    pub async fn rollover(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Run even if this year was already processed"] force: Option<bool>,
    ) -> Result<()> {
        ctx.defer().await?;
        let data = ctx.data();
        let year = data.current_year();

        match rollover::process_rollover(&data.database, year, force.unwrap_or(false)).await? {
            Some(result) => {
                let summary = rollover::format_rollover_summary(&result)?;
                ctx.say(input::fit_message(&format!("📅 ```\n{summary}```")))
                    .await?;
            }
            None => {
                ctx.say(format!(
                    "ℹ️ Benefits are already counted for {year}. Use `force: True` to run again."
                ))
                .await?;
            }
        }
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
