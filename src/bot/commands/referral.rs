//! Referral Discord commands - lead intake, lifecycle actions, bulk actions,
//! CSV export and live feeds.
//!
//! Every command resolves its options through [`crate::bot::handlers::input`]
//! and delegates to the lifecycle operations in [`crate::core`]. Expected
//! failures bubble up to the framework error hook, which replies with the
//! reason.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData, LiveSession,
            handlers::{
                autocomplete,
                input::{self, FilterArgs},
            },
        },
        core::{
            export,
            lifecycle::{self, ConfirmAdmission, FeePlan, ReferralUpdate},
            live::LiveFeed,
            referral::{self, NewReferral, Page},
            report,
            student::{self, StudentDetails},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;
    use tracing::{info, warn};

    /// Leads shown per page of `/referral list`
    const LIST_PAGE_SIZE: u64 = 10;
    /// Leads shown in a live feed message
    const LIVE_ROWS: usize = 15;

    /// Parent command for referral leads.
    #[poise::command(
        slash_command,
        subcommands(
            "referral_add",
            "referral_list",
            "referral_show",
            "referral_follow_up",
            "referral_confirm",
            "referral_reject",
            "referral_edit",
            "referral_delete",
            "referral_convert",
            "referral_export",
            "referral_live"
        )
    )]
    pub async fn referral(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Referral command. Available subcommands:\n\
            `/referral add` - Record a new lead\n\
            `/referral list` - Browse leads with filters\n\
            `/referral show` - Show one lead\n\
            `/referral follow_up` - Mark a lead for follow-up\n\
            `/referral confirm` - Confirm an admission\n\
            `/referral reject` - Reject a lead\n\
            `/referral edit` - Change lead details\n\
            `/referral delete` - Delete a lead\n\
            `/referral convert` - Create a student from a confirmed lead\n\
            `/referral export` - Download leads as CSV\n\
            `/referral live` - Start or stop a live feed in this channel";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Records a new lead for an ambassador's referral code.
    #[poise::command(slash_command, rename = "add")]
    pub async fn referral_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Referral code of the ambassador"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: String,
        #[description = "Parent's full name"] parent_name: String,
        #[description = "Parent's mobile number"] parent_mobile: String,
        #[description = "Grade applied for (e.g. 'Grade 5')"] grade: String,
        #[description = "Campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: String,
        #[description = "Student's name, if known"] student_name: Option<String>,
        #[description = "Fee plan the family prefers"]
        #[autocomplete = "autocomplete::autocomplete_fee_plan"]
        preferred_fee_plan: Option<String>,
        #[description = "Notes for the admissions team"] notes: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let campus_id = input::campus_id_for_code(db, &campus).await?;
        let preferred_fee_plan = input::parse_choice::<FeePlan>(preferred_fee_plan.as_deref())?;

        let lead = referral::create_referral(
            db,
            NewReferral {
                referral_code,
                parent_name,
                parent_mobile,
                student_name,
                grade,
                campus_id,
                notes,
                preferred_fee_plan,
            },
        )
        .await?;

        ctx.say(format!(
            "✅ Lead #{} recorded for **{}** ({}) - status **{}**.",
            lead.id, lead.parent_name, lead.grade, lead.status
        ))
        .await?;
        Ok(())
    }

    /// Lists leads, newest first, with optional filters.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, rename = "list")]
    pub async fn referral_list(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Only leads in this status"]
        #[autocomplete = "autocomplete::autocomplete_status"]
        status: Option<String>,
        #[description = "Only leads from ambassadors with this role"]
        #[autocomplete = "autocomplete::autocomplete_role"]
        role: Option<String>,
        #[description = "Only leads for this campus"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Only leads of this ambassador"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: Option<String>,
        #[description = "Created on or after (YYYY-MM-DD)"] from: Option<String>,
        #[description = "Created on or before (YYYY-MM-DD)"] to: Option<String>,
        #[description = "Search names, mobile or admission number"] search: Option<String>,
        #[description = "Page number (default 1)"]
        #[min = 1]
        page: Option<u64>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let filter = FilterArgs {
            status,
            role,
            campus,
            referral_code,
            from,
            to,
            search,
        }
        .into_filter(db)
        .await?;

        let listing = referral::list_referrals(
            db,
            &filter,
            Page {
                page: page.unwrap_or(1),
                per_page: LIST_PAGE_SIZE,
            },
        )
        .await?;

        if listing.items.is_empty() {
            ctx.say("📋 No leads match these filters.").await?;
            return Ok(());
        }

        let mut text = format!(
            "📋 **Leads** - page {}/{} ({} total)\n```\n",
            listing.page,
            listing.page_count(),
            listing.total
        );
        for row in &listing.items {
            writeln!(text, "{}", report::format_lead_summary(row))?;
        }
        text.push_str("```");

        ctx.say(input::fit_message(&text)).await?;
        Ok(())
    }

    /// Shows every field of one lead.
    #[poise::command(slash_command, rename = "show")]
    pub async fn referral_show(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead number"] lead_id: i64,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let lead = lifecycle::find_lead(db, lead_id).await?;
        let owner = crate::core::ambassador::get_ambassador(db, lead.ambassador_id).await?;
        let campus = crate::core::campus::get_campus(db, lead.campus_id).await?;

        let mut embed = serenity::CreateEmbed::default()
            .title(format!("Lead #{} - {}", lead.id, lead.status))
            .color(0x0058_65F2)
            .field("Parent", format!("{} ({})", lead.parent_name, lead.parent_mobile), false)
            .field(
                "Student",
                lead.student_name.as_deref().unwrap_or("(not given)"),
                true,
            )
            .field("Grade", &lead.grade, true)
            .field(
                "Campus",
                campus.map_or_else(|| lead.campus_id.to_string(), |c| c.name),
                true,
            )
            .field(
                "Referred by",
                owner.map_or_else(
                    || format!("Ambassador {}", lead.ambassador_id),
                    |amb| format!("{} ({})", amb.full_name, amb.referral_code),
                ),
                false,
            );

        if let Some(plan) = &lead.preferred_fee_plan {
            embed = embed.field("Preferred plan", plan, true);
        }
        if let Some(admission_number) = &lead.admission_number {
            embed = embed.field("Admission number", admission_number, true);
        }
        if let (Some(plan), Some(fee)) = (&lead.fee_plan, lead.annual_fee) {
            embed = embed.field(
                "Fee",
                format!("{plan} · {}", report::format_currency(fee)),
                true,
            );
        }
        if let Some(student_id) = lead.student_id {
            embed = embed.field("Student record", format!("#{student_id}"), true);
        }
        if let Some(notes) = lead.notes.as_deref().filter(|n| !n.is_empty()) {
            embed = embed.field("Notes", notes, false);
        }
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "Created {}",
            lead.created_at.format("%Y-%m-%d %H:%M UTC")
        )));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Marks a New lead for follow-up.
    #[poise::command(slash_command, rename = "follow_up")]
    pub async fn referral_follow_up(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead number"] lead_id: i64,
    ) -> Result<()> {
        let lead = lifecycle::mark_follow_up(&ctx.data().database, lead_id).await?;
        ctx.say(format!(
            "📞 Lead #{} ({}) is now **{}**.",
            lead.id, lead.parent_name, lead.status
        ))
        .await?;
        Ok(())
    }

    /// Confirms an admission and updates the ambassador's benefits.
    #[poise::command(slash_command, rename = "confirm")]
    pub async fn referral_confirm(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead number"] lead_id: i64,
        #[description = "Admission (ERP) number"] admission_number: String,
        #[description = "Fee plan; defaults to the lead's preferred plan"]
        #[autocomplete = "autocomplete::autocomplete_fee_plan"]
        fee_plan: Option<String>,
        #[description = "Annual fee; defaults to the campus fee for the grade"] annual_fee: Option<
            f64,
        >,
    ) -> Result<()> {
        ctx.defer().await?;
        let data = ctx.data();
        let outcome = lifecycle::confirm_referral(
            &data.database,
            lead_id,
            &ConfirmAdmission {
                admission_number,
                fee_plan: input::parse_choice::<FeePlan>(fee_plan.as_deref())?,
                annual_fee,
            },
            data.current_year(),
        )
        .await?;

        let amb = &outcome.ambassador;
        ctx.say(format!(
            "✅ Lead #{} confirmed (ERP {}, {} {}).\n\
             🏅 {} now has **{}** confirmed referrals this year - tier **{}**, {} year-fee benefit.",
            outcome.lead.id,
            outcome.lead.admission_number.as_deref().unwrap_or("-"),
            outcome.lead.fee_plan.as_deref().unwrap_or("-"),
            report::format_currency(outcome.lead.annual_fee.unwrap_or_default()),
            amb.full_name,
            amb.confirmed_referral_count,
            amb.tier_name,
            report::format_percent(amb.year_fee_benefit_percent)
        ))
        .await?;
        Ok(())
    }

    /// Rejects an open lead. This cannot be undone.
    #[poise::command(slash_command, rename = "reject")]
    pub async fn referral_reject(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead number"] lead_id: i64,
        #[description = "Set to True to confirm the rejection"] confirm: bool,
    ) -> Result<()> {
        if !confirm {
            ctx.say(format!(
                "⚠️ Rejecting lead #{lead_id} cannot be undone. Re-run with `confirm: True` to proceed."
            ))
            .await?;
            return Ok(());
        }

        let lead = lifecycle::reject_referral(&ctx.data().database, lead_id).await?;
        ctx.say(format!("🚫 Lead #{} ({}) rejected.", lead.id, lead.parent_name))
            .await?;
        Ok(())
    }

    /// Edits a lead's details. Status and admission data are not editable.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, rename = "edit")]
    pub async fn referral_edit(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead number"] lead_id: i64,
        #[description = "Parent's full name"] parent_name: Option<String>,
        #[description = "Parent's mobile number"] parent_mobile: Option<String>,
        #[description = "Student's name"] student_name: Option<String>,
        #[description = "Grade applied for"] grade: Option<String>,
        #[description = "Campus code"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Notes"] notes: Option<String>,
        #[description = "Preferred fee plan"]
        #[autocomplete = "autocomplete::autocomplete_fee_plan"]
        preferred_fee_plan: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let update = ReferralUpdate {
            parent_name,
            parent_mobile,
            student_name,
            grade,
            campus_id: input::optional_campus_id(db, campus.as_deref()).await?,
            notes,
            preferred_fee_plan: input::parse_choice::<FeePlan>(preferred_fee_plan.as_deref())?,
        };

        let lead = lifecycle::update_referral(db, lead_id, update).await?;
        ctx.say(format!("✅ Lead #{} updated.", lead.id)).await?;
        Ok(())
    }

    /// Permanently deletes a lead.
    #[poise::command(slash_command, rename = "delete")]
    pub async fn referral_delete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead number"] lead_id: i64,
        #[description = "Set to True to confirm the deletion"] confirm: bool,
    ) -> Result<()> {
        if !confirm {
            ctx.say(format!(
                "⚠️ Deleting lead #{lead_id} is permanent. Re-run with `confirm: True` to proceed."
            ))
            .await?;
            return Ok(());
        }

        let data = ctx.data();
        lifecycle::delete_referral(&data.database, lead_id, data.current_year()).await?;
        ctx.say(format!("🗑️ Lead #{lead_id} deleted.")).await?;
        Ok(())
    }

    /// Creates a student record from a confirmed lead.
    #[poise::command(slash_command, rename = "convert")]
    pub async fn referral_convert(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead number"] lead_id: i64,
        #[description = "Student's name; defaults to the name on the lead"] student_name: Option<
            String,
        >,
        #[description = "Section"] section: Option<String>,
        #[description = "Roll number"] roll_number: Option<String>,
        #[description = "Base fee; defaults to the confirmed annual fee"] base_fee: Option<f64>,
        #[description = "Discount percent (default 0)"] discount_percent: Option<f64>,
    ) -> Result<()> {
        let data = ctx.data();
        let created = student::convert_lead_to_student(
            &data.database,
            lead_id,
            StudentDetails {
                student_name,
                section,
                roll_number,
                base_fee,
                discount_percent,
            },
            data.current_year(),
        )
        .await?;

        ctx.say(format!(
            "🎓 Student #{} **{}** ({}) created from lead #{lead_id}.",
            created.id, created.name, created.grade
        ))
        .await?;
        Ok(())
    }

    /// Exports the filtered lead list as a CSV attachment.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, rename = "export")]
    pub async fn referral_export(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Only leads in this status"]
        #[autocomplete = "autocomplete::autocomplete_status"]
        status: Option<String>,
        #[description = "Only leads from ambassadors with this role"]
        #[autocomplete = "autocomplete::autocomplete_role"]
        role: Option<String>,
        #[description = "Only leads for this campus"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Only leads of this ambassador"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: Option<String>,
        #[description = "Created on or after (YYYY-MM-DD)"] from: Option<String>,
        #[description = "Created on or before (YYYY-MM-DD)"] to: Option<String>,
        #[description = "Search names, mobile or admission number"] search: Option<String>,
    ) -> Result<()> {
        ctx.defer().await?;
        let db = &ctx.data().database;
        let filter = FilterArgs {
            status,
            role,
            campus,
            referral_code,
            from,
            to,
            search,
        }
        .into_filter(db)
        .await?;

        let rows = referral::list_all_leads(db, &filter).await?;
        let csv = export::export_referrals_csv(&rows)?;
        let file_name = format!("referrals-{}.csv", chrono::Utc::now().format("%Y%m%d-%H%M"));

        ctx.send(
            poise::CreateReply::default()
                .content(format!("📎 {} leads exported.", rows.len()))
                .attachment(serenity::CreateAttachment::bytes(csv.into_bytes(), file_name)),
        )
        .await?;
        Ok(())
    }

    /// Starts or stops a refreshing lead list in this channel.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, rename = "live")]
    pub async fn referral_live(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "True to start, False to stop"] enabled: bool,
        #[description = "Only leads in this status"]
        #[autocomplete = "autocomplete::autocomplete_status"]
        status: Option<String>,
        #[description = "Only leads from ambassadors with this role"]
        #[autocomplete = "autocomplete::autocomplete_role"]
        role: Option<String>,
        #[description = "Only leads for this campus"]
        #[autocomplete = "autocomplete::autocomplete_campus_code"]
        campus: Option<String>,
        #[description = "Only leads of this ambassador"]
        #[autocomplete = "autocomplete::autocomplete_referral_code"]
        referral_code: Option<String>,
        #[description = "Search names, mobile or admission number"] search: Option<String>,
    ) -> Result<()> {
        let data = ctx.data();
        let channel_id = ctx.channel_id();

        if !enabled {
            let stopped = data.stop_live_session(channel_id).await;
            if stopped.is_some() {
                info!("Live feed stopped in channel {channel_id}");
                ctx.say("⏹️ Live feed stopped.").await?;
            } else {
                ctx.say("ℹ️ No live feed is running in this channel.").await?;
            }
            return Ok(());
        }

        let filter = FilterArgs {
            status,
            role,
            campus,
            referral_code,
            search,
            ..Default::default()
        }
        .into_filter(&data.database)
        .await?;

        let every = data.config.live_refresh_interval();
        let handle = ctx
            .say(format!(
                "📡 Starting live feed (refresh every {}s)...",
                every.as_secs()
            ))
            .await?;
        let mut message = handle.into_message().await?;

        let feed = LiveFeed::spawn(data.database.clone(), filter, every);
        let mut receiver = feed.subscribe();
        let http = ctx.serenity_context().http.clone();

        let relay = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let rendered = input::format_live_snapshot(&receiver.borrow_and_update(), LIVE_ROWS);
                let text = match rendered {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to render live snapshot: {e}");
                        continue;
                    }
                };
                if let Err(e) = message
                    .edit(&*http, serenity::EditMessage::new().content(text))
                    .await
                {
                    warn!("Live feed message could not be updated, stopping relay: {e}");
                    break;
                }
            }
        });

        let replaced = data
            .start_live_session(channel_id, LiveSession::new(feed, relay))
            .await;
        if replaced.is_some() {
            info!("Replaced the live feed in channel {channel_id}");
        }
        Ok(())
    }

    /// Parent command for actions on many leads at once.
    #[poise::command(
        slash_command,
        subcommands("bulk_confirm", "bulk_reject", "bulk_delete", "bulk_convert")
    )]
    pub async fn bulk(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Bulk command. Available subcommands:\n\
            `/bulk confirm` - Confirm leads, e.g. `12:ERP-001, 13:ERP-002`\n\
            `/bulk reject` - Reject leads, e.g. `12, 13, 14`\n\
            `/bulk delete` - Delete leads\n\
            `/bulk convert` - Create students from confirmed leads";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Confirms several leads with one fee plan.
    #[poise::command(slash_command, rename = "confirm")]
    pub async fn bulk_confirm(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead and admission number pairs, e.g. 12:ERP-001, 13:ERP-002"]
        items: String,
        #[description = "Fee plan for every lead; defaults to each lead's preferred plan"]
        #[autocomplete = "autocomplete::autocomplete_fee_plan"]
        fee_plan: Option<String>,
    ) -> Result<()> {
        let items = input::parse_bulk_confirm_items(&items)?;
        let fee_plan = input::parse_choice::<FeePlan>(fee_plan.as_deref())?;
        ctx.defer().await?;

        let data = ctx.data();
        let report =
            lifecycle::bulk_confirm_referrals(&data.database, &items, fee_plan, data.current_year())
                .await;
        ctx.say(input::fit_message(&report::format_bulk_report(
            "✅ Bulk confirm",
            &report,
        )))
        .await?;
        Ok(())
    }

    /// Rejects several leads.
    #[poise::command(slash_command, rename = "reject")]
    pub async fn bulk_reject(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead numbers, e.g. 12, 13, 14"] lead_ids: String,
        #[description = "Set to True to confirm the rejections"] confirm: bool,
    ) -> Result<()> {
        let lead_ids = lifecycle::parse_lead_ids(&lead_ids)?;
        if !confirm {
            ctx.say(format!(
                "⚠️ Rejecting {} leads cannot be undone. Re-run with `confirm: True` to proceed.",
                lead_ids.len()
            ))
            .await?;
            return Ok(());
        }
        ctx.defer().await?;

        let report = lifecycle::bulk_reject_referrals(&ctx.data().database, &lead_ids).await;
        ctx.say(input::fit_message(&report::format_bulk_report(
            "🚫 Bulk reject",
            &report,
        )))
        .await?;
        Ok(())
    }

    /// Permanently deletes several leads.
    #[poise::command(slash_command, rename = "delete")]
    pub async fn bulk_delete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead numbers, e.g. 12, 13, 14"] lead_ids: String,
        #[description = "Set to True to confirm the deletions"] confirm: bool,
    ) -> Result<()> {
        let lead_ids = lifecycle::parse_lead_ids(&lead_ids)?;
        if !confirm {
            ctx.say(format!(
                "⚠️ Deleting {} leads is permanent. Re-run with `confirm: True` to proceed.",
                lead_ids.len()
            ))
            .await?;
            return Ok(());
        }
        ctx.defer().await?;

        let data = ctx.data();
        let report =
            lifecycle::bulk_delete_referrals(&data.database, &lead_ids, data.current_year()).await;
        ctx.say(input::fit_message(&report::format_bulk_report(
            "🗑️ Bulk delete",
            &report,
        )))
        .await?;
        Ok(())
    }

    /// Creates students from several confirmed leads using the lead details.
    #[poise::command(slash_command, rename = "convert")]
    pub async fn bulk_convert(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Lead numbers, e.g. 12, 13, 14"] lead_ids: String,
    ) -> Result<()> {
        let lead_ids = lifecycle::parse_lead_ids(&lead_ids)?;
        ctx.defer().await?;

        let data = ctx.data();
        let report = student::bulk_convert_leads_to_students(
            &data.database,
            &lead_ids,
            data.current_year(),
        )
        .await;
        ctx.say(input::fit_message(&report::format_bulk_report(
            "🎓 Bulk convert",
            &report,
        )))
        .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
