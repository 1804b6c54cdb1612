//! Ambassador reports and display formatting.
//!
//! This module builds the per-ambassador benefit report shown to operators
//! and holds the small formatting helpers shared by the bot layer. All
//! functions return plain data or strings and know nothing about Discord.

use crate::{
    core::{
        academic_year::AcademicYear,
        ambassador,
        analytics::{self, StatusBreakdown},
        lifecycle::BulkReport,
        referral::{self, LeadRow, ReferralFilter},
        tier::{self, BenefitTier},
    },
    entities::ambassador as ambassador_entity,
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use std::collections::BTreeMap;

/// Everything the operator sees about one ambassador.
#[derive(Debug, Clone)]
pub struct AmbassadorReport {
    pub ambassador: ambassador_entity::Model,
    pub referral_link: String,
    /// All of the ambassador's leads, by status
    pub leads: StatusBreakdown,
    /// Confirmed referrals per academic year
    pub history: BTreeMap<AcademicYear, u32>,
    /// Most recent leads, newest first
    pub recent_leads: Vec<LeadRow>,
    pub estimated_savings: f64,
    /// Next tier and how many more confirmations it needs this year
    pub next_tier: Option<(BenefitTier, u32)>,
}

/// The lowest tier above `count`, with the confirmations still missing.
#[must_use]
pub fn next_tier(count: u32, tiers: &[BenefitTier]) -> Option<(BenefitTier, u32)> {
    tiers
        .iter()
        .filter(|tier| tier.referral_count > count)
        .min_by_key(|tier| tier.referral_count)
        .map(|tier| (tier.clone(), tier.referral_count - count))
}

/// Builds the report for one ambassador.
///
/// Benefit columns cached for an earlier academic year are recomputed for
/// `year` first.
///
/// # Arguments
/// * `db` - Database connection
/// * `ambassador_id` - Ambassador to report on
/// * `year` - Current academic year
/// * `base_url` - Referral landing page used for the share link
/// * `recent_limit` - Maximum number of recent leads to include
pub async fn generate_ambassador_report<C>(
    db: &C,
    ambassador_id: i64,
    year: AcademicYear,
    base_url: &str,
    recent_limit: usize,
) -> Result<AmbassadorReport>
where
    C: ConnectionTrait,
{
    let amb = ambassador::get_ambassador(db, ambassador_id)
        .await?
        .ok_or_else(|| Error::not_found("Ambassador", ambassador_id))?;
    let amb = if analytics::is_cached_for(&amb, year) {
        amb
    } else {
        ambassador::recompute_ambassador_benefits(db, ambassador_id, year).await?
    };

    let rows = referral::list_all_leads(
        db,
        &ReferralFilter {
            ambassador_id: Some(ambassador_id),
            ..Default::default()
        },
    )
    .await?;
    let leads = analytics::status_breakdown(rows.iter().map(|row| &row.lead));
    let history = ambassador::confirmed_history(db, ambassador_id).await?;
    let tiers = tier::load_tier_table(db).await?;
    let count = u32::try_from(amb.confirmed_referral_count)?;

    Ok(AmbassadorReport {
        referral_link: ambassador::referral_link(base_url, &amb.referral_code),
        estimated_savings: analytics::estimated_savings(&amb, year),
        next_tier: next_tier(count, &tiers),
        recent_leads: rows.into_iter().take(recent_limit).collect(),
        leads,
        history,
        ambassador: amb,
    })
}

/// Formats rupees with Indian digit grouping, e.g. `₹1,25,000.00`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let grouped = if whole.len() <= 3 {
        whole.to_string()
    } else {
        let (head, last_three) = whole.split_at(whole.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut rest = head;
        while rest.len() > 2 {
            let (left, pair) = rest.split_at(rest.len() - 2);
            groups.push(pair);
            rest = left;
        }
        groups.push(rest);
        groups.reverse();
        format!("{},{last_three}", groups.join(","))
    };

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}₹{grouped}.{fraction}")
}

/// Formats a percentage with one decimal place.
#[must_use]
pub fn format_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}

/// Generates a progress bar string, e.g. `[███░░░░░░░] 3/10`.
#[must_use]
pub fn format_progress_bar(current: u32, target: u32, bar_length: usize) -> String {
    if target == 0 {
        return format!("[{}] {current}/{target}", "█".repeat(bar_length));
    }
    let ratio = (f64::from(current) / f64::from(target)).clamp(0.0, 1.0);

    // Cast safety: ratio ∈ [0, 1] and bar_length is small
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = (ratio * bar_length as f64).round() as usize;
    let empty = bar_length.saturating_sub(filled);

    format!("[{}{}] {current}/{target}", "█".repeat(filled), "░".repeat(empty))
}

/// One-line summary of a lead.
#[must_use]
pub fn format_lead_summary(row: &LeadRow) -> String {
    let lead = &row.lead;
    let student = lead.student_name.as_deref().unwrap_or("(unnamed)");
    let mut line = format!(
        "#{} | {} | {} / {} | {} | {} | via {} ({})",
        lead.id,
        lead.status,
        lead.parent_name,
        student,
        lead.grade,
        row.campus_name,
        row.ambassador_name,
        row.referral_code
    );
    if let Some(admission_number) = &lead.admission_number {
        line.push_str(&format!(" | ERP {admission_number}"));
    }
    line
}

/// Summary of a bulk operation: the success count, then every failure.
#[must_use]
pub fn format_bulk_report(action: &str, report: &BulkReport) -> String {
    let mut summary = format!("{action}: {} processed", report.processed);
    if report.is_clean() {
        return summary;
    }
    summary.push_str(&format!(", {} failed", report.errors.len()));
    for error in &report.errors {
        summary.push_str("\n• ");
        summary.push_str(error);
    }
    summary
}
