//! Read-side projections over leads, ambassadors and campuses.
//!
//! The pure functions take slices and never touch storage; the `load_*`
//! functions fetch what they need and delegate to them. Every projection
//! tolerates empty input and returns zeroed values.

use crate::{
    core::{
        academic_year::AcademicYear,
        ambassador::{AmbassadorStatus, Role},
        campus,
        lifecycle::ReferralStatus,
        referral::{self, LeadRow, ReferralFilter},
    },
    entities::{Ambassador, Student, ambassador, campus as campus_entity, referral_lead},
    errors::Result,
};
use sea_orm::prelude::*;
use serde::Serialize;
use std::{cmp::Reverse, collections::HashMap};

/// Rounds to one decimal place.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `count / total × 100` rounded to one decimal; 0 when `total` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(count as f64 / total as f64 * 100.0)
}

/// Confirmed leads as a share of all leads.
#[must_use]
pub fn conversion_rate(confirmed: u64, total: u64) -> f64 {
    percentage(confirmed, total)
}

/// Lead counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub new: u64,
    pub follow_up: u64,
    pub confirmed: u64,
    pub rejected: u64,
}

impl StatusBreakdown {
    fn add(&mut self, status: ReferralStatus) {
        match status {
            ReferralStatus::New => self.new += 1,
            ReferralStatus::FollowUp => self.follow_up += 1,
            ReferralStatus::Confirmed => self.confirmed += 1,
            ReferralStatus::Rejected => self.rejected += 1,
        }
    }

    /// All leads counted.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.new + self.follow_up + self.confirmed + self.rejected
    }

    /// Leads still being worked on: New plus Follow-up.
    #[must_use]
    pub const fn pending(&self) -> u64 {
        self.new + self.follow_up
    }

    #[must_use]
    pub fn conversion_rate(&self) -> f64 {
        conversion_rate(self.confirmed, self.total())
    }
}

/// Counts leads per status. Rows with an unrecognised status are skipped.
#[must_use]
pub fn status_breakdown<'a, I>(leads: I) -> StatusBreakdown
where
    I: IntoIterator<Item = &'a referral_lead::Model>,
{
    let mut breakdown = StatusBreakdown::default();
    for lead in leads {
        if let Ok(status) = lead.status.parse() {
            breakdown.add(status);
        }
    }
    breakdown
}

/// One role's share of a population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleShare {
    pub role: Role,
    pub count: u64,
    pub percent: f64,
}

fn role_shares<'a>(roles: impl Iterator<Item = &'a str>) -> Vec<RoleShare> {
    let mut counts: HashMap<Role, u64> = HashMap::new();
    let mut total = 0;
    for role in roles.filter_map(|role| role.parse::<Role>().ok()) {
        *counts.entry(role).or_default() += 1;
        total += 1;
    }

    Role::ALL
        .iter()
        .map(|&role| {
            let count = counts.get(&role).copied().unwrap_or(0);
            RoleShare {
                role,
                count,
                percent: percentage(count, total),
            }
        })
        .collect()
}

/// Leads split by the role of the referring ambassador.
#[must_use]
pub fn role_breakdown_of_leads(rows: &[LeadRow]) -> Vec<RoleShare> {
    role_shares(rows.iter().map(|row| row.ambassador_role.as_str()))
}

/// Ambassadors split by role.
#[must_use]
pub fn role_breakdown_of_ambassadors(ambassadors: &[ambassador::Model]) -> Vec<RoleShare> {
    role_shares(ambassadors.iter().map(|amb| amb.role.as_str()))
}

/// A ranked ambassador.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    pub ambassador_id: i64,
    pub full_name: String,
    pub referral_code: String,
    pub role: String,
    pub confirmed_count: i32,
    pub tier_name: String,
}

/// Whether the cached benefit columns were computed for `year`.
#[must_use]
pub const fn is_cached_for(amb: &ambassador::Model, year: AcademicYear) -> bool {
    amb.benefit_academic_year == year.start_year()
}

/// Confirmed referrals in `year`. A cache left over from an earlier year
/// counts as none.
#[must_use]
pub const fn confirmed_in(amb: &ambassador::Model, year: AcademicYear) -> i32 {
    if is_cached_for(amb, year) {
        amb.confirmed_referral_count
    } else {
        0
    }
}

/// Top `limit` ambassadors with at least one confirmed referral in `year`,
/// by confirmed count descending. Ties go to the earlier registration, then
/// the lower id.
#[must_use]
pub fn leaderboard(
    ambassadors: &[ambassador::Model],
    year: AcademicYear,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&ambassador::Model> = ambassadors
        .iter()
        .filter(|amb| confirmed_in(amb, year) > 0)
        .collect();
    ranked.sort_by_key(|amb| (Reverse(amb.confirmed_referral_count), amb.created_at, amb.id));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, amb)| LeaderboardEntry {
            rank: index + 1,
            ambassador_id: amb.id,
            full_name: amb.full_name.clone(),
            referral_code: amb.referral_code.clone(),
            role: amb.role.clone(),
            confirmed_count: amb.confirmed_referral_count,
            tier_name: amb.tier_name.clone(),
        })
        .collect()
}

/// Per-campus lead statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampusStats {
    pub campus_id: i64,
    pub campus_name: String,
    pub campus_code: String,
    pub total: u64,
    pub confirmed: u64,
    pub rejected: u64,
    /// New plus Follow-up
    pub pending: u64,
    pub conversion_rate: f64,
    /// Ambassadors whose home campus this is
    pub ambassador_count: u64,
}

/// Compares campuses side by side, in the order given.
#[must_use]
pub fn campus_comparison(
    campuses: &[campus_entity::Model],
    leads: &[referral_lead::Model],
    ambassadors: &[ambassador::Model],
) -> Vec<CampusStats> {
    campuses
        .iter()
        .map(|campus| {
            let breakdown =
                status_breakdown(leads.iter().filter(|lead| lead.campus_id == campus.id));
            let ambassador_count = ambassadors
                .iter()
                .filter(|amb| amb.campus_id == Some(campus.id))
                .count() as u64;

            CampusStats {
                campus_id: campus.id,
                campus_name: campus.name.clone(),
                campus_code: campus.code.clone(),
                total: breakdown.total(),
                confirmed: breakdown.confirmed,
                rejected: breakdown.rejected,
                pending: breakdown.pending(),
                conversion_rate: breakdown.conversion_rate(),
                ambassador_count,
            }
        })
        .collect()
}

/// What an ambassador saves in `year`: own fee × year benefit. Zero when
/// the cached benefit belongs to an earlier year.
#[must_use]
pub fn estimated_savings(amb: &ambassador::Model, year: AcademicYear) -> f64 {
    if !is_cached_for(amb, year) {
        return 0.0;
    }
    amb.student_fee * amb.year_fee_benefit_percent / 100.0
}

/// Total estimated value across ambassadors for `year`.
#[must_use]
pub fn estimated_value(ambassadors: &[ambassador::Model], year: AcademicYear) -> f64 {
    ambassadors
        .iter()
        .map(|amb| estimated_savings(amb, year))
        .sum()
}

/// Headline figures for the operator dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub leads: StatusBreakdown,
    pub conversion_rate: f64,
    pub total_ambassadors: u64,
    pub active_ambassadors: u64,
    pub students: u64,
    pub estimated_value: f64,
    pub leads_by_role: Vec<RoleShare>,
    pub ambassadors_by_role: Vec<RoleShare>,
}

/// Builds the dashboard from already-loaded collections.
#[must_use]
pub fn dashboard_summary(
    rows: &[LeadRow],
    ambassadors: &[ambassador::Model],
    students: u64,
    year: AcademicYear,
) -> DashboardSummary {
    let leads = status_breakdown(rows.iter().map(|row| &row.lead));
    DashboardSummary {
        leads,
        conversion_rate: leads.conversion_rate(),
        total_ambassadors: ambassadors.len() as u64,
        active_ambassadors: ambassadors
            .iter()
            .filter(|amb| amb.status == AmbassadorStatus::Active.as_str())
            .count() as u64,
        students,
        estimated_value: estimated_value(ambassadors, year),
        leads_by_role: role_breakdown_of_leads(rows),
        ambassadors_by_role: role_breakdown_of_ambassadors(ambassadors),
    }
}

/// Loads and summarises leads matching `filter`, valuing benefits for `year`.
pub async fn load_dashboard<C>(
    db: &C,
    filter: &ReferralFilter,
    year: AcademicYear,
) -> Result<DashboardSummary>
where
    C: ConnectionTrait,
{
    let rows = referral::list_all_leads(db, filter).await?;
    let ambassadors = Ambassador::find().all(db).await?;
    let students = Student::find().count(db).await?;
    Ok(dashboard_summary(&rows, &ambassadors, students, year))
}

/// Loads the leaderboard for `year`.
pub async fn load_leaderboard<C>(
    db: &C,
    year: AcademicYear,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>>
where
    C: ConnectionTrait,
{
    let ambassadors = Ambassador::find().all(db).await?;
    Ok(leaderboard(&ambassadors, year, limit))
}

/// Loads the per-campus comparison.
pub async fn load_campus_comparison<C>(db: &C) -> Result<Vec<CampusStats>>
where
    C: ConnectionTrait,
{
    let campuses = campus::list_campuses(db).await?;
    let leads = crate::entities::ReferralLead::find().all(db).await?;
    let ambassadors = Ambassador::find().all(db).await?;
    Ok(campus_comparison(&campuses, &leads, &ambassadors))
}
