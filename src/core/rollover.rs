//! Academic-year rollover.
//!
//! When a new academic year starts, every ambassador's cached benefit is
//! recomputed against the new year: the confirmed count drops to the new
//! year's confirmations, the year benefit follows it, and the long-term
//! benefit unlocks or decays. The last processed year is kept in the
//! `system_state` table so the rollover runs once per year.

use crate::{
    core::{academic_year::AcademicYear, ambassador},
    entities::{Ambassador, SystemState, system_state},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::fmt::Write;
use tracing::{info, instrument};

const LAST_ROLLOVER_KEY: &str = "last_academic_year_rollover";

/// How one ambassador's cached benefit changed.
#[derive(Debug, Clone)]
pub struct AmbassadorRollover {
    pub ambassador_id: i64,
    pub full_name: String,
    pub old_count: i32,
    pub new_count: i32,
    pub old_tier: String,
    pub new_tier: String,
    pub long_term_benefit_percent: f64,
}

/// Outcome of a rollover run.
#[derive(Debug, Clone)]
pub struct RolloverResult {
    pub academic_year: AcademicYear,
    /// Year processed by the previous run, if any
    pub previous_year: Option<AcademicYear>,
    pub ambassadors: Vec<AmbassadorRollover>,
    /// Ambassadors whose year benefit went inactive
    pub deactivated_count: usize,
    /// Ambassadors holding a long-term benefit in the new year
    pub long_term_count: usize,
}

/// Academic year recorded by the last rollover.
pub async fn last_rollover_year<C>(db: &C) -> Result<Option<AcademicYear>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_ROLLOVER_KEY))
        .one(db)
        .await?;

    state
        .map(|s| {
            s.value
                .parse::<i32>()
                .map(AcademicYear::new)
                .map_err(|e| Error::Config {
                    message: format!("Failed to parse last rollover year '{}': {e}", s.value),
                })
        })
        .transpose()
}

async fn set_last_rollover_year<C>(db: &C, year: AcademicYear) -> Result<()>
where
    C: ConnectionTrait,
{
    let value = year.start_year().to_string();
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_ROLLOVER_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active: system_state::ActiveModel = state.into();
        active.value = Set(value);
        active.updated_at = Set(now);
        active.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(LAST_ROLLOVER_KEY.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// True when `current` is later than the last processed year, or nothing
/// has been processed yet.
pub async fn is_rollover_needed(db: &DatabaseConnection, current: AcademicYear) -> Result<bool> {
    Ok(last_rollover_year(db)
        .await?
        .is_none_or(|last| last < current))
}

/// Rolls every ambassador over to `current`.
///
/// Returns `Ok(None)` when `current` was already processed, unless `force`
/// is set. All ambassadors are updated in one transaction.
#[instrument(skip(db))]
pub async fn process_rollover(
    db: &DatabaseConnection,
    current: AcademicYear,
    force: bool,
) -> Result<Option<RolloverResult>> {
    if !force && !is_rollover_needed(db, current).await? {
        return Ok(None);
    }

    let txn = db.begin().await?;
    let previous_year = last_rollover_year(&txn).await?;
    let before = Ambassador::find()
        .order_by_asc(crate::entities::ambassador::Column::Id)
        .all(&txn)
        .await?;

    let mut ambassadors = Vec::with_capacity(before.len());
    let mut deactivated_count = 0;
    let mut long_term_count = 0;

    for old in before {
        let new = ambassador::recompute_ambassador_benefits(&txn, old.id, current).await?;
        if old.benefit_status == "Active" && new.benefit_status != "Active" {
            deactivated_count += 1;
        }
        if new.long_term_benefit_percent > 0.0 {
            long_term_count += 1;
        }
        ambassadors.push(AmbassadorRollover {
            ambassador_id: old.id,
            full_name: old.full_name,
            old_count: old.confirmed_referral_count,
            new_count: new.confirmed_referral_count,
            old_tier: old.tier_name,
            new_tier: new.tier_name,
            long_term_benefit_percent: new.long_term_benefit_percent,
        });
    }

    set_last_rollover_year(&txn, current).await?;
    txn.commit().await?;

    info!(
        "Academic year rollover to {current}: {} ambassadors, {deactivated_count} deactivated",
        ambassadors.len()
    );
    Ok(Some(RolloverResult {
        academic_year: current,
        previous_year,
        ambassadors,
        deactivated_count,
        long_term_count,
    }))
}

/// Human-readable summary of a rollover.
pub fn format_rollover_summary(result: &RolloverResult) -> Result<String> {
    let mut summary = format!(
        "Academic year rollover - {} - {} ambassadors\n",
        result.academic_year,
        result.ambassadors.len()
    );
    if let Some(previous) = result.previous_year {
        writeln!(summary, "  Previous year: {previous}")?;
    }
    writeln!(
        summary,
        "  Benefit deactivated: {} | Long-term benefit: {}\n",
        result.deactivated_count, result.long_term_count
    )?;

    for change in &result.ambassadors {
        writeln!(
            summary,
            "  {} - {} ({}) → {} ({}), long-term {:.1}%",
            change.full_name,
            change.old_count,
            change.old_tier,
            change.new_count,
            change.new_tier,
            change.long_term_benefit_percent
        )?;
    }
    Ok(summary)
}
