//! Benefit tier resolution and slab management.
//!
//! The resolver maps an ambassador's confirmed referrals to the fee benefit
//! they have earned. Resolution is pure: it only looks at the counts and the
//! tier table it is handed. Slab rows are persisted in `benefit_slabs` and
//! every write is checked against the table contract (strictly increasing
//! thresholds, non-decreasing percentages).

use crate::{
    core::academic_year::AcademicYear,
    entities::{BenefitSlab, benefit_slab},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};
use tracing::{info, instrument};

/// Name reported when no configured tier has been reached.
pub const BASE_TIER_NAME: &str = "Base";

/// Upper bound for any benefit percentage.
const MAX_PERCENT: f64 = 100.0;

/// One row of the tier table, detached from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitTier {
    /// Slab id, or 0 for tiers that were never persisted
    pub id: i64,
    pub tier_name: String,
    /// Minimum confirmed referrals to reach the tier
    pub referral_count: u32,
    pub year_fee_benefit_percent: f64,
    pub base_long_term_percent: f64,
    pub long_term_extra_percent: f64,
}

impl From<&benefit_slab::Model> for BenefitTier {
    fn from(slab: &benefit_slab::Model) -> Self {
        Self {
            id: slab.id,
            tier_name: slab.tier_name.clone(),
            referral_count: u32::try_from(slab.referral_count).unwrap_or(0),
            year_fee_benefit_percent: slab.year_fee_benefit_percent,
            base_long_term_percent: slab.base_long_term_percent,
            long_term_extra_percent: slab.long_term_extra_percent,
        }
    }
}

/// The tier an ambassador's count resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTier {
    /// Slab the result came from, `None` for the base tier
    pub slab_id: Option<i64>,
    pub tier_name: String,
    pub threshold: u32,
    pub year_fee_benefit_percent: f64,
    pub base_long_term_percent: f64,
    pub long_term_extra_percent: f64,
}

impl ResolvedTier {
    /// The zero tier: no benefit at all.
    #[must_use]
    pub fn base() -> Self {
        Self {
            slab_id: None,
            tier_name: BASE_TIER_NAME.to_string(),
            threshold: 0,
            year_fee_benefit_percent: 0.0,
            base_long_term_percent: 0.0,
            long_term_extra_percent: 0.0,
        }
    }
}

impl From<&BenefitTier> for ResolvedTier {
    fn from(tier: &BenefitTier) -> Self {
        Self {
            slab_id: Some(tier.id),
            tier_name: tier.tier_name.clone(),
            threshold: tier.referral_count,
            year_fee_benefit_percent: tier.year_fee_benefit_percent,
            base_long_term_percent: tier.base_long_term_percent,
            long_term_extra_percent: tier.long_term_extra_percent,
        }
    }
}

/// Whether an ambassador currently earns a benefit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BenefitStatus {
    Active,
    Inactive,
}

impl BenefitStatus {
    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for BenefitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenefitStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(Error::validation(format!("unknown benefit status '{other}'"))),
        }
    }
}

/// Benefit an ambassador holds for one academic year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenefitSnapshot {
    pub academic_year: AcademicYear,
    /// Confirmed referrals within `academic_year`
    pub confirmed_count: u32,
    pub tier_name: String,
    pub year_fee_benefit_percent: f64,
    pub long_term_benefit_percent: f64,
    pub benefit_status: BenefitStatus,
}

/// Orders qualifying tiers: higher threshold wins, then the larger benefit,
/// then the lower id so duplicate rows still resolve deterministically.
fn tier_precedence(a: &BenefitTier, b: &BenefitTier) -> Ordering {
    a.referral_count
        .cmp(&b.referral_count)
        .then(
            a.year_fee_benefit_percent
                .total_cmp(&b.year_fee_benefit_percent),
        )
        .then(b.id.cmp(&a.id))
}

/// Returns the highest tier whose threshold is at or below `count`.
///
/// Table order does not matter. A count below every threshold, or an empty
/// table, yields [`ResolvedTier::base`].
#[must_use]
pub fn resolve_tier(count: u32, tiers: &[BenefitTier]) -> ResolvedTier {
    tiers
        .iter()
        .filter(|tier| tier.referral_count <= count)
        .max_by(|a, b| tier_precedence(a, b))
        .map_or_else(ResolvedTier::base, ResolvedTier::from)
}

/// Computes the benefit for `current_year` from the per-year confirmed
/// referral history.
///
/// The year fee benefit depends only on the current year's count. The
/// long-term benefit needs confirmations in at least one earlier academic
/// year and at least one in the current year; it is derived from the tier
/// reached by the referrals carried over from earlier years, plus the
/// tier's extra percentage for every referral beyond that tier's threshold.
#[must_use]
pub fn resolve_benefit(
    history: &BTreeMap<AcademicYear, u32>,
    current_year: AcademicYear,
    tiers: &[BenefitTier],
) -> BenefitSnapshot {
    let current_count = history.get(&current_year).copied().unwrap_or(0);
    let carried_count: u32 = history.range(..current_year).map(|(_, count)| *count).sum();

    let current_tier = resolve_tier(current_count, tiers);

    let long_term_benefit_percent = if carried_count > 0 && current_count > 0 {
        let carried = resolve_tier(carried_count, tiers);
        let beyond = carried_count.saturating_sub(carried.threshold);
        (carried.base_long_term_percent + carried.long_term_extra_percent * f64::from(beyond))
            .min(MAX_PERCENT)
    } else {
        0.0
    };

    let benefit_status = if current_count > 0 {
        BenefitStatus::Active
    } else {
        BenefitStatus::Inactive
    };

    BenefitSnapshot {
        academic_year: current_year,
        confirmed_count: current_count,
        tier_name: current_tier.tier_name,
        year_fee_benefit_percent: if current_count > 0 {
            current_tier.year_fee_benefit_percent
        } else {
            0.0
        },
        long_term_benefit_percent,
        benefit_status,
    }
}

fn validate_percent(label: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=MAX_PERCENT).contains(&value) {
        return Err(Error::validation(format!(
            "{label} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

/// Checks a single tier's fields.
pub fn validate_tier(tier: &BenefitTier) -> Result<()> {
    if tier.tier_name.trim().is_empty() {
        return Err(Error::validation("Tier name cannot be empty"));
    }
    validate_percent("Year fee benefit", tier.year_fee_benefit_percent)?;
    validate_percent("Base long-term benefit", tier.base_long_term_percent)?;
    validate_percent("Long-term extra benefit", tier.long_term_extra_percent)?;
    Ok(())
}

/// Checks the whole table: thresholds strictly increasing and percentages
/// non-decreasing once sorted by threshold.
pub fn validate_tier_table(tiers: &[BenefitTier]) -> Result<()> {
    for tier in tiers {
        validate_tier(tier)?;
    }

    let mut sorted: Vec<&BenefitTier> = tiers.iter().collect();
    sorted.sort_by_key(|tier| tier.referral_count);

    for pair in sorted.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        if lower.referral_count == upper.referral_count {
            return Err(Error::validation(format!(
                "Tiers '{}' and '{}' share the threshold {}",
                lower.tier_name, upper.tier_name, upper.referral_count
            )));
        }
        if upper.year_fee_benefit_percent < lower.year_fee_benefit_percent
            || upper.base_long_term_percent < lower.base_long_term_percent
        {
            return Err(Error::validation(format!(
                "Tier '{}' ({} referrals) grants less than '{}' ({} referrals)",
                upper.tier_name, upper.referral_count, lower.tier_name, lower.referral_count
            )));
        }
    }
    Ok(())
}

/// Fields of a slab as supplied by an operator or the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewSlab {
    pub tier_name: String,
    pub referral_count: u32,
    pub year_fee_benefit_percent: f64,
    #[serde(default)]
    pub base_long_term_percent: f64,
    #[serde(default)]
    pub long_term_extra_percent: f64,
}

impl NewSlab {
    fn as_tier(&self, id: i64) -> BenefitTier {
        BenefitTier {
            id,
            tier_name: self.tier_name.trim().to_string(),
            referral_count: self.referral_count,
            year_fee_benefit_percent: self.year_fee_benefit_percent,
            base_long_term_percent: self.base_long_term_percent,
            long_term_extra_percent: self.long_term_extra_percent,
        }
    }

    fn active_model(&self) -> Result<benefit_slab::ActiveModel> {
        Ok(benefit_slab::ActiveModel {
            tier_name: Set(self.tier_name.trim().to_string()),
            referral_count: Set(i32::try_from(self.referral_count)?),
            year_fee_benefit_percent: Set(self.year_fee_benefit_percent),
            base_long_term_percent: Set(self.base_long_term_percent),
            long_term_extra_percent: Set(self.long_term_extra_percent),
            ..Default::default()
        })
    }
}

/// Checks a proposed table of new slabs against the table contract.
pub fn validate_new_slabs(slabs: &[NewSlab]) -> Result<()> {
    let table: Vec<BenefitTier> = slabs.iter().map(|slab| slab.as_tier(0)).collect();
    validate_tier_table(&table)
}

/// Retrieves every slab ordered by threshold.
pub async fn list_slabs<C>(db: &C) -> Result<Vec<benefit_slab::Model>>
where
    C: ConnectionTrait,
{
    BenefitSlab::find()
        .order_by_asc(benefit_slab::Column::ReferralCount)
        .order_by_asc(benefit_slab::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads the tier table used by the resolver.
pub async fn load_tier_table<C>(db: &C) -> Result<Vec<BenefitTier>>
where
    C: ConnectionTrait,
{
    Ok(list_slabs(db).await?.iter().map(BenefitTier::from).collect())
}

/// Adds a slab after checking the resulting table still honours the contract.
#[instrument(skip(db))]
pub async fn create_slab(db: &DatabaseConnection, slab: NewSlab) -> Result<benefit_slab::Model> {
    let mut table = load_tier_table(db).await?;
    table.push(slab.as_tier(0));
    validate_tier_table(&table)?;

    let created = slab.active_model()?.insert(db).await?;
    info!(
        "Created benefit slab '{}' at {} referrals",
        created.tier_name, created.referral_count
    );
    Ok(created)
}

/// Replaces an existing slab's fields, keeping the table contract.
#[instrument(skip(db))]
pub async fn update_slab(
    db: &DatabaseConnection,
    slab_id: i64,
    slab: NewSlab,
) -> Result<benefit_slab::Model> {
    let existing = BenefitSlab::find_by_id(slab_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Benefit slab", slab_id))?;

    let mut table: Vec<BenefitTier> = load_tier_table(db)
        .await?
        .into_iter()
        .filter(|tier| tier.id != slab_id)
        .collect();
    table.push(slab.as_tier(slab_id));
    validate_tier_table(&table)?;

    let mut active: benefit_slab::ActiveModel = existing.into();
    active.tier_name = Set(slab.tier_name.trim().to_string());
    active.referral_count = Set(i32::try_from(slab.referral_count)?);
    active.year_fee_benefit_percent = Set(slab.year_fee_benefit_percent);
    active.base_long_term_percent = Set(slab.base_long_term_percent);
    active.long_term_extra_percent = Set(slab.long_term_extra_percent);
    active.update(db).await.map_err(Into::into)
}

/// Removes a slab. Dropping a row cannot break monotonicity.
pub async fn delete_slab(db: &DatabaseConnection, slab_id: i64) -> Result<()> {
    let result = BenefitSlab::delete_by_id(slab_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Benefit slab", slab_id));
    }
    info!("Deleted benefit slab {slab_id}");
    Ok(())
}

/// Replaces the whole table in one transaction.
#[instrument(skip(db, slabs), fields(count = slabs.len()))]
pub async fn replace_slabs(
    db: &DatabaseConnection,
    slabs: &[NewSlab],
) -> Result<Vec<benefit_slab::Model>> {
    validate_new_slabs(slabs)?;

    let txn = db.begin().await?;
    BenefitSlab::delete_many().exec(&txn).await?;
    for slab in slabs {
        slab.active_model()?.insert(&txn).await?;
    }
    let stored = list_slabs(&txn).await?;
    txn.commit().await?;

    info!("Benefit slab table replaced with {} tiers", stored.len());
    Ok(stored)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn tier(id: i64, referral_count: u32, percent: f64) -> BenefitTier {
        BenefitTier {
            id,
            tier_name: format!("T{referral_count}"),
            referral_count,
            year_fee_benefit_percent: percent,
            base_long_term_percent: percent / 2.0,
            long_term_extra_percent: 1.0,
        }
    }

    fn five_step_table() -> Vec<BenefitTier> {
        vec![
            tier(1, 1, 5.0),
            tier(2, 2, 10.0),
            tier(3, 3, 25.0),
            tier(4, 4, 30.0),
            tier(5, 5, 50.0),
        ]
    }

    #[test]
    fn test_resolve_tier_picks_highest_qualifying() {
        let resolved = resolve_tier(4, &five_step_table());
        assert_eq!(resolved.year_fee_benefit_percent, 30.0);
        assert_eq!(resolved.tier_name, "T4");
        assert_eq!(resolved.slab_id, Some(4));
    }

    #[test]
    fn test_resolve_tier_below_lowest_threshold_is_base() {
        let resolved = resolve_tier(0, &five_step_table());
        assert_eq!(resolved, ResolvedTier::base());

        let empty = resolve_tier(10, &[]);
        assert_eq!(empty.tier_name, BASE_TIER_NAME);
        assert_eq!(empty.year_fee_benefit_percent, 0.0);
    }

    #[test]
    fn test_resolve_tier_ignores_table_order() {
        let mut shuffled = five_step_table();
        shuffled.reverse();
        shuffled.swap(0, 2);
        for count in 0..8 {
            assert_eq!(
                resolve_tier(count, &shuffled),
                resolve_tier(count, &five_step_table())
            );
        }
    }

    #[test]
    fn test_resolve_tier_duplicate_thresholds_are_deterministic() {
        let table = vec![tier(7, 2, 10.0), tier(3, 2, 12.0), tier(9, 2, 12.0)];
        let resolved = resolve_tier(2, &table);
        assert_eq!(resolved.year_fee_benefit_percent, 12.0);
        assert_eq!(resolved.slab_id, Some(3));
    }

    #[test]
    fn test_resolve_tier_is_idempotent_and_monotonic() {
        let table = five_step_table();
        let mut previous = 0.0;
        for count in 0..20 {
            let first = resolve_tier(count, &table);
            assert_eq!(first, resolve_tier(count, &table));
            assert!(first.year_fee_benefit_percent >= previous);
            previous = first.year_fee_benefit_percent;
        }
    }

    #[test]
    fn test_zero_referrals_is_inactive() {
        let table = vec![tier(1, 0, 0.0), tier(2, 1, 5.0), tier(3, 5, 50.0)];
        let history = BTreeMap::new();
        let snapshot = resolve_benefit(&history, AcademicYear::new(2025), &table);

        assert_eq!(snapshot.confirmed_count, 0);
        assert_eq!(snapshot.year_fee_benefit_percent, 0.0);
        assert_eq!(snapshot.long_term_benefit_percent, 0.0);
        assert_eq!(snapshot.benefit_status, BenefitStatus::Inactive);
    }

    #[test]
    fn test_long_term_requires_prior_year() {
        let table = vec![BenefitTier {
            id: 1,
            tier_name: "Five".to_string(),
            referral_count: 5,
            year_fee_benefit_percent: 50.0,
            base_long_term_percent: 15.0,
            long_term_extra_percent: 5.0,
        }];
        let year = AcademicYear::new(2025);

        // First program year: no long-term benefit however many referrals
        let first_year = BTreeMap::from([(year, 6)]);
        let snapshot = resolve_benefit(&first_year, year, &table);
        assert_eq!(snapshot.year_fee_benefit_percent, 50.0);
        assert_eq!(snapshot.long_term_benefit_percent, 0.0);

        // Second year with one referral unlocks 15% + 5% per referral beyond five
        let second_year = BTreeMap::from([(year.previous(), 7), (year, 1)]);
        let snapshot = resolve_benefit(&second_year, year, &table);
        assert_eq!(snapshot.long_term_benefit_percent, 25.0);
        assert_eq!(snapshot.benefit_status, BenefitStatus::Active);
    }

    #[test]
    fn test_long_term_decays_without_current_year_referral() {
        let table = vec![tier(1, 1, 5.0), tier(5, 5, 50.0)];
        let year = AcademicYear::new(2025);
        let history = BTreeMap::from([(year.previous(), 5)]);

        let snapshot = resolve_benefit(&history, year, &table);
        assert_eq!(snapshot.long_term_benefit_percent, 0.0);
        assert_eq!(snapshot.benefit_status, BenefitStatus::Inactive);
    }

    #[test]
    fn test_future_years_do_not_count() {
        let table = five_step_table();
        let year = AcademicYear::new(2025);
        let history = BTreeMap::from([(year.next(), 5), (year, 1)]);

        let snapshot = resolve_benefit(&history, year, &table);
        assert_eq!(snapshot.confirmed_count, 1);
        assert_eq!(snapshot.long_term_benefit_percent, 0.0);
    }

    #[test]
    fn test_validate_tier_table_rejects_non_monotonic() {
        assert!(validate_tier_table(&five_step_table()).is_ok());
        assert!(validate_tier_table(&[]).is_ok());

        let duplicate = vec![tier(1, 2, 10.0), tier(2, 2, 20.0)];
        assert!(matches!(
            validate_tier_table(&duplicate),
            Err(Error::Validation { .. })
        ));

        let decreasing = vec![tier(1, 1, 20.0), tier(2, 2, 10.0)];
        assert!(matches!(
            validate_tier_table(&decreasing),
            Err(Error::Validation { .. })
        ));

        let out_of_range = vec![tier(1, 1, 120.0)];
        assert!(validate_tier_table(&out_of_range).is_err());
    }

    #[tokio::test]
    async fn test_create_slab_enforces_contract() -> Result<()> {
        let db = setup_test_db().await?;
        seed_test_tiers(&db).await?;

        let bad = NewSlab {
            tier_name: "Cheaper".to_string(),
            referral_count: 10,
            year_fee_benefit_percent: 1.0,
            base_long_term_percent: 0.0,
            long_term_extra_percent: 0.0,
        };
        assert!(matches!(
            create_slab(&db, bad).await,
            Err(Error::Validation { .. })
        ));

        let good = NewSlab {
            tier_name: "Platinum".to_string(),
            referral_count: 10,
            year_fee_benefit_percent: 75.0,
            base_long_term_percent: 20.0,
            long_term_extra_percent: 5.0,
        };
        let created = create_slab(&db, good).await?;
        assert_eq!(created.referral_count, 10);

        let slabs = list_slabs(&db).await?;
        assert_eq!(slabs.last().unwrap().tier_name, "Platinum");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete_slab() -> Result<()> {
        let db = setup_test_db().await?;
        let slabs = seed_test_tiers(&db).await?;
        let middle = &slabs[1];

        let updated = update_slab(
            &db,
            middle.id,
            NewSlab {
                tier_name: "Silver+".to_string(),
                referral_count: middle.referral_count.try_into().unwrap(),
                year_fee_benefit_percent: middle.year_fee_benefit_percent + 1.0,
                base_long_term_percent: middle.base_long_term_percent,
                long_term_extra_percent: middle.long_term_extra_percent,
            },
        )
        .await?;
        assert_eq!(updated.tier_name, "Silver+");

        delete_slab(&db, middle.id).await?;
        assert_eq!(list_slabs(&db).await?.len(), slabs.len() - 1);

        assert!(matches!(
            delete_slab(&db, middle.id).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }
}
