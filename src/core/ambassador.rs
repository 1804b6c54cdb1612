//! Ambassador business logic - registration, lookups, status and benefits.
//!
//! Ambassadors are the long-lived aggregate of the program: every referral
//! lead belongs to exactly one of them. The benefit columns on the row are a
//! cache of [`tier::resolve_benefit`] for one academic year and are only ever
//! written by [`recompute_ambassador_benefits`].

use crate::{
    core::{
        academic_year::AcademicYear,
        lifecycle::ReferralStatus,
        tier::{self, BenefitSnapshot},
    },
    entities::{Ambassador, ReferralLead, Student, ambassador, referral_lead, student},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use tracing::{debug, info, instrument, warn};

/// Who an ambassador is in relation to the school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Parent,
    Staff,
    Alumni,
}

impl Role {
    /// Every role, in display order
    pub const ALL: [Self; 3] = [Self::Parent, Self::Staff, Self::Alumni];

    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "Parent",
            Self::Staff => "Staff",
            Self::Alumni => "Alumni",
        }
    }

    const fn code_prefix(self) -> char {
        match self {
            Self::Parent => 'P',
            Self::Staff => 'S',
            Self::Alumni => 'A',
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parent" => Ok(Self::Parent),
            "staff" => Ok(Self::Staff),
            "alumni" | "alumnus" => Ok(Self::Alumni),
            other => Err(Error::validation(format!(
                "Unknown role '{other}' (expected Parent, Staff or Alumni)"
            ))),
        }
    }
}

/// Whether an ambassador's referral code may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmbassadorStatus {
    Active,
    Inactive,
}

impl AmbassadorStatus {
    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for AmbassadorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmbassadorStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(Error::validation(format!("Unknown ambassador status '{other}'"))),
        }
    }
}

/// Registration data for a new ambassador.
#[derive(Debug, Clone)]
pub struct NewAmbassador {
    pub full_name: String,
    pub mobile: String,
    pub role: Role,
    pub campus_id: Option<i64>,
    /// Annual fee of the ambassador's own child, used for savings estimates
    pub student_fee: f64,
    /// Custom code; generated from role, year and id when absent
    pub referral_code: Option<String>,
}

/// Contact fields an operator may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct AmbassadorUpdate {
    pub full_name: Option<String>,
    pub mobile: Option<String>,
    pub campus_id: Option<i64>,
    pub student_fee: Option<f64>,
}

impl AmbassadorUpdate {
    const fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.mobile.is_none()
            && self.campus_id.is_none()
            && self.student_fee.is_none()
    }
}

/// Normalizes a mobile number: strips spaces and dashes, keeps a leading `+`,
/// and requires 10 to 15 digits.
pub fn normalize_mobile(mobile: &str) -> Result<String> {
    let trimmed = mobile.trim();
    let (plus, rest) = trimmed
        .strip_prefix('+')
        .map_or(("", trimmed), |rest| ("+", rest));
    let digits: String = rest.chars().filter(|c| !matches!(c, ' ' | '-')).collect();

    if !digits.chars().all(|c| c.is_ascii_digit()) || !(10..=15).contains(&digits.len()) {
        return Err(Error::validation(format!(
            "Invalid mobile number '{trimmed}'"
        )));
    }
    Ok(format!("{plus}{digits}"))
}

/// Whether `code` has the shape of a generated code: a role prefix followed
/// by the two-digit year and the ambassador id.
fn looks_generated(code: &str) -> bool {
    let mut chars = code.chars();
    let prefixed = chars
        .next()
        .is_some_and(|first| Role::ALL.iter().any(|role| role.code_prefix() == first));
    let digits = chars.as_str();
    prefixed && digits.len() >= 6 && digits.chars().all(|c| c.is_ascii_digit())
}

fn normalize_referral_code(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(Error::validation(format!("Invalid referral code '{code}'")));
    }
    if looks_generated(&code) {
        return Err(Error::validation(format!(
            "Referral code {code} is reserved for generated codes"
        )));
    }
    Ok(code)
}

fn validate_fee(fee: f64) -> Result<()> {
    if !fee.is_finite() || fee < 0.0 {
        return Err(Error::validation(format!(
            "Fee must be a non-negative amount, got {fee}"
        )));
    }
    Ok(())
}

/// Builds the shareable referral link for a code.
#[must_use]
pub fn referral_link(base_url: &str, referral_code: &str) -> String {
    format!("{}?ref={referral_code}", base_url.trim_end_matches('/'))
}

/// Finds an ambassador by id.
pub async fn get_ambassador<C>(db: &C, ambassador_id: i64) -> Result<Option<ambassador::Model>>
where
    C: ConnectionTrait,
{
    Ambassador::find_by_id(ambassador_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an ambassador by referral code (case-insensitive input).
pub async fn get_ambassador_by_code<C>(db: &C, code: &str) -> Result<Option<ambassador::Model>>
where
    C: ConnectionTrait,
{
    Ambassador::find()
        .filter(ambassador::Column::ReferralCode.eq(code.trim().to_ascii_uppercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an ambassador by mobile number.
pub async fn get_ambassador_by_mobile<C>(db: &C, mobile: &str) -> Result<Option<ambassador::Model>>
where
    C: ConnectionTrait,
{
    let mobile = normalize_mobile(mobile)?;
    Ambassador::find()
        .filter(ambassador::Column::Mobile.eq(mobile))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists ambassadors alphabetically, optionally restricted to one role and
/// status.
pub async fn list_ambassadors<C>(
    db: &C,
    role: Option<Role>,
    status: Option<AmbassadorStatus>,
) -> Result<Vec<ambassador::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Ambassador::find();
    if let Some(role) = role {
        query = query.filter(ambassador::Column::Role.eq(role.as_str()));
    }
    if let Some(status) = status {
        query = query.filter(ambassador::Column::Status.eq(status.as_str()));
    }
    query
        .order_by_asc(ambassador::Column::FullName)
        .order_by_asc(ambassador::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Inserts an ambassador on an existing connection or transaction.
///
/// Used directly by lead conversion, which creates parent ambassadors inside
/// its own transaction.
pub(crate) async fn insert_ambassador<C>(
    db: &C,
    new: NewAmbassador,
    year: AcademicYear,
) -> Result<ambassador::Model>
where
    C: ConnectionTrait,
{
    let full_name = new.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(Error::validation("Ambassador name cannot be empty"));
    }
    let mobile = normalize_mobile(&new.mobile)?;
    validate_fee(new.student_fee)?;

    if get_ambassador_by_mobile(db, &mobile).await?.is_some() {
        return Err(Error::validation(format!(
            "Mobile number {mobile} is already registered"
        )));
    }

    let custom_code = new
        .referral_code
        .as_deref()
        .map(normalize_referral_code)
        .transpose()?;
    if let Some(code) = &custom_code {
        if get_ambassador_by_code(db, code).await?.is_some() {
            return Err(Error::validation(format!(
                "Referral code {code} is already taken"
            )));
        }
    }

    if let Some(campus_id) = new.campus_id {
        crate::core::campus::require_campus(db, campus_id).await?;
    }

    let now = Utc::now();
    let placeholder = custom_code
        .clone()
        .unwrap_or_else(|| format!("PENDING-{mobile}"));

    let inserted = ambassador::ActiveModel {
        full_name: Set(full_name),
        mobile: Set(mobile),
        role: Set(new.role.as_str().to_string()),
        referral_code: Set(placeholder),
        status: Set(AmbassadorStatus::Active.as_str().to_string()),
        campus_id: Set(new.campus_id),
        student_fee: Set(new.student_fee),
        confirmed_referral_count: Set(0),
        benefit_academic_year: Set(year.start_year()),
        year_fee_benefit_percent: Set(0.0),
        long_term_benefit_percent: Set(0.0),
        benefit_status: Set(tier::BenefitStatus::Inactive.as_str().to_string()),
        tier_name: Set(tier::BASE_TIER_NAME.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let result = if custom_code.is_some() {
        inserted
    } else {
        let code = format!(
            "{}{:02}{:04}",
            new.role.code_prefix(),
            year.start_year().rem_euclid(100),
            inserted.id
        );
        if get_ambassador_by_code(db, &code).await?.is_some() {
            return Err(Error::validation(format!(
                "Generated referral code {code} is already taken"
            )));
        }
        let mut active: ambassador::ActiveModel = inserted.into();
        active.referral_code = Set(code);
        active.update(db).await?
    };

    info!(
        "Registered {} ambassador {} with code {}",
        result.role, result.id, result.referral_code
    );
    Ok(result)
}

/// Registers a new, active ambassador.
#[instrument(skip(db))]
pub async fn create_ambassador(
    db: &DatabaseConnection,
    new: NewAmbassador,
    year: AcademicYear,
) -> Result<ambassador::Model> {
    let txn = db.begin().await?;
    let created = insert_ambassador(&txn, new, year).await?;
    txn.commit().await?;
    Ok(created)
}

/// Updates contact fields. Attribution and benefit columns are not editable.
#[instrument(skip(db))]
pub async fn update_ambassador(
    db: &DatabaseConnection,
    ambassador_id: i64,
    update: AmbassadorUpdate,
) -> Result<ambassador::Model> {
    if update.is_empty() {
        return Err(Error::validation(
            "Specify at least one field to update (name, mobile, campus or fee)",
        ));
    }

    let existing = get_ambassador(db, ambassador_id)
        .await?
        .ok_or_else(|| Error::not_found("Ambassador", ambassador_id))?;
    let mut active: ambassador::ActiveModel = existing.clone().into();

    if let Some(name) = update.full_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("Ambassador name cannot be empty"));
        }
        active.full_name = Set(name);
    }
    if let Some(mobile) = update.mobile {
        let mobile = normalize_mobile(&mobile)?;
        if mobile != existing.mobile && get_ambassador_by_mobile(db, &mobile).await?.is_some() {
            return Err(Error::validation(format!(
                "Mobile number {mobile} is already registered"
            )));
        }
        active.mobile = Set(mobile);
    }
    if let Some(campus_id) = update.campus_id {
        crate::core::campus::require_campus(db, campus_id).await?;
        active.campus_id = Set(Some(campus_id));
    }
    if let Some(fee) = update.student_fee {
        validate_fee(fee)?;
        active.student_fee = Set(fee);
    }
    active.updated_at = Set(Utc::now());

    active.update(db).await.map_err(Into::into)
}

/// Soft-enables or soft-disables an ambassador's referral code.
#[instrument(skip(db))]
pub async fn set_ambassador_status(
    db: &DatabaseConnection,
    ambassador_id: i64,
    status: AmbassadorStatus,
) -> Result<ambassador::Model> {
    let existing = get_ambassador(db, ambassador_id)
        .await?
        .ok_or_else(|| Error::not_found("Ambassador", ambassador_id))?;

    let mut active: ambassador::ActiveModel = existing.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    info!("Ambassador {ambassador_id} is now {status}");
    Ok(updated)
}

/// Hard-deletes an ambassador together with all of their referral leads.
///
/// Students are never deleted, so an ambassador recorded as a student's
/// parent cannot be removed; deactivate them instead. Returns the number of
/// leads removed.
#[instrument(skip(db))]
pub async fn delete_ambassador(db: &DatabaseConnection, ambassador_id: i64) -> Result<u64> {
    let txn = db.begin().await?;

    get_ambassador(&txn, ambassador_id)
        .await?
        .ok_or_else(|| Error::not_found("Ambassador", ambassador_id))?;

    let children = Student::find()
        .filter(student::Column::ParentAmbassadorId.eq(ambassador_id))
        .count(&txn)
        .await?;
    if children > 0 {
        return Err(Error::validation(format!(
            "Ambassador {ambassador_id} is the parent of {children} student(s); deactivate instead"
        )));
    }

    let leads = ReferralLead::delete_many()
        .filter(referral_lead::Column::AmbassadorId.eq(ambassador_id))
        .exec(&txn)
        .await?;
    Ambassador::delete_by_id(ambassador_id).exec(&txn).await?;
    txn.commit().await?;

    warn!(
        "Deleted ambassador {ambassador_id} and {} referral lead(s)",
        leads.rows_affected
    );
    Ok(leads.rows_affected)
}

/// Confirmed referral counts per academic year for one ambassador.
pub async fn confirmed_history<C>(db: &C, ambassador_id: i64) -> Result<BTreeMap<AcademicYear, u32>>
where
    C: ConnectionTrait,
{
    let confirmed = ReferralLead::find()
        .filter(referral_lead::Column::AmbassadorId.eq(ambassador_id))
        .filter(referral_lead::Column::Status.eq(ReferralStatus::Confirmed.as_str()))
        .all(db)
        .await?;

    let mut history = BTreeMap::new();
    for lead in confirmed {
        if let Some(year) = lead.confirmed_academic_year {
            *history.entry(AcademicYear::new(year)).or_insert(0) += 1;
        }
    }
    Ok(history)
}

/// Writes a benefit snapshot into the ambassador's cached columns.
async fn store_snapshot<C>(
    db: &C,
    existing: ambassador::Model,
    snapshot: &BenefitSnapshot,
) -> Result<ambassador::Model>
where
    C: ConnectionTrait,
{
    let mut active: ambassador::ActiveModel = existing.into();
    active.confirmed_referral_count = Set(i32::try_from(snapshot.confirmed_count)?);
    active.benefit_academic_year = Set(snapshot.academic_year.start_year());
    active.year_fee_benefit_percent = Set(snapshot.year_fee_benefit_percent);
    active.long_term_benefit_percent = Set(snapshot.long_term_benefit_percent);
    active.benefit_status = Set(snapshot.benefit_status.as_str().to_string());
    active.tier_name = Set(snapshot.tier_name.clone());
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Recomputes and stores an ambassador's benefit for `year` from their
/// confirmed referral history and the current tier table.
pub async fn recompute_ambassador_benefits<C>(
    db: &C,
    ambassador_id: i64,
    year: AcademicYear,
) -> Result<ambassador::Model>
where
    C: ConnectionTrait,
{
    let existing = get_ambassador(db, ambassador_id)
        .await?
        .ok_or_else(|| Error::not_found("Ambassador", ambassador_id))?;
    let tiers = tier::load_tier_table(db).await?;
    let history = confirmed_history(db, ambassador_id).await?;
    let snapshot = tier::resolve_benefit(&history, year, &tiers);

    debug!(
        "Ambassador {ambassador_id}: {} confirmed in {year}, tier {}",
        snapshot.confirmed_count, snapshot.tier_name
    );
    store_snapshot(db, existing, &snapshot).await
}

/// Recomputes every ambassador's benefit, e.g. after the slab table changed.
/// Returns the number of ambassadors processed.
#[instrument(skip(db))]
pub async fn recompute_all_ambassadors(db: &DatabaseConnection, year: AcademicYear) -> Result<usize> {
    let txn = db.begin().await?;
    let ambassadors = Ambassador::find().all(&txn).await?;
    let tiers = tier::load_tier_table(&txn).await?;

    for existing in &ambassadors {
        let history = confirmed_history(&txn, existing.id).await?;
        let snapshot = tier::resolve_benefit(&history, year, &tiers);
        store_snapshot(&txn, existing.clone(), &snapshot).await?;
    }
    txn.commit().await?;

    info!("Recomputed benefits for {} ambassadors", ambassadors.len());
    Ok(ambassadors.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_normalize_mobile() {
        assert_eq!(normalize_mobile(" 98400 12345 ").unwrap(), "9840012345");
        assert_eq!(normalize_mobile("+91-98400-12345").unwrap(), "+919840012345");
        assert!(normalize_mobile("12345").is_err());
        assert!(normalize_mobile("98400abcde").is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("parent".parse::<Role>().unwrap(), Role::Parent);
        assert_eq!(" STAFF ".parse::<Role>().unwrap(), Role::Staff);
        assert!("principal".parse::<Role>().is_err());
    }

    #[test]
    fn test_referral_link() {
        assert_eq!(
            referral_link("https://school.example/refer/", "P250001"),
            "https://school.example/refer?ref=P250001"
        );
    }

    #[tokio::test]
    async fn test_create_ambassador_generates_code() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_ambassador(&db, "Priya", "9840000001", Role::Parent).await?;

        assert_eq!(created.referral_code, format!("P25{:04}", created.id));
        assert_eq!(created.status, "Active");
        assert_eq!(created.benefit_status, "Inactive");
        assert_eq!(created.confirmed_referral_count, 0);

        let found = get_ambassador_by_code(&db, &created.referral_code.to_lowercase()).await?;
        assert_eq!(found.unwrap().id, created.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_ambassador_rejects_duplicate_mobile() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_ambassador(&db, "Priya", "9840000001", Role::Parent).await?;

        let result = create_test_ambassador(&db, "Someone Else", "98400 00001", Role::Staff).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_referral_code() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_ambassador(
            &db,
            NewAmbassador {
                full_name: "Ravi".to_string(),
                mobile: "9840000002".to_string(),
                role: Role::Alumni,
                campus_id: None,
                student_fee: 0.0,
                referral_code: Some("ravi-2025".to_string()),
            },
            test_year(),
        )
        .await?;
        assert_eq!(created.referral_code, "RAVI-2025");
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_code_cannot_take_generated_shape() -> Result<()> {
        let db = setup_test_db().await?;
        let squatter = create_ambassador(
            &db,
            NewAmbassador {
                full_name: "Ravi".to_string(),
                mobile: "9840000002".to_string(),
                role: Role::Alumni,
                campus_id: None,
                student_fee: 0.0,
                referral_code: Some("p250002".to_string()),
            },
            test_year(),
        )
        .await;
        assert!(matches!(squatter, Err(Error::Validation { .. })));
        assert!(squatter.unwrap_err().is_expected());

        let first = create_test_ambassador(&db, "Priya", "9840000001", Role::Parent).await?;
        let second = create_test_ambassador(&db, "Kumar", "9840000003", Role::Parent).await?;
        assert_ne!(first.referral_code, second.referral_code);
        assert_eq!(second.referral_code, format!("P25{:04}", second.id));
        Ok(())
    }

    #[test]
    fn test_generated_code_shape() {
        assert!(looks_generated("P250002"));
        assert!(looks_generated("S2512345"));
        assert!(!looks_generated("RAVI-2025"));
        assert!(!looks_generated("P25"));
        assert!(!looks_generated("X250002"));
    }

    #[tokio::test]
    async fn test_update_and_deactivate() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_ambassador(&db, "Priya", "9840000001", Role::Parent).await?;

        let updated = update_ambassador(
            &db,
            created.id,
            AmbassadorUpdate {
                full_name: Some("Priya R".to_string()),
                student_fee: Some(80_000.0),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.full_name, "Priya R");
        assert_eq!(updated.student_fee, 80_000.0);

        let empty = update_ambassador(&db, created.id, AmbassadorUpdate::default()).await;
        assert!(matches!(empty, Err(Error::Validation { .. })));

        let inactive = set_ambassador_status(&db, created.id, AmbassadorStatus::Inactive).await?;
        assert_eq!(inactive.status, "Inactive");
        assert_eq!(
            list_ambassadors(&db, None, Some(AmbassadorStatus::Active))
                .await?
                .len(),
            0
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_ambassador_cascades_to_leads() -> Result<()> {
        let db = setup_test_db().await?;
        let campus = create_test_campus(&db, "ADYAR").await?;
        let amb = create_test_ambassador(&db, "Priya", "9840000001", Role::Parent).await?;
        create_test_lead(&db, &amb, &campus).await?;
        create_test_lead(&db, &amb, &campus).await?;

        let removed = delete_ambassador(&db, amb.id).await?;
        assert_eq!(removed, 2);
        assert!(get_ambassador(&db, amb.id).await?.is_none());
        assert_eq!(ReferralLead::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_recompute_counts_only_current_year() -> Result<()> {
        let db = setup_test_db().await?;
        seed_test_tiers(&db).await?;
        let campus = create_test_campus(&db, "ADYAR").await?;
        let amb = create_test_ambassador(&db, "Priya", "9840000001", Role::Parent).await?;

        // Two confirmations last year, one this year
        for _ in 0..2 {
            let lead = create_test_lead(&db, &amb, &campus).await?;
            confirm_test_lead(&db, lead.id, test_year().previous()).await?;
        }
        let lead = create_test_lead(&db, &amb, &campus).await?;
        confirm_test_lead(&db, lead.id, test_year()).await?;

        let refreshed = recompute_ambassador_benefits(&db, amb.id, test_year()).await?;
        assert_eq!(refreshed.confirmed_referral_count, 1);
        assert_eq!(refreshed.benefit_status, "Active");
        assert_eq!(refreshed.year_fee_benefit_percent, 5.0);
        assert_eq!(refreshed.benefit_academic_year, 2025);

        let history = confirmed_history(&db, amb.id).await?;
        assert_eq!(history.get(&test_year().previous()), Some(&2));
        Ok(())
    }
}
