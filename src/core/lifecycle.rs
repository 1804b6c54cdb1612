//! Referral lifecycle - the state machine every lead moves through.
//!
//! ```text
//! New ──► Follow-up
//!  │          │
//!  ├──────────┴──► Confirmed ──► (converted to Student, status unchanged)
//!  └──────────┴──► Rejected
//! ```
//!
//! Every status change is a conditional update keyed on the lead's current
//! status, so two operators racing on the same lead cannot both succeed.
//! Confirmation and deletion refresh the owning ambassador's cached benefit
//! inside the same transaction. Bulk operations are best effort: each lead is
//! processed on its own and failures are collected into a [`BulkReport`].

use crate::{
    core::{academic_year::AcademicYear, ambassador, campus},
    entities::{ReferralLead, ambassador as ambassador_entity, referral_lead},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{info, instrument, warn};

/// Status of a referral lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferralStatus {
    New,
    FollowUp,
    Confirmed,
    Rejected,
}

impl ReferralStatus {
    /// Every status, in lifecycle order
    pub const ALL: [Self; 4] = [Self::New, Self::FollowUp, Self::Confirmed, Self::Rejected];

    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::FollowUp => "Follow-up",
            Self::Confirmed => "Confirmed",
            Self::Rejected => "Rejected",
        }
    }

    /// Still being worked on (New or Follow-up).
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::New | Self::FollowUp)
    }

    /// Whether the state machine has an edge from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::FollowUp)
                | (Self::New | Self::FollowUp, Self::Confirmed | Self::Rejected)
        )
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "follow-up" | "follow up" | "followup" => Ok(Self::FollowUp),
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::validation(format!("Unknown referral status '{other}'"))),
        }
    }
}

/// Fee payment plan chosen at confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeePlan {
    /// One-time payment
    Otp,
    /// Without one-time payment (installments)
    Wotp,
}

impl FeePlan {
    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Otp => "OTP",
            Self::Wotp => "WOTP",
        }
    }
}

impl fmt::Display for FeePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeePlan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OTP" => Ok(Self::Otp),
            "WOTP" => Ok(Self::Wotp),
            other => Err(Error::validation(format!(
                "Unknown fee plan '{other}' (expected OTP or WOTP)"
            ))),
        }
    }
}

/// Parses the stored status of a lead.
pub fn status_of(lead: &referral_lead::Model) -> Result<ReferralStatus> {
    lead.status.parse()
}

/// Operator input for "Confirm Admission".
#[derive(Debug, Clone)]
pub struct ConfirmAdmission {
    /// ERP/admission number issued by the school
    pub admission_number: String,
    /// Plan to confirm under; falls back to the lead's preferred plan
    pub fee_plan: Option<FeePlan>,
    /// Explicit annual fee; looked up from the campus fee table when absent
    pub annual_fee: Option<f64>,
}

/// Result of a successful confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub lead: referral_lead::Model,
    /// Owning ambassador with refreshed benefit columns
    pub ambassador: ambassador_entity::Model,
}

/// Subject fields an operator may edit at any status. `None` leaves a field
/// untouched; an empty `student_name` or `notes` clears it.
#[derive(Debug, Clone, Default)]
pub struct ReferralUpdate {
    pub parent_name: Option<String>,
    pub parent_mobile: Option<String>,
    pub student_name: Option<String>,
    pub grade: Option<String>,
    pub campus_id: Option<i64>,
    pub notes: Option<String>,
    pub preferred_fee_plan: Option<FeePlan>,
}

impl ReferralUpdate {
    const fn is_empty(&self) -> bool {
        self.parent_name.is_none()
            && self.parent_mobile.is_none()
            && self.student_name.is_none()
            && self.grade.is_none()
            && self.campus_id.is_none()
            && self.notes.is_none()
            && self.preferred_fee_plan.is_none()
    }
}

/// Partial-success tally of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// Leads the operation succeeded on
    pub processed: usize,
    /// One `"Lead {id}: {reason}"` entry per failed lead
    pub errors: Vec<String>,
}

impl BulkReport {
    /// Counts one successful item.
    pub const fn record_success(&mut self) {
        self.processed += 1;
    }

    /// Records why one item failed.
    pub fn record_failure(&mut self, lead_id: i64, error: &Error) {
        warn!("Bulk item failed for lead {lead_id}: {error}");
        self.errors
            .push(format!("Lead {lead_id}: {}", failure_reason(error)));
    }

    /// Folds one item's outcome into the tally.
    pub fn record<T>(&mut self, lead_id: i64, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.record_success(),
            Err(error) => self.record_failure(lead_id, error),
        }
    }

    /// True when no item failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Short operator-facing reason for a failed bulk item.
#[must_use]
pub fn failure_reason(error: &Error) -> String {
    match error {
        Error::InvalidTransition { .. } => "invalid state".to_string(),
        Error::NotFound { .. } => "not found".to_string(),
        Error::AlreadyConverted { .. } => "already converted".to_string(),
        Error::NotConfirmed { .. } => "not confirmed".to_string(),
        Error::Validation { message } => message.clone(),
        other => other.to_string(),
    }
}

/// Parses a list of lead ids such as `"12, 15 18"`.
pub fn parse_lead_ids(input: &str) -> Result<Vec<i64>> {
    let ids = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .trim_start_matches('#')
                .parse::<i64>()
                .map_err(|_| Error::validation(format!("'{token}' is not a lead id")))
        })
        .collect::<Result<Vec<_>>>()?;

    if ids.is_empty() {
        return Err(Error::validation("No lead ids given"));
    }
    Ok(ids)
}

/// Loads a lead or fails with [`Error::NotFound`].
pub async fn find_lead<C>(db: &C, lead_id: i64) -> Result<referral_lead::Model>
where
    C: ConnectionTrait,
{
    ReferralLead::find_by_id(lead_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Lead", lead_id))
}

fn ensure_transition(lead: &referral_lead::Model, to: ReferralStatus) -> Result<ReferralStatus> {
    let from = status_of(lead)?;
    if from.can_transition_to(to) {
        Ok(from)
    } else {
        Err(Error::InvalidTransition {
            lead_id: lead.id,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Builds the error for a conditional update that matched no row: the lead
/// either vanished or another operator moved it first.
async fn lost_race<C>(db: &C, lead_id: i64, to: ReferralStatus) -> Result<Error>
where
    C: ConnectionTrait,
{
    let lead = find_lead(db, lead_id).await?;
    Ok(Error::InvalidTransition {
        lead_id,
        from: lead.status,
        to: to.to_string(),
    })
}

/// Applies `changes` only if the lead is still in one of `from`.
async fn transition<C>(
    db: &C,
    lead_id: i64,
    from: &[ReferralStatus],
    to: ReferralStatus,
    mut changes: referral_lead::ActiveModel,
) -> Result<()>
where
    C: ConnectionTrait,
{
    changes.status = Set(to.as_str().to_string());
    changes.updated_at = Set(Utc::now());

    let result = ReferralLead::update_many()
        .set(changes)
        .filter(referral_lead::Column::Id.eq(lead_id))
        .filter(referral_lead::Column::Status.is_in(from.iter().map(|status| status.as_str())))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(lost_race(db, lead_id, to).await?);
    }
    Ok(())
}

/// Moves a New lead to Follow-up.
#[instrument(skip(db))]
pub async fn mark_follow_up(db: &DatabaseConnection, lead_id: i64) -> Result<referral_lead::Model> {
    let lead = find_lead(db, lead_id).await?;
    let from = ensure_transition(&lead, ReferralStatus::FollowUp)?;

    transition(
        db,
        lead_id,
        &[ReferralStatus::New],
        ReferralStatus::FollowUp,
        Default::default(),
    )
    .await?;

    info!("Lead {lead_id}: {from} -> {}", ReferralStatus::FollowUp);
    find_lead(db, lead_id).await
}

/// Rejects an open lead. Irreversible; no benefit counters change.
#[instrument(skip(db))]
pub async fn reject_referral(db: &DatabaseConnection, lead_id: i64) -> Result<referral_lead::Model> {
    let lead = find_lead(db, lead_id).await?;
    let from = ensure_transition(&lead, ReferralStatus::Rejected)?;

    transition(
        db,
        lead_id,
        &[ReferralStatus::New, ReferralStatus::FollowUp],
        ReferralStatus::Rejected,
        Default::default(),
    )
    .await?;

    info!("Lead {lead_id}: {from} -> {}", ReferralStatus::Rejected);
    find_lead(db, lead_id).await
}

async fn confirm_in<C>(
    db: &C,
    lead_id: i64,
    admission_number: &str,
    confirm: &ConfirmAdmission,
    year: AcademicYear,
) -> Result<ConfirmOutcome>
where
    C: ConnectionTrait,
{
    let lead = find_lead(db, lead_id).await?;
    let from = ensure_transition(&lead, ReferralStatus::Confirmed)?;

    let owner = ambassador::get_ambassador(db, lead.ambassador_id)
        .await?
        .ok_or_else(|| Error::not_found("Ambassador", lead.ambassador_id))?;
    if owner.status != ambassador::AmbassadorStatus::Active.as_str() {
        return Err(Error::validation(format!(
            "referral code {} is inactive; reactivate the ambassador to credit this admission",
            owner.referral_code
        )));
    }

    let preferred = lead
        .preferred_fee_plan
        .as_deref()
        .map(FeePlan::from_str)
        .transpose()?;
    let plan = confirm
        .fee_plan
        .or(preferred)
        .ok_or_else(|| Error::validation("no fee plan selected"))?;

    let annual_fee = match confirm.annual_fee {
        Some(fee) => fee,
        None => campus::annual_fee_for(db, lead.campus_id, &lead.grade, plan)
            .await?
            .ok_or_else(|| {
                Error::validation(format!(
                    "no {plan} fee configured for {} at campus {}",
                    lead.grade, lead.campus_id
                ))
            })?,
    };

    let taken = ReferralLead::find()
        .filter(referral_lead::Column::AdmissionNumber.eq(admission_number))
        .filter(referral_lead::Column::Id.ne(lead_id))
        .count(db)
        .await?;
    if taken > 0 {
        return Err(Error::validation(format!(
            "admission number {admission_number} is already in use"
        )));
    }

    let now = Utc::now();
    transition(
        db,
        lead_id,
        &[ReferralStatus::New, ReferralStatus::FollowUp],
        ReferralStatus::Confirmed,
        referral_lead::ActiveModel {
            admission_number: Set(Some(admission_number.to_string())),
            fee_plan: Set(Some(plan.as_str().to_string())),
            annual_fee: Set(Some(annual_fee)),
            confirmed_at: Set(Some(now)),
            confirmed_academic_year: Set(Some(year.start_year())),
            ..Default::default()
        },
    )
    .await?;

    let ambassador = ambassador::recompute_ambassador_benefits(db, lead.ambassador_id, year).await?;
    let lead = find_lead(db, lead_id).await?;

    info!(
        "Lead {lead_id}: {from} -> {} (ERP {admission_number}, {plan}, fee {annual_fee:.2}); ambassador {} now at {} confirmed",
        ReferralStatus::Confirmed,
        ambassador.id,
        ambassador.confirmed_referral_count
    );
    Ok(ConfirmOutcome { lead, ambassador })
}

/// Confirms an open lead as an admission.
///
/// Requires a non-empty, unused admission number and a fee plan (given or
/// pre-assigned on the lead). Leads of an inactive ambassador cannot be
/// confirmed until the ambassador is reactivated. The annual fee is taken from `confirm` or
/// looked up from the campus fee table. The owning ambassador's benefit is
/// recomputed for `year` in the same transaction. At most one confirmation
/// per lead can succeed.
#[instrument(skip(db, confirm), fields(admission_number = %confirm.admission_number))]
pub async fn confirm_referral(
    db: &DatabaseConnection,
    lead_id: i64,
    confirm: &ConfirmAdmission,
    year: AcademicYear,
) -> Result<ConfirmOutcome> {
    let admission_number = confirm.admission_number.trim();
    if admission_number.is_empty() {
        return Err(Error::validation("admission (ERP) number is required"));
    }
    if let Some(fee) = confirm.annual_fee {
        if !fee.is_finite() || fee < 0.0 {
            return Err(Error::validation(format!(
                "annual fee must be a non-negative amount, got {fee}"
            )));
        }
    }

    let txn = db.begin().await?;
    let outcome = confirm_in(&txn, lead_id, admission_number, confirm, year).await?;
    txn.commit().await?;
    Ok(outcome)
}

/// Edits subject fields without touching the lead's status.
#[instrument(skip(db))]
pub async fn update_referral(
    db: &DatabaseConnection,
    lead_id: i64,
    update: ReferralUpdate,
) -> Result<referral_lead::Model> {
    if update.is_empty() {
        return Err(Error::validation("Specify at least one field to update"));
    }

    let lead = find_lead(db, lead_id).await?;
    let mut active: referral_lead::ActiveModel = lead.into();

    if let Some(name) = update.parent_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("Parent name cannot be empty"));
        }
        active.parent_name = Set(name);
    }
    if let Some(mobile) = update.parent_mobile {
        active.parent_mobile = Set(ambassador::normalize_mobile(&mobile)?);
    }
    if let Some(student_name) = update.student_name {
        let student_name = student_name.trim().to_string();
        active.student_name = Set((!student_name.is_empty()).then_some(student_name));
    }
    if let Some(grade) = update.grade {
        let grade = grade.trim().to_string();
        if grade.is_empty() {
            return Err(Error::validation("Grade cannot be empty"));
        }
        active.grade = Set(grade);
    }
    if let Some(campus_id) = update.campus_id {
        campus::require_campus(db, campus_id).await?;
        active.campus_id = Set(campus_id);
    }
    if let Some(notes) = update.notes {
        let notes = notes.trim().to_string();
        active.notes = Set((!notes.is_empty()).then_some(notes));
    }
    if let Some(plan) = update.preferred_fee_plan {
        active.preferred_fee_plan = Set(Some(plan.as_str().to_string()));
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(db).await?;
    info!("Lead {lead_id}: subject fields updated");
    Ok(updated)
}

/// Hard-deletes a lead. A student converted from it is left in place; if the
/// lead was confirmed, the owner's benefit is recomputed for `year`.
#[instrument(skip(db))]
pub async fn delete_referral(db: &DatabaseConnection, lead_id: i64, year: AcademicYear) -> Result<()> {
    let txn = db.begin().await?;
    let lead = find_lead(&txn, lead_id).await?;
    let was_confirmed = status_of(&lead)? == ReferralStatus::Confirmed;

    ReferralLead::delete_by_id(lead_id).exec(&txn).await?;
    if was_confirmed {
        ambassador::recompute_ambassador_benefits(&txn, lead.ambassador_id, year).await?;
    }
    txn.commit().await?;

    warn!("Lead {lead_id} deleted (was {})", lead.status);
    Ok(())
}

/// One entry of a bulk confirmation.
#[derive(Debug, Clone)]
pub struct BulkConfirmItem {
    pub lead_id: i64,
    pub admission_number: String,
}

/// Confirms many leads. With no `fee_plan`, only leads carrying a preferred
/// plan are confirmed; the rest fail with "no fee plan selected".
#[instrument(skip(db, items), fields(count = items.len()))]
pub async fn bulk_confirm_referrals(
    db: &DatabaseConnection,
    items: &[BulkConfirmItem],
    fee_plan: Option<FeePlan>,
    year: AcademicYear,
) -> BulkReport {
    let mut report = BulkReport::default();
    for item in items {
        let confirm = ConfirmAdmission {
            admission_number: item.admission_number.clone(),
            fee_plan,
            annual_fee: None,
        };
        let outcome = confirm_referral(db, item.lead_id, &confirm, year).await;
        report.record(item.lead_id, &outcome);
    }
    info!(
        "Bulk confirm: {} processed, {} failed",
        report.processed,
        report.errors.len()
    );
    report
}

/// Rejects many leads, best effort.
#[instrument(skip(db))]
pub async fn bulk_reject_referrals(db: &DatabaseConnection, lead_ids: &[i64]) -> BulkReport {
    let mut report = BulkReport::default();
    for &lead_id in lead_ids {
        let outcome = reject_referral(db, lead_id).await;
        report.record(lead_id, &outcome);
    }
    info!(
        "Bulk reject: {} processed, {} failed",
        report.processed,
        report.errors.len()
    );
    report
}

/// Hard-deletes many leads, best effort.
#[instrument(skip(db))]
pub async fn bulk_delete_referrals(
    db: &DatabaseConnection,
    lead_ids: &[i64],
    year: AcademicYear,
) -> BulkReport {
    let mut report = BulkReport::default();
    for &lead_id in lead_ids {
        let outcome = delete_referral(db, lead_id, year).await;
        report.record(lead_id, &outcome);
    }
    info!(
        "Bulk delete: {} processed, {} failed",
        report.processed,
        report.errors.len()
    );
    report
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{core::ambassador::Role, entities::Student, test_utils::*};

    fn erp(number: &str) -> ConfirmAdmission {
        ConfirmAdmission {
            admission_number: number.to_string(),
            fee_plan: Some(FeePlan::Otp),
            annual_fee: Some(60_000.0),
        }
    }

    #[test]
    fn test_transition_table() {
        use ReferralStatus::{Confirmed, FollowUp, New, Rejected};

        assert!(New.can_transition_to(FollowUp));
        assert!(New.can_transition_to(Confirmed));
        assert!(FollowUp.can_transition_to(Confirmed));
        assert!(FollowUp.can_transition_to(Rejected));

        assert!(!FollowUp.can_transition_to(New));
        assert!(!Rejected.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Rejected));
        for status in ReferralStatus::ALL {
            assert!(!Confirmed.can_transition_to(status));
            assert!(!Rejected.can_transition_to(status));
            assert!(!status.can_transition_to(New));
        }
    }

    #[test]
    fn test_status_and_plan_parsing() {
        assert_eq!("Follow Up".parse::<ReferralStatus>().unwrap(), ReferralStatus::FollowUp);
        assert_eq!("follow-up".parse::<ReferralStatus>().unwrap(), ReferralStatus::FollowUp);
        assert_eq!(ReferralStatus::FollowUp.to_string(), "Follow-up");
        assert_eq!("wotp".parse::<FeePlan>().unwrap(), FeePlan::Wotp);
        assert!("EMI".parse::<FeePlan>().is_err());
    }

    #[test]
    fn test_parse_lead_ids() {
        assert_eq!(parse_lead_ids("1, 2 #3").unwrap(), vec![1, 2, 3]);
        assert!(parse_lead_ids("1, two").is_err());
        assert!(parse_lead_ids("  ").is_err());
    }

    #[tokio::test]
    async fn test_confirm_requires_admission_number() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;
        let result = confirm_referral(&db, lead.id, &erp("   "), test_year()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let mut negative = erp("ERP-1");
        negative.annual_fee = Some(-1.0);
        let result = confirm_referral(&db, lead.id, &negative, test_year()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let untouched = find_lead(&db, lead.id).await?;
        assert_eq!(untouched.status, "New");
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_new_lead() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;

        let outcome = confirm_referral(&db, lead.id, &erp("ERP-881"), test_year()).await?;

        assert_eq!(outcome.lead.status, "Confirmed");
        assert_eq!(outcome.lead.admission_number.as_deref(), Some("ERP-881"));
        assert_eq!(outcome.lead.fee_plan.as_deref(), Some("OTP"));
        assert_eq!(outcome.lead.annual_fee, Some(60_000.0));
        assert_eq!(outcome.lead.confirmed_academic_year, Some(2025));
        assert_eq!(outcome.ambassador.confirmed_referral_count, 1);
        assert_eq!(outcome.ambassador.benefit_status, "Active");
        assert_eq!(outcome.ambassador.year_fee_benefit_percent, 5.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_looks_up_campus_fee() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;

        let confirm = ConfirmAdmission {
            admission_number: "ERP-2".to_string(),
            fee_plan: Some(FeePlan::Wotp),
            annual_fee: None,
        };
        let outcome = confirm_referral(&db, lead.id, &confirm, test_year()).await?;
        assert_eq!(outcome.lead.annual_fee, Some(64_000.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_guard_keeps_counters() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let confirmed = create_test_lead(&db, &amb, &campus).await?;
        confirm_referral(&db, confirmed.id, &erp("ERP-1"), test_year()).await?;

        let again = confirm_referral(&db, confirmed.id, &erp("ERP-9"), test_year()).await;
        assert!(matches!(again, Err(Error::InvalidTransition { .. })));

        let rejected = create_test_lead(&db, &amb, &campus).await?;
        reject_referral(&db, rejected.id).await?;
        let result = confirm_referral(&db, rejected.id, &erp("ERP-2"), test_year()).await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));

        let refreshed = ambassador::get_ambassador(&db, amb.id).await?.unwrap();
        assert_eq!(refreshed.confirmed_referral_count, 1);

        // The rejected lead carries no confirmation payload
        let rejected = find_lead(&db, rejected.id).await?;
        assert!(rejected.admission_number.is_none());
        assert!(rejected.fee_plan.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_confirms_count_once() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;

        let first = erp("ERP-A");
        let second = erp("ERP-B");
        let (a, b) = tokio::join!(
            confirm_referral(&db, lead.id, &first, test_year()),
            confirm_referral(&db, lead.id, &second, test_year()),
        );
        assert!(a.is_ok() != b.is_ok());

        let refreshed = ambassador::get_ambassador(&db, amb.id).await?.unwrap();
        assert_eq!(refreshed.confirmed_referral_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_admission_number_must_be_unique() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let first = create_test_lead(&db, &amb, &campus).await?;
        let second = create_test_lead(&db, &amb, &campus).await?;

        confirm_referral(&db, first.id, &erp("ERP-1"), test_year()).await?;
        let result = confirm_referral(&db, second.id, &erp("ERP-1"), test_year()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(find_lead(&db, second.id).await?.status, "New");
        Ok(())
    }

    #[tokio::test]
    async fn test_follow_up_then_confirm() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;

        let followed = mark_follow_up(&db, lead.id).await?;
        assert_eq!(followed.status, "Follow-up");

        let twice = mark_follow_up(&db, lead.id).await;
        assert!(matches!(twice, Err(Error::InvalidTransition { .. })));

        let outcome = confirm_referral(&db, lead.id, &erp("ERP-3"), test_year()).await?;
        assert_eq!(outcome.lead.status, "Confirmed");
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_confirm_partial_failure() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let one = create_test_lead(&db, &amb, &campus).await?;
        let two = create_test_lead(&db, &amb, &campus).await?;
        let three = create_test_lead(&db, &amb, &campus).await?;
        confirm_referral(&db, two.id, &erp("ERP-2"), test_year()).await?;

        let items: Vec<BulkConfirmItem> = [one.id, two.id, three.id, 999]
            .iter()
            .map(|&lead_id| BulkConfirmItem {
                lead_id,
                admission_number: format!("BULK-{lead_id}"),
            })
            .collect();
        let report = bulk_confirm_referrals(&db, &items, Some(FeePlan::Otp), test_year()).await;

        assert_eq!(report.processed, 2);
        assert_eq!(
            report.errors,
            vec![
                format!("Lead {}: invalid state", two.id),
                "Lead 999: not found".to_string()
            ]
        );

        let refreshed = ambassador::get_ambassador(&db, amb.id).await?.unwrap();
        assert_eq!(refreshed.confirmed_referral_count, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_confirm_without_plan_skips_unassigned() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let planned = create_test_lead(&db, &amb, &campus).await?;
        update_referral(
            &db,
            planned.id,
            ReferralUpdate {
                preferred_fee_plan: Some(FeePlan::Wotp),
                ..Default::default()
            },
        )
        .await?;
        let unplanned = create_test_lead(&db, &amb, &campus).await?;

        let items = vec![
            BulkConfirmItem {
                lead_id: planned.id,
                admission_number: "ERP-P".to_string(),
            },
            BulkConfirmItem {
                lead_id: unplanned.id,
                admission_number: "ERP-U".to_string(),
            },
        ];
        let report = bulk_confirm_referrals(&db, &items, None, test_year()).await;

        assert_eq!(report.processed, 1);
        assert_eq!(
            report.errors,
            vec![format!("Lead {}: no fee plan selected", unplanned.id)]
        );
        assert_eq!(
            find_lead(&db, planned.id).await?.fee_plan.as_deref(),
            Some("WOTP")
        );
        assert_eq!(find_lead(&db, unplanned.id).await?.status, "New");
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_reject_and_delete() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(create_test_lead(&db, &amb, &campus).await?.id);
        }
        confirm_referral(&db, ids[0], &erp("ERP-0"), test_year()).await?;

        let report = bulk_reject_referrals(&db, &ids).await;
        assert_eq!(report.processed, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_clean());

        let mut to_delete = ids.clone();
        to_delete.push(12_345);
        let report = bulk_delete_referrals(&db, &to_delete, test_year()).await;
        assert_eq!(report.processed, 4);
        assert_eq!(report.errors, vec!["Lead 12345: not found".to_string()]);

        // Deleting the confirmed lead takes it out of the ambassador's count
        let refreshed = ambassador::get_ambassador(&db, amb.id).await?.unwrap();
        assert_eq!(refreshed.confirmed_referral_count, 0);
        assert_eq!(refreshed.benefit_status, "Inactive");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_keeps_converted_student() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;
        confirm_referral(&db, lead.id, &erp("ERP-1"), test_year()).await?;
        let student = crate::core::student::convert_lead_to_student(
            &db,
            lead.id,
            crate::core::student::StudentDetails::default(),
            test_year(),
        )
        .await?;

        delete_referral(&db, lead.id, test_year()).await?;
        let kept = Student::find_by_id(student.id).one(&db).await?.unwrap();
        assert_eq!(kept.lead_id, Some(lead.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_referral_fields_at_any_status() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;
        reject_referral(&db, lead.id).await?;

        let updated = update_referral(
            &db,
            lead.id,
            ReferralUpdate {
                parent_name: Some("Lakshmi N".to_string()),
                student_name: Some("Arjun".to_string()),
                notes: Some(String::new()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.parent_name, "Lakshmi N");
        assert_eq!(updated.student_name.as_deref(), Some("Arjun"));
        assert!(updated.notes.is_none());
        assert_eq!(updated.status, "Rejected");

        let blank = update_referral(
            &db,
            lead.id,
            ReferralUpdate {
                parent_name: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(blank, Err(Error::Validation { .. })));

        let other = create_test_ambassador(&db, "Staff One", "9840000099", Role::Staff).await?;
        assert_ne!(other.id, updated.ambassador_id);
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_refused_while_ambassador_inactive() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;
        ambassador::set_ambassador_status(&db, amb.id, ambassador::AmbassadorStatus::Inactive)
            .await?;

        let refused = confirm_referral(&db, lead.id, &erp("ERP-900"), test_year()).await;
        assert!(matches!(refused, Err(Error::Validation { .. })));
        assert_eq!(find_lead(&db, lead.id).await?.status, "New");
        let owner = ambassador::get_ambassador(&db, amb.id).await?.unwrap();
        assert_eq!(owner.confirmed_referral_count, 0);

        ambassador::set_ambassador_status(&db, amb.id, ambassador::AmbassadorStatus::Active)
            .await?;
        let outcome = confirm_referral(&db, lead.id, &erp("ERP-900"), test_year()).await?;
        assert_eq!(outcome.ambassador.confirmed_referral_count, 1);
        Ok(())
    }
}
