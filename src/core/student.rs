//! Student management and lead conversion.
//!
//! A confirmed lead can be converted into exactly one student. The student
//! keeps a historical `lead_id` back-reference and the lead records the
//! student it produced; conversion never changes the lead's status.

use crate::{
    core::{
        academic_year::AcademicYear,
        ambassador::{self, NewAmbassador, Role},
        campus,
        lifecycle::{self, BulkReport, ReferralStatus},
    },
    entities::{ReferralLead, Student, referral_lead, student},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Fields for a student enrolled directly, without a lead.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub grade: String,
    pub section: Option<String>,
    pub roll_number: Option<String>,
    pub campus_id: i64,
    pub parent_ambassador_id: i64,
    pub base_fee: f64,
    pub discount_percent: f64,
}

/// Optional overrides applied when converting a lead.
#[derive(Debug, Clone, Default)]
pub struct StudentDetails {
    /// Defaults to the lead's student name, then `"{parent}'s Child"`
    pub student_name: Option<String>,
    pub section: Option<String>,
    pub roll_number: Option<String>,
    /// Defaults to the confirmed annual fee
    pub base_fee: Option<f64>,
    pub discount_percent: Option<f64>,
}

/// Editable student fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub roll_number: Option<String>,
    pub campus_id: Option<i64>,
    pub base_fee: Option<f64>,
    pub discount_percent: Option<f64>,
}

fn validate_amounts(base_fee: f64, discount_percent: f64) -> Result<()> {
    if !base_fee.is_finite() || base_fee < 0.0 {
        return Err(Error::validation(format!(
            "Base fee must be a non-negative amount, got {base_fee}"
        )));
    }
    if !discount_percent.is_finite() || !(0.0..=100.0).contains(&discount_percent) {
        return Err(Error::validation(format!(
            "Discount must be between 0 and 100, got {discount_percent}"
        )));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

async fn insert_student<C>(db: &C, new: NewStudent, lead_id: Option<i64>) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    let name = new.name.trim().to_string();
    let grade = new.grade.trim().to_string();
    if name.is_empty() || grade.is_empty() {
        return Err(Error::validation("Student name and grade are required"));
    }
    validate_amounts(new.base_fee, new.discount_percent)?;

    let now = Utc::now();
    student::ActiveModel {
        name: Set(name),
        grade: Set(grade),
        section: Set(trimmed(new.section)),
        roll_number: Set(trimmed(new.roll_number)),
        campus_id: Set(new.campus_id),
        parent_ambassador_id: Set(new.parent_ambassador_id),
        base_fee: Set(new.base_fee),
        discount_percent: Set(new.discount_percent),
        lead_id: Set(lead_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Enrolls a student directly.
#[instrument(skip(db))]
pub async fn create_student(db: &DatabaseConnection, new: NewStudent) -> Result<student::Model> {
    campus::require_campus(db, new.campus_id).await?;
    ambassador::get_ambassador(db, new.parent_ambassador_id)
        .await?
        .ok_or_else(|| Error::not_found("Ambassador", new.parent_ambassador_id))?;

    let created = insert_student(db, new, None).await?;
    info!("Created student {} ({})", created.id, created.name);
    Ok(created)
}

/// Finds a student by id.
pub async fn get_student<C>(db: &C, student_id: i64) -> Result<Option<student::Model>>
where
    C: ConnectionTrait,
{
    Student::find_by_id(student_id).one(db).await.map_err(Into::into)
}

/// Lists students by name, optionally for one campus.
pub async fn list_students<C>(db: &C, campus_id: Option<i64>) -> Result<Vec<student::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Student::find();
    if let Some(campus_id) = campus_id {
        query = query.filter(student::Column::CampusId.eq(campus_id));
    }
    query
        .order_by_asc(student::Column::Name)
        .order_by_asc(student::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a student's fields.
#[instrument(skip(db))]
pub async fn update_student(
    db: &DatabaseConnection,
    student_id: i64,
    update: StudentUpdate,
) -> Result<student::Model> {
    let existing = get_student(db, student_id)
        .await?
        .ok_or_else(|| Error::not_found("Student", student_id))?;

    validate_amounts(
        update.base_fee.unwrap_or(existing.base_fee),
        update.discount_percent.unwrap_or(existing.discount_percent),
    )?;

    let mut active: student::ActiveModel = existing.into();
    if let Some(name) = update.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("Student name cannot be empty"));
        }
        active.name = Set(name);
    }
    if let Some(grade) = update.grade {
        let grade = grade.trim().to_string();
        if grade.is_empty() {
            return Err(Error::validation("Grade cannot be empty"));
        }
        active.grade = Set(grade);
    }
    if update.section.is_some() {
        active.section = Set(trimmed(update.section));
    }
    if update.roll_number.is_some() {
        active.roll_number = Set(trimmed(update.roll_number));
    }
    if let Some(campus_id) = update.campus_id {
        campus::require_campus(db, campus_id).await?;
        active.campus_id = Set(campus_id);
    }
    if let Some(fee) = update.base_fee {
        active.base_fee = Set(fee);
    }
    if let Some(discount) = update.discount_percent {
        active.discount_percent = Set(discount);
    }
    active.updated_at = Set(Utc::now());

    active.update(db).await.map_err(Into::into)
}

async fn convert_in<C>(
    db: &C,
    lead_id: i64,
    details: StudentDetails,
    year: AcademicYear,
) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    let lead = lifecycle::find_lead(db, lead_id).await?;
    if lifecycle::status_of(&lead)? != ReferralStatus::Confirmed {
        return Err(Error::NotConfirmed { lead_id });
    }
    if lead.student_id.is_some() {
        return Err(Error::AlreadyConverted { lead_id });
    }

    let base_fee = details.base_fee.or(lead.annual_fee).unwrap_or(0.0);
    let parent = match ambassador::get_ambassador_by_mobile(db, &lead.parent_mobile).await? {
        Some(existing) => existing,
        None => {
            ambassador::insert_ambassador(
                db,
                NewAmbassador {
                    full_name: lead.parent_name.clone(),
                    mobile: lead.parent_mobile.clone(),
                    role: Role::Parent,
                    campus_id: Some(lead.campus_id),
                    student_fee: base_fee,
                    referral_code: None,
                },
                year,
            )
            .await?
        }
    };

    let name = trimmed(details.student_name)
        .or_else(|| trimmed(lead.student_name.clone()))
        .unwrap_or_else(|| format!("{}'s Child", lead.parent_name));

    let created = insert_student(
        db,
        NewStudent {
            name,
            grade: lead.grade.clone(),
            section: details.section,
            roll_number: details.roll_number,
            campus_id: lead.campus_id,
            parent_ambassador_id: parent.id,
            base_fee,
            discount_percent: details.discount_percent.unwrap_or(0.0),
        },
        Some(lead_id),
    )
    .await?;

    let linked = ReferralLead::update_many()
        .set(referral_lead::ActiveModel {
            student_id: Set(Some(created.id)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(referral_lead::Column::Id.eq(lead_id))
        .filter(referral_lead::Column::StudentId.is_null())
        .exec(db)
        .await?;
    if linked.rows_affected == 0 {
        return Err(Error::AlreadyConverted { lead_id });
    }

    Ok(created)
}

/// Creates the student for a confirmed, not yet converted lead.
///
/// The parent is the ambassador registered with the lead's parent mobile,
/// or a new Parent ambassador when none exists. Fails with
/// [`Error::NotConfirmed`] or [`Error::AlreadyConverted`] without writing
/// anything.
#[instrument(skip(db, details))]
pub async fn convert_lead_to_student(
    db: &DatabaseConnection,
    lead_id: i64,
    details: StudentDetails,
    year: AcademicYear,
) -> Result<student::Model> {
    let txn = db.begin().await?;
    let created = convert_in(&txn, lead_id, details, year).await?;
    txn.commit().await?;

    info!(
        "Lead {lead_id} converted to student {} ({})",
        created.id, created.name
    );
    Ok(created)
}

/// Converts many leads with default details, best effort.
#[instrument(skip(db))]
pub async fn bulk_convert_leads_to_students(
    db: &DatabaseConnection,
    lead_ids: &[i64],
    year: AcademicYear,
) -> BulkReport {
    let mut report = BulkReport::default();
    for &lead_id in lead_ids {
        let outcome = convert_lead_to_student(db, lead_id, StudentDetails::default(), year).await;
        report.record(lead_id, &outcome);
    }
    info!(
        "Bulk convert: {} processed, {} failed",
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
    use crate::{core::lifecycle::find_lead, test_utils::*};

    #[tokio::test]
    async fn test_convert_confirmed_lead_once() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;
        confirm_test_lead(&db, lead.id, test_year()).await?;

        let details = StudentDetails {
            student_name: Some("Arjun".to_string()),
            ..Default::default()
        };
        let created = convert_lead_to_student(&db, lead.id, details.clone(), test_year()).await?;
        assert_eq!(created.name, "Arjun");
        assert_eq!(created.lead_id, Some(lead.id));
        assert_eq!(created.base_fee, 60_000.0);

        let linked = find_lead(&db, lead.id).await?;
        assert_eq!(linked.student_id, Some(created.id));
        assert_eq!(linked.status, "Confirmed");

        let again = convert_lead_to_student(&db, lead.id, details, test_year()).await;
        assert!(matches!(again, Err(Error::AlreadyConverted { .. })));
        assert_eq!(Student::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_convert_requires_confirmation() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_test_lead(&db, &amb, &campus).await?;

        let result = convert_lead_to_student(&db, lead.id, StudentDetails::default(), test_year()).await;
        assert!(matches!(result, Err(Error::NotConfirmed { .. })));
        assert_eq!(Student::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_convert_creates_or_reuses_parent() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let first = create_test_lead(&db, &amb, &campus).await?;
        confirm_test_lead(&db, first.id, test_year()).await?;

        let created = convert_lead_to_student(&db, first.id, StudentDetails::default(), test_year()).await?;
        assert_eq!(created.name, format!("{}'s Child", first.parent_name));

        let parent = ambassador::get_ambassador(&db, created.parent_ambassador_id)
            .await?
            .unwrap();
        assert_eq!(parent.role, "Parent");
        assert_eq!(parent.mobile, first.parent_mobile);
        assert_ne!(parent.id, amb.id);

        // A sibling referred later resolves to the same parent
        let sibling = crate::core::referral::create_referral(
            &db,
            crate::core::referral::NewReferral {
                referral_code: amb.referral_code.clone(),
                parent_name: first.parent_name.clone(),
                parent_mobile: first.parent_mobile.clone(),
                student_name: Some("Anu".to_string()),
                grade: "Grade 5".to_string(),
                campus_id: campus.id,
                notes: None,
                preferred_fee_plan: None,
            },
        )
        .await?;
        confirm_test_lead(&db, sibling.id, test_year()).await?;
        let second = convert_lead_to_student(&db, sibling.id, StudentDetails::default(), test_year()).await?;
        assert_eq!(second.name, "Anu");
        assert_eq!(second.parent_ambassador_id, parent.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_convert_reports_each_failure() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let confirmed = create_test_lead(&db, &amb, &campus).await?;
        confirm_test_lead(&db, confirmed.id, test_year()).await?;
        let open = create_test_lead(&db, &amb, &campus).await?;

        let report =
            bulk_convert_leads_to_students(&db, &[confirmed.id, open.id, confirmed.id, 777], test_year())
                .await;
        assert_eq!(report.processed, 1);
        assert_eq!(
            report.errors,
            vec![
                format!("Lead {}: not confirmed", open.id),
                format!("Lead {}: already converted", confirmed.id),
                "Lead 777: not found".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_direct_student_crud() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let created = create_student(
            &db,
            NewStudent {
                name: "Kavya".to_string(),
                grade: "Grade 2".to_string(),
                section: Some("B".to_string()),
                roll_number: None,
                campus_id: campus.id,
                parent_ambassador_id: amb.id,
                base_fee: 45_000.0,
                discount_percent: 10.0,
            },
        )
        .await?;
        assert!(created.lead_id.is_none());

        let updated = update_student(
            &db,
            created.id,
            StudentUpdate {
                discount_percent: Some(15.0),
                roll_number: Some("17".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.discount_percent, 15.0);
        assert_eq!(updated.roll_number.as_deref(), Some("17"));

        let too_much = update_student(
            &db,
            created.id,
            StudentUpdate {
                discount_percent: Some(120.0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(too_much, Err(Error::Validation { .. })));

        assert_eq!(list_students(&db, Some(campus.id)).await?.len(), 1);
        assert!(list_students(&db, Some(campus.id + 1)).await?.is_empty());
        Ok(())
    }
}
