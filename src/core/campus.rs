//! Campus business logic - campus records and their per-grade fee table.

use crate::{
    core::lifecycle::FeePlan,
    entities::{Campus, CampusGradeFee, campus, campus_grade_fee},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::{info, instrument};

/// Fields for a new campus.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCampus {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub capacity: i32,
}

/// Retrieves all campuses ordered by name.
pub async fn list_campuses<C>(db: &C) -> Result<Vec<campus::Model>>
where
    C: ConnectionTrait,
{
    Campus::find()
        .order_by_asc(campus::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a campus by id.
pub async fn get_campus<C>(db: &C, campus_id: i64) -> Result<Option<campus::Model>>
where
    C: ConnectionTrait,
{
    Campus::find_by_id(campus_id).one(db).await.map_err(Into::into)
}

/// Finds a campus by id, failing with [`Error::NotFound`] when it is missing.
pub async fn require_campus<C>(db: &C, campus_id: i64) -> Result<campus::Model>
where
    C: ConnectionTrait,
{
    get_campus(db, campus_id)
        .await?
        .ok_or_else(|| Error::not_found("Campus", campus_id))
}

/// Finds a campus by its code (case-insensitive input).
pub async fn get_campus_by_code<C>(db: &C, code: &str) -> Result<Option<campus::Model>>
where
    C: ConnectionTrait,
{
    Campus::find()
        .filter(campus::Column::Code.eq(code.trim().to_ascii_uppercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a campus. Codes are stored upper-case and must be unique.
#[instrument(skip(db))]
pub async fn create_campus<C>(db: &C, new: NewCampus) -> Result<campus::Model>
where
    C: ConnectionTrait,
{
    let name = new.name.trim().to_string();
    let code = new.code.trim().to_ascii_uppercase();
    if name.is_empty() || code.is_empty() {
        return Err(Error::validation("Campus name and code are required"));
    }
    if new.capacity < 0 {
        return Err(Error::validation("Campus capacity cannot be negative"));
    }
    if get_campus_by_code(db, &code).await?.is_some() {
        return Err(Error::validation(format!("Campus code {code} already exists")));
    }

    let created = campus::ActiveModel {
        name: Set(name),
        code: Set(code),
        location: Set(new.location.trim().to_string()),
        capacity: Set(new.capacity),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created campus {} ({})", created.name, created.code);
    Ok(created)
}

/// Sets the annual fees of one grade at a campus, replacing earlier values.
#[instrument(skip(db))]
pub async fn set_grade_fee<C>(
    db: &C,
    campus_id: i64,
    grade: &str,
    otp_fee: f64,
    wotp_fee: f64,
) -> Result<campus_grade_fee::Model>
where
    C: ConnectionTrait,
{
    let grade = grade.trim();
    if grade.is_empty() {
        return Err(Error::validation("Grade cannot be empty"));
    }
    for fee in [otp_fee, wotp_fee] {
        if !fee.is_finite() || fee < 0.0 {
            return Err(Error::validation(format!(
                "Fee must be a non-negative amount, got {fee}"
            )));
        }
    }
    require_campus(db, campus_id).await?;

    let existing = CampusGradeFee::find()
        .filter(campus_grade_fee::Column::CampusId.eq(campus_id))
        .filter(campus_grade_fee::Column::Grade.eq(grade))
        .one(db)
        .await?;

    let saved = if let Some(row) = existing {
        let mut active: campus_grade_fee::ActiveModel = row.into();
        active.otp_fee = Set(otp_fee);
        active.wotp_fee = Set(wotp_fee);
        active.update(db).await?
    } else {
        campus_grade_fee::ActiveModel {
            campus_id: Set(campus_id),
            grade: Set(grade.to_string()),
            otp_fee: Set(otp_fee),
            wotp_fee: Set(wotp_fee),
            ..Default::default()
        }
        .insert(db)
        .await?
    };
    Ok(saved)
}

/// Lists a campus's grade fees ordered by grade label.
pub async fn list_grade_fees<C>(db: &C, campus_id: i64) -> Result<Vec<campus_grade_fee::Model>>
where
    C: ConnectionTrait,
{
    CampusGradeFee::find()
        .filter(campus_grade_fee::Column::CampusId.eq(campus_id))
        .order_by_asc(campus_grade_fee::Column::Grade)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The annual fee for a grade under a fee plan, if the campus has one set.
pub async fn annual_fee_for<C>(
    db: &C,
    campus_id: i64,
    grade: &str,
    plan: FeePlan,
) -> Result<Option<f64>>
where
    C: ConnectionTrait,
{
    let row = CampusGradeFee::find()
        .filter(campus_grade_fee::Column::CampusId.eq(campus_id))
        .filter(campus_grade_fee::Column::Grade.eq(grade.trim()))
        .one(db)
        .await?;

    Ok(row.map(|fees| match plan {
        FeePlan::Otp => fees.otp_fee,
        FeePlan::Wotp => fees.wotp_fee,
    }))
}
