//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        academic_year::AcademicYear,
        ambassador::{self, NewAmbassador, Role},
        campus::{self, NewCampus},
        lifecycle::{self, ConfirmAdmission, ConfirmOutcome, FeePlan},
        referral::{self, NewReferral},
        tier::{self, NewSlab},
    },
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_PARENT: AtomicU32 = AtomicU32::new(1);

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Academic year every test runs in (2025-26).
#[must_use]
pub const fn test_year() -> AcademicYear {
    AcademicYear::new(2025)
}

fn slab(name: &str, referral_count: u32, year: f64, base: f64, extra: f64) -> NewSlab {
    NewSlab {
        tier_name: name.to_string(),
        referral_count,
        year_fee_benefit_percent: year,
        base_long_term_percent: base,
        long_term_extra_percent: extra,
    }
}

/// Seeds the five-step tier table:
///
/// | Tier | Referrals | Year % | Long-term base % | Extra % |
/// |---|---|---|---|---|
/// | Bronze | 1 | 5 | 0 | 0 |
/// | Silver | 2 | 10 | 0 | 0 |
/// | Gold | 3 | 25 | 0 | 0 |
/// | Diamond | 4 | 30 | 0 | 0 |
/// | Elite | 5 | 50 | 15 | 5 |
pub async fn seed_test_tiers(db: &DatabaseConnection) -> Result<Vec<entities::benefit_slab::Model>> {
    tier::replace_slabs(
        db,
        &[
            slab("Bronze", 1, 5.0, 0.0, 0.0),
            slab("Silver", 2, 10.0, 0.0, 0.0),
            slab("Gold", 3, 25.0, 0.0, 0.0),
            slab("Diamond", 4, 30.0, 0.0, 0.0),
            slab("Elite", 5, 50.0, 15.0, 5.0),
        ],
    )
    .await
}

/// Creates a campus with one grade fee: Grade 5 at 60,000 (OTP) / 64,000 (WOTP).
pub async fn create_test_campus(
    db: &DatabaseConnection,
    code: &str,
) -> Result<entities::campus::Model> {
    let created = campus::create_campus(
        db,
        NewCampus {
            name: format!("Campus {code}"),
            code: code.to_string(),
            location: "Chennai".to_string(),
            capacity: 500,
        },
    )
    .await?;
    campus::set_grade_fee(db, created.id, "Grade 5", 60_000.0, 64_000.0).await?;
    Ok(created)
}

/// Registers an active ambassador with no home campus and a 50,000 fee.
pub async fn create_test_ambassador(
    db: &DatabaseConnection,
    name: &str,
    mobile: &str,
    role: Role,
) -> Result<entities::ambassador::Model> {
    ambassador::create_ambassador(
        db,
        NewAmbassador {
            full_name: name.to_string(),
            mobile: mobile.to_string(),
            role,
            campus_id: None,
            student_fee: 50_000.0,
            referral_code: None,
        },
        test_year(),
    )
    .await
}

/// Creates a New lead for Grade 5 with a unique parent name and mobile.
pub async fn create_test_lead(
    db: &DatabaseConnection,
    owner: &entities::ambassador::Model,
    campus: &entities::campus::Model,
) -> Result<entities::referral_lead::Model> {
    let n = NEXT_PARENT.fetch_add(1, Ordering::Relaxed);
    referral::create_referral(
        db,
        NewReferral {
            referral_code: owner.referral_code.clone(),
            parent_name: format!("Test Parent {n}"),
            parent_mobile: format!("90000{n:05}"),
            student_name: None,
            grade: "Grade 5".to_string(),
            campus_id: campus.id,
            notes: None,
            preferred_fee_plan: None,
        },
    )
    .await
}

/// Confirms a lead under OTP at 60,000, counting towards `year`.
pub async fn confirm_test_lead(
    db: &DatabaseConnection,
    lead_id: i64,
    year: AcademicYear,
) -> Result<ConfirmOutcome> {
    lifecycle::confirm_referral(
        db,
        lead_id,
        &ConfirmAdmission {
            admission_number: format!("ERP-{lead_id}-{}", year.start_year()),
            fee_plan: Some(FeePlan::Otp),
            annual_fee: Some(60_000.0),
        },
        year,
    )
    .await
}

/// Sets up seeded tiers, campus `ADYAR` and parent ambassador "Priya".
/// Returns (db, ambassador, campus) for lifecycle tests.
pub async fn setup_with_ambassador() -> Result<(
    DatabaseConnection,
    entities::ambassador::Model,
    entities::campus::Model,
)> {
    let db = setup_test_db().await?;
    seed_test_tiers(&db).await?;
    let campus = create_test_campus(&db, "ADYAR").await?;
    let amb = create_test_ambassador(&db, "Priya", "9840000001", Role::Parent).await?;
    Ok((db, amb, campus))
}
