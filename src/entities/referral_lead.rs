//! Referral lead entity - A prospective student attributed to one ambassador.
//!
//! `admission_number`, `fee_plan`, `annual_fee`, `confirmed_at` and
//! `confirmed_academic_year` are the confirmation payload and are only set
//! while `status` is `"Confirmed"`. `student_id` links the lead to the
//! student created from it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Referral lead database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referral_leads")]
pub struct Model {
    /// Unique identifier for the lead
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning ambassador, fixed at creation
    pub ambassador_id: i64,
    pub parent_name: String,
    pub parent_mobile: String,
    pub student_name: Option<String>,
    /// Grade the family is interested in
    pub grade: String,
    /// Target campus
    pub campus_id: i64,
    pub notes: Option<String>,
    /// Fee plan the family indicated before confirmation (`"OTP"` / `"WOTP"`)
    pub preferred_fee_plan: Option<String>,
    /// `"New"`, `"Follow-up"`, `"Confirmed"` or `"Rejected"`
    pub status: String,
    /// ERP/admission number issued on confirmation
    #[sea_orm(unique)]
    pub admission_number: Option<String>,
    /// Fee plan chosen at confirmation
    pub fee_plan: Option<String>,
    pub annual_fee: Option<f64>,
    pub confirmed_at: Option<DateTimeUtc>,
    /// Academic year the confirmation counts towards
    pub confirmed_academic_year: Option<i32>,
    /// Student created from this lead, if converted
    pub student_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between ReferralLead and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each lead belongs to one ambassador
    #[sea_orm(
        belongs_to = "super::ambassador::Entity",
        from = "Column::AmbassadorId",
        to = "super::ambassador::Column::Id"
    )]
    Ambassador,
    /// Each lead targets one campus
    #[sea_orm(
        belongs_to = "super::campus::Entity",
        from = "Column::CampusId",
        to = "super::campus::Column::Id"
    )]
    Campus,
}

impl Related<super::ambassador::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ambassador.def()
    }
}

impl Related<super::campus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
