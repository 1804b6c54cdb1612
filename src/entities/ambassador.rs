//! Ambassador entity - A parent, staff member or alumnus who refers students.
//!
//! Besides identity and contact data the row caches the benefit computed for
//! `benefit_academic_year`; those columns are only written by
//! `core::ambassador::recompute_ambassador_benefits`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ambassador database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ambassadors")]
pub struct Model {
    /// Unique identifier for the ambassador
    #[sea_orm(primary_key)]
    pub id: i64,
    pub full_name: String,
    /// Mobile number, the unique contact key
    #[sea_orm(unique)]
    pub mobile: String,
    /// `"Parent"`, `"Staff"` or `"Alumni"`
    pub role: String,
    /// Code attributed to every lead this ambassador brings in
    #[sea_orm(unique)]
    pub referral_code: String,
    /// `"Active"` or `"Inactive"`; inactive codes cannot receive new leads
    pub status: String,
    /// Home campus, if known
    pub campus_id: Option<i64>,
    /// Annual fee the ambassador's own child pays, basis for estimated savings
    pub student_fee: f64,
    /// Confirmed referrals within `benefit_academic_year`
    pub confirmed_referral_count: i32,
    /// Academic year the cached benefit columns were computed for
    pub benefit_academic_year: i32,
    pub year_fee_benefit_percent: f64,
    pub long_term_benefit_percent: f64,
    /// `"Active"` once the ambassador has a confirmed referral this year
    pub benefit_status: String,
    /// Name of the tier currently reached
    pub tier_name: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Ambassador and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// An ambassador may be attached to a home campus
    #[sea_orm(
        belongs_to = "super::campus::Entity",
        from = "Column::CampusId",
        to = "super::campus::Column::Id"
    )]
    Campus,
    /// One ambassador owns many referral leads
    #[sea_orm(has_many = "super::referral_lead::Entity")]
    ReferralLeads,
}

impl Related<super::campus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campus.def()
    }
}

impl Related<super::referral_lead::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReferralLeads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
