//! Campus entity - A school campus that leads, ambassadors and students point at.
//!
//! Campuses are pure configuration; per-grade fees live in `campus_grade_fees`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Campus database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campuses")]
pub struct Model {
    /// Unique identifier for the campus
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Adyar")
    pub name: String,
    /// Short unique code (e.g., "ADYAR")
    #[sea_orm(unique)]
    pub code: String,
    /// Free-text address or area
    pub location: String,
    /// Seat capacity across all grades
    pub capacity: i32,
}

/// Defines relationships between Campus and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One campus has a fee row per grade
    #[sea_orm(has_many = "super::campus_grade_fee::Entity")]
    GradeFees,
    /// One campus receives many referral leads
    #[sea_orm(has_many = "super::referral_lead::Entity")]
    ReferralLeads,
}

impl Related<super::campus_grade_fee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GradeFees.def()
    }
}

impl Related<super::referral_lead::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReferralLeads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
