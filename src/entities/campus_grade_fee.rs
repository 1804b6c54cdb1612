//! Campus grade fee entity - Annual fee for one grade at one campus, per fee plan.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Grade fee database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campus_grade_fees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Campus this fee belongs to
    pub campus_id: i64,
    /// Grade label as shown on the referral form (e.g., "Grade 5", "LKG")
    pub grade: String,
    /// Annual fee under the one-time payment plan
    pub otp_fee: f64,
    /// Annual fee under the installment plan
    pub wotp_fee: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campus::Entity",
        from = "Column::CampusId",
        to = "super::campus::Column::Id"
    )]
    Campus,
}

impl Related<super::campus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
