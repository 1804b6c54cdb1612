//! Student entity - An enrolled student, created directly or from a lead.
//!
//! `lead_id` is a historical back-reference only; deleting the lead leaves the
//! student untouched, so no foreign key is declared for it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub grade: String,
    pub section: Option<String>,
    pub roll_number: Option<String>,
    pub campus_id: i64,
    /// Parent, recorded as an ambassador of role `"Parent"`
    pub parent_ambassador_id: i64,
    pub base_fee: f64,
    pub discount_percent: f64,
    /// Lead this student was converted from
    pub lead_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campus::Entity",
        from = "Column::CampusId",
        to = "super::campus::Column::Id"
    )]
    Campus,
    #[sea_orm(
        belongs_to = "super::ambassador::Entity",
        from = "Column::ParentAmbassadorId",
        to = "super::ambassador::Column::Id"
    )]
    Parent,
}

impl Related<super::campus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campus.def()
    }
}

impl Related<super::ambassador::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
