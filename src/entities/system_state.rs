//! System state entity - Key-value rows for program bookkeeping.
//! Currently holds the academic year of the last benefit rollover.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// System state database model - stores key-value pairs
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_state")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Lookup key (e.g., `"last_academic_year_rollover"`)
    #[sea_orm(unique)]
    pub key: String,
    pub value: String,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
