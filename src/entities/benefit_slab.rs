//! Benefit slab entity - One row of the configurable benefit tier table.
//!
//! A slab applies once an ambassador reaches `referral_count` confirmed
//! referrals in the current academic year.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Benefit slab database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "benefit_slabs")]
pub struct Model {
    /// Unique identifier for the slab
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the tier (e.g., "Gold")
    pub tier_name: String,
    /// Minimum confirmed referrals needed to reach this tier
    pub referral_count: i32,
    /// Fee discount granted for the current year, in percent
    pub year_fee_benefit_percent: f64,
    /// Long-term percentage carried into later years at this tier
    pub base_long_term_percent: f64,
    /// Long-term percentage added per referral beyond this tier's threshold
    pub long_term_extra_percent: f64,
}

/// Slabs are standalone configuration
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
