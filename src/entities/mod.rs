//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the program's tables and their relationships.
//! Enumerated columns (roles, statuses, fee plans) are stored as text and
//! mapped to typed enums in [`crate::core`].

pub mod ambassador;
pub mod benefit_slab;
pub mod campus;
pub mod campus_grade_fee;
pub mod referral_lead;
pub mod student;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use ambassador::{Column as AmbassadorColumn, Entity as Ambassador, Model as AmbassadorModel};
pub use benefit_slab::{
    Column as BenefitSlabColumn, Entity as BenefitSlab, Model as BenefitSlabModel,
};
pub use campus::{Column as CampusColumn, Entity as Campus, Model as CampusModel};
pub use campus_grade_fee::{
    Column as CampusGradeFeeColumn, Entity as CampusGradeFee, Model as CampusGradeFeeModel,
};
pub use referral_lead::{
    Column as ReferralLeadColumn, Entity as ReferralLead, Model as ReferralLeadModel,
};
pub use student::{Column as StudentColumn, Entity as Student, Model as StudentModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
