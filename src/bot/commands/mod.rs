//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Tier table, campus, student and rollover administration
pub mod admin;

/// Ambassador registration and reports
pub mod ambassador;

/// Dashboard, leaderboard and campus comparison
pub mod analytics;

/// General utility commands
pub mod general;

/// Referral lead commands, bulk actions, export and live feeds
pub mod referral;

// Export commands
pub use admin::*;
pub use ambassador::*;
pub use analytics::*;
pub use general::*;
pub use referral::*;
