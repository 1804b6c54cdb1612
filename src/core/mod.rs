//! Core business logic - framework-agnostic referral and benefit operations.
//!
//! Nothing in here knows about Discord. Every mutation goes through a named
//! operation that enforces the referral lifecycle and keeps the ambassador
//! benefit cache consistent.

/// Academic year arithmetic
pub mod academic_year;
/// Ambassador registration, lookups and benefit recomputation
pub mod ambassador;
/// Dashboards, leaderboard and campus comparison
pub mod analytics;
/// Campuses and their per-grade fee table
pub mod campus;
/// CSV export of referral listings
pub mod export;
/// Lead state machine and bulk operations
pub mod lifecycle;
/// Periodic refresh of a filtered lead list
pub mod live;
/// Lead creation and listing
pub mod referral;
/// Ambassador reports and display formatting
pub mod report;
/// Academic-year rollover of cached benefits
pub mod rollover;
/// Students and lead conversion
pub mod student;
/// Benefit tier resolution and slab management
pub mod tier;
