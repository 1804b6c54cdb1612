//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions such as autocomplete
//! and the parsing of free-text command options into core types.

/// Autocomplete handlers for campus codes, referral codes and fixed choices
pub mod autocomplete;
/// Conversion of command options into filters and lookups
pub mod input;
