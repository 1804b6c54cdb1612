//! Autocomplete handlers for Discord slash command parameters.
//!
//! This module suggests campus codes, referral codes and the fixed choices
//! (statuses, roles, fee plans) while the operator types, so that command
//! options match what the core expects.

use crate::{
    bot::BotData,
    core::{
        ambassador::{self, AmbassadorStatus, Role},
        campus,
        lifecycle::{FeePlan, ReferralStatus},
    },
    errors::Error,
};

/// Discord shows at most this many suggestions
const MAX_SUGGESTIONS: usize = 25;

fn matching<I>(candidates: I, partial: &str) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let partial_lower = partial.trim().to_lowercase();
    let mut matching: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| candidate.to_lowercase().contains(&partial_lower))
        .take(MAX_SUGGESTIONS)
        .collect();
    matching.sort();
    matching
}

/// Provides autocomplete suggestions for campus codes.
///
/// Both the code and the campus name are matched, but only the code is
/// suggested so the value can be passed straight to the lookup.
pub async fn autocomplete_campus_code(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let Ok(campuses) = campus::list_campuses(&ctx.data().database).await else {
        return Vec::new();
    };

    let partial_lower = partial.trim().to_lowercase();
    let mut codes: Vec<String> = campuses
        .into_iter()
        .filter(|c| {
            c.code.to_lowercase().contains(&partial_lower)
                || c.name.to_lowercase().contains(&partial_lower)
        })
        .map(|c| c.code)
        .take(MAX_SUGGESTIONS)
        .collect();
    codes.sort();
    codes
}

/// Provides autocomplete suggestions for referral codes of active
/// ambassadors.
pub async fn autocomplete_referral_code(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let Ok(ambassadors) = ambassador::list_ambassadors(
        &ctx.data().database,
        None,
        Some(AmbassadorStatus::Active),
    )
    .await
    else {
        return Vec::new();
    };

    let partial_lower = partial.trim().to_lowercase();
    let mut codes: Vec<String> = ambassadors
        .into_iter()
        .filter(|amb| {
            amb.referral_code.to_lowercase().contains(&partial_lower)
                || amb.full_name.to_lowercase().contains(&partial_lower)
        })
        .map(|amb| amb.referral_code)
        .take(MAX_SUGGESTIONS)
        .collect();
    codes.sort();
    codes
}

/// Suggests lead statuses.
pub async fn autocomplete_status(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    matching(
        ReferralStatus::ALL.iter().map(|s| s.as_str().to_string()),
        partial,
    )
}

/// Suggests ambassador roles.
pub async fn autocomplete_role(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    matching(Role::ALL.iter().map(|r| r.as_str().to_string()), partial)
}

/// Suggests fee plans.
pub async fn autocomplete_fee_plan(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    matching(
        [FeePlan::Otp, FeePlan::Wotp]
            .iter()
            .map(|p| p.as_str().to_string()),
        partial,
    )
}
