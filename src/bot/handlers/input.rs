//! Conversion of slash command options into core types.
//!
//! Discord hands us strings; these helpers turn them into statuses, roles,
//! campus ids, date bounds and listing filters, returning validation errors
//! the operator can act on.

use crate::{
    core::{
        ambassador::{self, Role},
        campus,
        lifecycle::{BulkConfirmItem, ReferralStatus},
        live::LiveSnapshot,
        referral::ReferralFilter,
        report,
    },
    entities::ambassador as ambassador_entity,
    errors::{Error, Result},
};
use chrono::{NaiveDate, NaiveTime};
use sea_orm::{ConnectionTrait, prelude::DateTimeUtc};
use std::{fmt::Write, str::FromStr};

/// Longest message body Discord accepts, minus headroom for a suffix
pub const MESSAGE_LIMIT: usize = 1900;

/// Parses an optional choice such as a status, role or fee plan. Blank input
/// counts as absent.
pub fn parse_choice<T>(value: Option<&str>) -> Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(T::from_str)
        .transpose()
}

/// Parses a `YYYY-MM-DD` date into a listing bound. The start bound is
/// midnight of that day; the end bound is midnight of the following day,
/// since listings treat `to` as exclusive.
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Result<DateTimeUtc> {
    let mut date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        Error::validation(format!("'{value}' is not a date, expected YYYY-MM-DD"))
    })?;
    if end_of_day {
        date = date
            .succ_opt()
            .ok_or_else(|| Error::validation(format!("'{value}' is out of range")))?;
    }
    let midnight =
        NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(|| Error::validation("invalid time of day"))?;
    Ok(date.and_time(midnight).and_utc())
}

/// Parses `"12:ERP-001, 13:ERP-002"` into bulk confirm items. Entries are
/// separated by commas, semicolons or whitespace; `=` also separates the id
/// from its admission number.
pub fn parse_bulk_confirm_items(input: &str) -> Result<Vec<BulkConfirmItem>> {
    let items = input
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, admission_number) = entry
                .split_once([':', '='])
                .ok_or_else(|| Error::validation(format!("'{entry}' should look like 12:ERP-001")))?;
            let lead_id = id
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::validation(format!("'{id}' is not a lead id")))?;
            if admission_number.trim().is_empty() {
                return Err(Error::validation(format!(
                    "Lead {lead_id}: admission number is missing"
                )));
            }
            Ok(BulkConfirmItem {
                lead_id,
                admission_number: admission_number.trim().to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if items.is_empty() {
        return Err(Error::validation("No leads given"));
    }
    Ok(items)
}

/// Resolves a campus code to its id.
pub async fn campus_id_for_code<C>(db: &C, code: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    campus::get_campus_by_code(db, code)
        .await?
        .map(|found| found.id)
        .ok_or_else(|| Error::not_found("Campus", code.trim().to_ascii_uppercase()))
}

/// Resolves an optional campus code.
pub async fn optional_campus_id<C>(db: &C, code: Option<&str>) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    match code.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => Ok(Some(campus_id_for_code(db, code).await?)),
        None => Ok(None),
    }
}

/// Looks up an ambassador by referral code.
pub async fn ambassador_for_code<C>(db: &C, code: &str) -> Result<ambassador_entity::Model>
where
    C: ConnectionTrait,
{
    ambassador::get_ambassador_by_code(db, code)
        .await?
        .ok_or_else(|| Error::not_found("Referral code", code.trim()))
}

/// Raw filter options as typed by the operator.
#[derive(Debug, Clone, Default)]
pub struct FilterArgs {
    pub status: Option<String>,
    pub role: Option<String>,
    pub campus: Option<String>,
    pub referral_code: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub search: Option<String>,
}

impl FilterArgs {
    /// Validates every option and builds the listing filter.
    pub async fn into_filter<C>(self, db: &C) -> Result<ReferralFilter>
    where
        C: ConnectionTrait,
    {
        let ambassador_id = match self.referral_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(ambassador_for_code(db, code).await?.id),
            _ => None,
        };
        let from = self
            .from
            .as_deref()
            .map(|value| parse_date_bound(value, false))
            .transpose()?;
        let to = self
            .to
            .as_deref()
            .map(|value| parse_date_bound(value, true))
            .transpose()?;
        if let (Some(from), Some(to)) = (from, to) {
            if from >= to {
                return Err(Error::validation("'from' must not be after 'to'"));
            }
        }

        Ok(ReferralFilter {
            status: parse_choice::<ReferralStatus>(self.status.as_deref())?,
            role: parse_choice::<Role>(self.role.as_deref())?,
            campus_id: optional_campus_id(db, self.campus.as_deref()).await?,
            ambassador_id,
            from,
            to,
            search: self
                .search
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
        })
    }
}

/// Cuts `text` at a line boundary so it fits in one message.
#[must_use]
pub fn fit_message(text: &str) -> String {
    if text.len() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut fitted = String::new();
    for line in text.lines() {
        if fitted.len() + line.len() + 1 > MESSAGE_LIMIT {
            break;
        }
        fitted.push_str(line);
        fitted.push('\n');
    }
    if fitted.matches("```").count() % 2 == 1 {
        fitted.push_str("```\n");
    }
    fitted.push_str("… (truncated)");
    fitted
}

/// Renders a live snapshot as a message body showing at most `limit` leads.
pub fn format_live_snapshot(snapshot: &LiveSnapshot, limit: usize) -> Result<String> {
    let mut text = format!("📡 **Live referrals** - {} matching", snapshot.rows.len());
    if let Some(at) = snapshot.refreshed_at {
        write!(text, " · refreshed {} UTC", at.format("%H:%M:%S"))?;
    }
    text.push('\n');
    if let Some(error) = &snapshot.error {
        writeln!(text, "⚠️ Last refresh failed: {error}")?;
    }
    if snapshot.rows.is_empty() {
        text.push_str("No leads match this filter yet.");
    } else {
        text.push_str("```\n");
        for row in snapshot.rows.iter().take(limit) {
            writeln!(text, "{}", report::format_lead_summary(row))?;
        }
        text.push_str("```");
        if snapshot.rows.len() > limit {
            write!(text, "\n…and {} more", snapshot.rows.len() - limit)?;
        }
    }
    Ok(fit_message(&text))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::lifecycle::FeePlan, test_utils::*};

    #[test]
    fn test_parse_choice() {
        assert_eq!(
            parse_choice::<ReferralStatus>(Some("follow-up")).unwrap(),
            Some(ReferralStatus::FollowUp)
        );
        assert_eq!(parse_choice::<FeePlan>(Some("  ")).unwrap(), None);
        assert_eq!(parse_choice::<Role>(None).unwrap(), None);
        assert!(parse_choice::<Role>(Some("principal")).is_err());
    }

    #[test]
    fn test_parse_date_bound() {
        let start = parse_date_bound("2025-06-01", false).unwrap();
        let end = parse_date_bound("2025-06-01", true).unwrap();
        assert_eq!(start.format("%Y-%m-%d %H:%M").to_string(), "2025-06-01 00:00");
        assert_eq!(end.format("%Y-%m-%d %H:%M").to_string(), "2025-06-02 00:00");
        assert!(matches!(
            parse_date_bound("01/06/2025", false),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_parse_bulk_confirm_items() {
        let items = parse_bulk_confirm_items("12:ERP-001, 13=ERP-002;14:ERP-003").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].lead_id, 13);
        assert_eq!(items[1].admission_number, "ERP-002");

        assert!(parse_bulk_confirm_items("12").is_err());
        assert!(parse_bulk_confirm_items("x:ERP").is_err());
        assert!(parse_bulk_confirm_items("12:").is_err());
        assert!(parse_bulk_confirm_items(" , ").is_err());
    }

    #[test]
    fn test_fit_message_cuts_on_lines() {
        let long = "line of text\n".repeat(400);
        let fitted = fit_message(&long);
        assert!(fitted.len() <= MESSAGE_LIMIT + "… (truncated)".len());
        assert!(fitted.ends_with("… (truncated)"));
        assert_eq!(fit_message("short"), "short");
    }

    #[tokio::test]
    async fn test_filter_args_resolve_codes() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;

        let filter = FilterArgs {
            status: Some("confirmed".to_string()),
            campus: Some("adyar".to_string()),
            referral_code: Some(amb.referral_code.clone()),
            search: Some("  ".to_string()),
            ..Default::default()
        }
        .into_filter(&db)
        .await?;

        assert_eq!(filter.status, Some(ReferralStatus::Confirmed));
        assert_eq!(filter.campus_id, Some(campus.id));
        assert_eq!(filter.ambassador_id, Some(amb.id));
        assert_eq!(filter.search, None);

        let unknown = FilterArgs {
            campus: Some("NOWHERE".to_string()),
            ..Default::default()
        }
        .into_filter(&db)
        .await;
        assert!(matches!(unknown, Err(Error::NotFound { .. })));

        let reversed = FilterArgs {
            from: Some("2025-07-01".to_string()),
            to: Some("2025-06-01".to_string()),
            ..Default::default()
        }
        .into_filter(&db)
        .await;
        assert!(matches!(reversed, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_format_live_snapshot() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        create_test_lead(&db, &amb, &campus).await?;
        create_test_lead(&db, &amb, &campus).await?;
        let rows = crate::core::referral::list_all_leads(&db, &ReferralFilter::default()).await?;

        let snapshot = LiveSnapshot {
            rows,
            generation: 1,
            ..Default::default()
        };
        let text = format_live_snapshot(&snapshot, 1)?;
        assert!(text.contains("2 matching"));
        assert!(text.contains("…and 1 more"));

        let empty = format_live_snapshot(&LiveSnapshot::default(), 5)?;
        assert!(empty.contains("No leads match"));
        Ok(())
    }
}
