//! Referral record store - lead creation and the filtered, paginated listing
//! used by operators, CSV export and the live feed.

use crate::{
    core::{
        ambassador::{self, AmbassadorStatus, Role},
        campus,
        lifecycle::{FeePlan, ReferralStatus},
    },
    entities::{Ambassador, Campus, ReferralLead, ambassador as ambassador_entity, referral_lead},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, Select, SelectTwo, Set, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, instrument};

/// Default number of leads per listing page
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Intake form for a new lead, attributed through a referral code.
#[derive(Debug, Clone)]
pub struct NewReferral {
    pub referral_code: String,
    pub parent_name: String,
    pub parent_mobile: String,
    pub student_name: Option<String>,
    pub grade: String,
    pub campus_id: i64,
    pub notes: Option<String>,
    pub preferred_fee_plan: Option<FeePlan>,
}

/// Read-side filter for lead listings. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferralFilter {
    pub status: Option<ReferralStatus>,
    /// Role of the owning ambassador
    pub role: Option<Role>,
    pub campus_id: Option<i64>,
    pub ambassador_id: Option<i64>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTimeUtc>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTimeUtc>,
    /// Matches parent name, student name, parent mobile or admission number
    pub search: Option<String>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub per_page: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A lead joined with its owner and campus for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRow {
    pub lead: referral_lead::Model,
    pub ambassador_name: String,
    pub referral_code: String,
    pub ambassador_role: String,
    pub campus_name: String,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferralPage {
    pub items: Vec<LeadRow>,
    /// Leads matching the filter across all pages
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl ReferralPage {
    /// Number of pages needed for `total` leads.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page)
        }
    }
}

fn required(label: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{label} is required")));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Records a new lead in status New.
///
/// The referral code must belong to an active ambassador and the campus
/// must exist.
#[instrument(skip(db, new), fields(referral_code = %new.referral_code))]
pub async fn create_referral(db: &DatabaseConnection, new: NewReferral) -> Result<referral_lead::Model> {
    let parent_name = required("Parent name", &new.parent_name)?;
    let grade = required("Grade", &new.grade)?;
    let parent_mobile = ambassador::normalize_mobile(&new.parent_mobile)?;

    let owner = ambassador::get_ambassador_by_code(db, &new.referral_code)
        .await?
        .ok_or_else(|| Error::not_found("Referral code", new.referral_code.trim()))?;
    if owner.status != AmbassadorStatus::Active.as_str() {
        return Err(Error::validation(format!(
            "Referral code {} is inactive",
            owner.referral_code
        )));
    }
    campus::require_campus(db, new.campus_id).await?;

    let now = Utc::now();
    let created = referral_lead::ActiveModel {
        ambassador_id: Set(owner.id),
        parent_name: Set(parent_name),
        parent_mobile: Set(parent_mobile),
        student_name: Set(optional_text(new.student_name)),
        grade: Set(grade),
        campus_id: Set(new.campus_id),
        notes: Set(optional_text(new.notes)),
        preferred_fee_plan: Set(new.preferred_fee_plan.map(|plan| plan.as_str().to_string())),
        status: Set(ReferralStatus::New.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Lead {} created for ambassador {} ({})",
        created.id, owner.id, owner.referral_code
    );
    Ok(created)
}

/// Finds a lead by id.
pub async fn get_referral<C>(db: &C, lead_id: i64) -> Result<Option<referral_lead::Model>>
where
    C: ConnectionTrait,
{
    ReferralLead::find_by_id(lead_id)
        .one(db)
        .await
        .map_err(Into::into)
}

fn apply_filter(
    query: Select<ReferralLead>,
    filter: &ReferralFilter,
) -> SelectTwo<ReferralLead, Ambassador> {
    let mut query = query;
    if let Some(status) = filter.status {
        query = query.filter(referral_lead::Column::Status.eq(status.as_str()));
    }
    if let Some(campus_id) = filter.campus_id {
        query = query.filter(referral_lead::Column::CampusId.eq(campus_id));
    }
    if let Some(ambassador_id) = filter.ambassador_id {
        query = query.filter(referral_lead::Column::AmbassadorId.eq(ambassador_id));
    }
    if let Some(from) = filter.from {
        query = query.filter(referral_lead::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(referral_lead::Column::CreatedAt.lt(to));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(referral_lead::Column::ParentName.contains(search))
                .add(referral_lead::Column::StudentName.contains(search))
                .add(referral_lead::Column::ParentMobile.contains(search))
                .add(referral_lead::Column::AdmissionNumber.contains(search)),
        );
    }

    let mut joined = query.find_also_related(Ambassador);
    if let Some(role) = filter.role {
        joined = joined.filter(ambassador_entity::Column::Role.eq(role.as_str()));
    }
    joined
        .order_by_desc(referral_lead::Column::CreatedAt)
        .order_by_desc(referral_lead::Column::Id)
}

async fn into_rows<C>(
    db: &C,
    pairs: Vec<(referral_lead::Model, Option<ambassador_entity::Model>)>,
) -> Result<Vec<LeadRow>>
where
    C: ConnectionTrait,
{
    let campus_names: HashMap<i64, String> = Campus::find()
        .all(db)
        .await?
        .into_iter()
        .map(|campus| (campus.id, campus.name))
        .collect();

    Ok(pairs
        .into_iter()
        .map(|(lead, owner)| {
            let (ambassador_name, referral_code, ambassador_role) = owner.map_or_else(
                || (String::new(), String::new(), String::new()),
                |owner| (owner.full_name, owner.referral_code, owner.role),
            );
            let campus_name = campus_names.get(&lead.campus_id).cloned().unwrap_or_default();
            LeadRow {
                lead,
                ambassador_name,
                referral_code,
                ambassador_role,
                campus_name,
            }
        })
        .collect())
}

/// Lists leads matching `filter`, newest first, one page at a time.
pub async fn list_referrals<C>(db: &C, filter: &ReferralFilter, page: Page) -> Result<ReferralPage>
where
    C: ConnectionTrait,
{
    if page.page == 0 || page.per_page == 0 {
        return Err(Error::validation("Page and page size start at 1"));
    }

    let paginator = apply_filter(ReferralLead::find(), filter).paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let pairs = paginator.fetch_page(page.page - 1).await?;

    Ok(ReferralPage {
        items: into_rows(db, pairs).await?,
        total,
        page: page.page,
        per_page: page.per_page,
    })
}

/// Every lead matching `filter`, newest first.
pub async fn list_all_leads<C>(db: &C, filter: &ReferralFilter) -> Result<Vec<LeadRow>>
where
    C: ConnectionTrait,
{
    let pairs = apply_filter(ReferralLead::find(), filter).all(db).await?;
    into_rows(db, pairs).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::lifecycle::{self, ConfirmAdmission},
        test_utils::*,
    };

    fn intake(code: &str, campus_id: i64) -> NewReferral {
        NewReferral {
            referral_code: code.to_string(),
            parent_name: "Meena K".to_string(),
            parent_mobile: "98765 43210".to_string(),
            student_name: Some("  ".to_string()),
            grade: "Grade 5".to_string(),
            campus_id,
            notes: None,
            preferred_fee_plan: Some(FeePlan::Otp),
        }
    }

    #[tokio::test]
    async fn test_create_referral_starts_new() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        let lead = create_referral(&db, intake(&amb.referral_code.to_lowercase(), campus.id)).await?;

        assert_eq!(lead.status, "New");
        assert_eq!(lead.ambassador_id, amb.id);
        assert_eq!(lead.parent_mobile, "9876543210");
        assert!(lead.student_name.is_none());
        assert_eq!(lead.preferred_fee_plan.as_deref(), Some("OTP"));
        assert!(lead.admission_number.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_referral_rejects_inactive_or_unknown_code() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;

        let unknown = create_referral(&db, intake("NOPE01", campus.id)).await;
        assert!(matches!(unknown, Err(Error::NotFound { .. })));

        let missing_campus = create_referral(&db, intake(&amb.referral_code, 404)).await;
        assert!(matches!(missing_campus, Err(Error::NotFound { .. })));

        ambassador::set_ambassador_status(&db, amb.id, AmbassadorStatus::Inactive).await?;
        let inactive = create_referral(&db, intake(&amb.referral_code, campus.id)).await;
        assert!(matches!(inactive, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_referrals_filters_and_pages() -> Result<()> {
        let (db, parent, campus) = setup_with_ambassador().await?;
        let staff = create_test_ambassador(&db, "Kumar", "9840000002", Role::Staff).await?;
        let other_campus = create_test_campus(&db, "TNAGAR").await?;

        for _ in 0..3 {
            create_test_lead(&db, &parent, &campus).await?;
        }
        let staff_lead = create_test_lead(&db, &staff, &other_campus).await?;
        lifecycle::confirm_referral(
            &db,
            staff_lead.id,
            &ConfirmAdmission {
                admission_number: "ERP-7788".to_string(),
                fee_plan: Some(FeePlan::Otp),
                annual_fee: Some(50_000.0),
            },
            test_year(),
        )
        .await?;

        let everything = list_referrals(&db, &ReferralFilter::default(), Page::default()).await?;
        assert_eq!(everything.total, 4);
        // Newest first
        assert_eq!(everything.items[0].lead.id, staff_lead.id);
        assert_eq!(everything.items[0].ambassador_role, "Staff");
        assert_eq!(everything.items[0].campus_name, other_campus.name);

        let by_role = ReferralFilter {
            role: Some(Role::Parent),
            ..Default::default()
        };
        let second_page = list_referrals(&db, &by_role, Page { page: 2, per_page: 2 }).await?;
        assert_eq!(second_page.total, 3);
        assert_eq!(second_page.items.len(), 1);
        assert_eq!(second_page.page_count(), 2);

        let confirmed = ReferralFilter {
            status: Some(ReferralStatus::Confirmed),
            campus_id: Some(other_campus.id),
            ..Default::default()
        };
        assert_eq!(list_all_leads(&db, &confirmed).await?.len(), 1);

        let by_erp = ReferralFilter {
            search: Some("7788".to_string()),
            ..Default::default()
        };
        let found = list_all_leads(&db, &by_erp).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].referral_code, staff.referral_code);

        let invalid = list_referrals(&db, &ReferralFilter::default(), Page { page: 0, per_page: 5 }).await;
        assert!(matches!(invalid, Err(Error::Validation { .. })));
        Ok(())
    }
}
