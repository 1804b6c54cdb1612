//! CSV export of referral listings.

use crate::{core::referral::LeadRow, errors::Result};
use std::fmt::Write;

/// Column headers, in output order.
pub const CSV_HEADERS: [&str; 16] = [
    "Lead ID",
    "Created",
    "Status",
    "Parent Name",
    "Parent Mobile",
    "Student Name",
    "Grade",
    "Campus",
    "Ambassador",
    "Referral Code",
    "Role",
    "Admission Number",
    "Fee Plan",
    "Annual Fee",
    "Confirmed",
    "Student ID",
];

/// Quotes a field when it contains a separator, quote or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_record(out: &mut String, fields: &[String]) -> Result<()> {
    let line = fields
        .iter()
        .map(|field| quote(field))
        .collect::<Vec<_>>()
        .join(",");
    write!(out, "{line}\r\n")?;
    Ok(())
}

/// Serializes leads as RFC 4180 CSV with a header row and CRLF line endings.
pub fn export_referrals_csv(rows: &[LeadRow]) -> Result<String> {
    let mut out = String::new();
    let headers: Vec<String> = CSV_HEADERS.iter().map(ToString::to_string).collect();
    write_record(&mut out, &headers)?;

    for row in rows {
        let lead = &row.lead;
        write_record(
            &mut out,
            &[
                lead.id.to_string(),
                lead.created_at.format("%Y-%m-%d %H:%M").to_string(),
                lead.status.clone(),
                lead.parent_name.clone(),
                lead.parent_mobile.clone(),
                lead.student_name.clone().unwrap_or_default(),
                lead.grade.clone(),
                row.campus_name.clone(),
                row.ambassador_name.clone(),
                row.referral_code.clone(),
                row.ambassador_role.clone(),
                lead.admission_number.clone().unwrap_or_default(),
                lead.fee_plan.clone().unwrap_or_default(),
                lead.annual_fee.map(|fee| format!("{fee:.2}")).unwrap_or_default(),
                lead.confirmed_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                lead.student_id.map(|id| id.to_string()).unwrap_or_default(),
            ],
        )?;
    }
    Ok(out)
}
