//! Bulk lead import from an uploaded CSV file.
//!
//! Rows are processed sequentially with per-row validation; a bad row is
//! counted and reported without aborting the batch. At most the first ten
//! error messages are returned.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::activity::ActivityEntry;
use crate::core::error::ApiError;
use crate::core::middleware::CurrentEmployee;
use crate::core::shared::enums::{
    ActivityAction, Currency, EntityType, LeadSource, LeadStatus, LeadType,
};
use crate::core::shared::schema::leads;
use crate::core::shared::state::AppState;
use crate::core::shared::ApiResponse;
use crate::leads::Lead;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const MAX_REPORTED_ERRORS: usize = 10;

/// One raw CSV row. All columns are optional strings; validation decides
/// what is acceptable.
#[derive(Debug, Default, Deserialize)]
pub struct ImportRow {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "preferredLanguage")]
    pub preferred_language: Option<String>,
    pub notes: Option<String>,
    pub value: Option<String>,
    pub currency: Option<String>,
    pub tags: Option<String>,
}

/// A validated row with defaults applied, ready to insert.
#[derive(Debug, PartialEq)]
pub struct LeadDraft {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub lead_type: LeadType,
    pub location: Option<String>,
    pub preferred_language: String,
    pub notes: Option<String>,
    pub value: f64,
    pub currency: Currency,
    pub tags: Vec<String>,
}

fn clean(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate one row and apply the import defaults. `row_number` is 1-based
/// and used only for error messages.
pub fn validate_row(row_number: usize, row: &ImportRow) -> Result<LeadDraft, String> {
    let name = clean(&row.name);
    let email = clean(&row.email).map(|e| e.to_lowercase());
    let (Some(name), Some(email)) = (name, email) else {
        return Err(format!("Row {row_number}: Name and email are required"));
    };

    let parse = |label: &str, err: String| format!("Row {row_number}: invalid {label} ({err})");

    let source = match clean(&row.source) {
        Some(s) => s.parse().map_err(|e| parse("source", e))?,
        None => LeadSource::Website,
    };
    let status = match clean(&row.status) {
        Some(s) => s.parse().map_err(|e| parse("status", e))?,
        None => LeadStatus::Open,
    };
    let lead_type = match clean(&row.lead_type) {
        Some(s) => s.parse().map_err(|e| parse("type", e))?,
        None => LeadType::Warm,
    };
    let currency = match clean(&row.currency) {
        Some(s) => s.parse().map_err(|e| parse("currency", e))?,
        None => Currency::Usd,
    };

    let value = clean(&row.value)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
        .max(0.0);

    let tags = clean(&row.tags)
        .map(|t| {
            t.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(LeadDraft {
        name,
        email,
        phone: clean(&row.phone),
        company: clean(&row.company),
        source,
        status,
        lead_type,
        location: clean(&row.location),
        preferred_language: clean(&row.preferred_language)
            .unwrap_or_else(|| "English".to_string()),
        notes: clean(&row.notes),
        value,
        currency,
        tags,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

pub async fn upload_leads(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ImportSummary>>, ApiError> {
    current.require_admin()?;

    let mut file_bytes: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("csvFile") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            if !filename.to_lowercase().ends_with(".csv") && content_type != "text/csv" {
                return Err(ApiError::UploadRejected(
                    "Only CSV files are allowed".to_string(),
                ));
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::UploadRejected("File upload error".to_string()))?;
            if bytes.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::UploadRejected(
                    "File too large. Maximum size is 5MB.".to_string(),
                ));
            }
            file_bytes = Some(bytes.to_vec());
        }
    }

    let bytes =
        file_bytes.ok_or_else(|| ApiError::UploadRejected("CSV file is required".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());

    let mut errors: Vec<String> = Vec::new();
    let mut total = 0usize;
    let mut success_count = 0usize;
    let mut error_count = 0usize;

    let mut conn = state.conn.get()?;

    for (i, record) in reader.deserialize::<ImportRow>().enumerate() {
        total += 1;
        let row_number = i + 1;

        let row = match record {
            Ok(row) => row,
            Err(e) => {
                errors.push(format!("Row {row_number}: {e}"));
                error_count += 1;
                continue;
            }
        };

        let draft = match validate_row(row_number, &row) {
            Ok(draft) => draft,
            Err(e) => {
                errors.push(e);
                error_count += 1;
                continue;
            }
        };

        let duplicates: i64 = leads::table
            .filter(leads::email.eq(&draft.email))
            .count()
            .get_result(&mut conn)?;
        if duplicates > 0 {
            errors.push(format!(
                "Row {row_number}: Lead with email {} already exists",
                draft.email
            ));
            error_count += 1;
            continue;
        }

        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            company: draft.company,
            source: draft.source,
            status: draft.status,
            lead_type: draft.lead_type,
            assigned_to: None,
            location: draft.location,
            preferred_language: draft.preferred_language,
            notes: draft.notes,
            value: draft.value,
            currency: draft.currency,
            tags: draft.tags,
            scheduled_call_date: None,
            scheduled_call_type: None,
            scheduled_call_notes: None,
            assigned_date: None,
            closed_date: draft.status.is_terminal().then_some(now),
            last_contact: Some(now),
            next_follow_up: None,
            created_at: now,
            updated_at: now,
        };

        // The unique index backstops a concurrent duplicate insert; report
        // it as a row failure rather than aborting the batch.
        match diesel::insert_into(leads::table)
            .values(&lead)
            .execute(&mut conn)
        {
            Ok(_) => {
                success_count += 1;
                state.activity.record(
                    ActivityEntry::new(
                        current.id,
                        ActivityAction::LeadImported,
                        EntityType::Lead,
                        format!(
                            "{} imported lead {} from CSV",
                            current.full_name(),
                            lead.name
                        ),
                    )
                    .entity(lead.id)
                    .details(serde_json::json!({ "source": "csv_upload" })),
                );
            }
            Err(e) => {
                errors.push(format!("Row {row_number}: {e}"));
                error_count += 1;
            }
        }
    }

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::CsvUploaded,
            EntityType::System,
            format!(
                "{} uploaded a CSV with {total} rows ({success_count} imported)",
                current.full_name()
            ),
        )
        .details(serde_json::json!({
            "totalProcessed": total,
            "successCount": success_count,
            "errorCount": error_count,
        })),
    );

    errors.truncate(MAX_REPORTED_ERRORS);

    Ok(Json(ApiResponse::ok_with_message(
        ImportSummary {
            total_processed: total,
            success_count,
            error_count,
            errors,
        },
        "CSV upload completed",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: Option<&str>, email: Option<&str>) -> ImportRow {
        ImportRow {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn missing_name_or_email_is_rejected_with_position() {
        let err = validate_row(3, &row(None, Some("a@x.com"))).unwrap_err();
        assert_eq!(err, "Row 3: Name and email are required");

        let err = validate_row(7, &row(Some("Acme"), None)).unwrap_err();
        assert_eq!(err, "Row 7: Name and email are required");

        // Whitespace-only counts as missing.
        let err = validate_row(1, &row(Some("   "), Some("a@x.com"))).unwrap_err();
        assert_eq!(err, "Row 1: Name and email are required");
    }

    #[test]
    fn defaults_applied_to_sparse_row() {
        let draft = validate_row(1, &row(Some(" Acme Corp "), Some(" Jane@X.Com "))).unwrap();
        assert_eq!(draft.name, "Acme Corp");
        assert_eq!(draft.email, "jane@x.com");
        assert_eq!(draft.source, LeadSource::Website);
        assert_eq!(draft.status, LeadStatus::Open);
        assert_eq!(draft.lead_type, LeadType::Warm);
        assert_eq!(draft.preferred_language, "English");
        assert_eq!(draft.currency, Currency::Usd);
        assert_eq!(draft.value, 0.0);
        assert!(draft.tags.is_empty());
    }

    #[test]
    fn explicit_fields_are_parsed() {
        let mut r = row(Some("Acme"), Some("a@x.com"));
        r.source = Some("Trade Show".to_string());
        r.status = Some("contacted".to_string());
        r.lead_type = Some("hot".to_string());
        r.currency = Some("eur".to_string());
        r.value = Some("1250.50".to_string());
        r.tags = Some("enterprise, priority , ,q3".to_string());

        let draft = validate_row(1, &r).unwrap();
        assert_eq!(draft.source, LeadSource::TradeShow);
        assert_eq!(draft.status, LeadStatus::Contacted);
        assert_eq!(draft.lead_type, LeadType::Hot);
        assert_eq!(draft.currency, Currency::Eur);
        assert_eq!(draft.value, 1250.50);
        assert_eq!(draft.tags, vec!["enterprise", "priority", "q3"]);
    }

    #[test]
    fn invalid_enum_value_fails_the_row() {
        let mut r = row(Some("Acme"), Some("a@x.com"));
        r.status = Some("done".to_string());
        let err = validate_row(4, &r).unwrap_err();
        assert!(err.starts_with("Row 4: invalid status"));
    }

    #[test]
    fn unparseable_value_falls_back_to_zero() {
        let mut r = row(Some("Acme"), Some("a@x.com"));
        r.value = Some("lots".to_string());
        assert_eq!(validate_row(1, &r).unwrap().value, 0.0);

        let mut r = row(Some("Acme"), Some("a@x.com"));
        r.value = Some("-50".to_string());
        assert_eq!(validate_row(1, &r).unwrap().value, 0.0);
    }

    #[test]
    fn csv_rows_deserialize_by_header() {
        let data = "name,email,type,preferredLanguage\nAcme,a@x.com,cold,Spanish\n";
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());
        let rows: Vec<ImportRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        let draft = validate_row(1, &rows[0]).unwrap();
        assert_eq!(draft.lead_type, LeadType::Cold);
        assert_eq!(draft.preferred_language, "Spanish");
    }
}
