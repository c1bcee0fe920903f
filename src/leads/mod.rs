//! Lead lifecycle: creation, funnel transitions, assignment, scheduling.
//!
//! Assignment is a single-row update on `leads.assigned_to`; the owning
//! employee's lead list is always derived by query, so reassignment cannot
//! leak or duplicate references.

pub mod import;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Duration, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::activity::ActivityEntry;
use crate::core::error::ApiError;
use crate::core::middleware::CurrentEmployee;
use crate::core::shared::enums::{
    ActivityAction, CallType, Currency, EntityType, LeadSource, LeadStatus, LeadType,
};
use crate::core::shared::schema::{employees, leads};
use crate::core::shared::state::AppState;
use crate::core::shared::{page_window, ApiResponse, Pagination};
use crate::dashboard::conversion_rate;

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = leads)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    #[serde(rename = "type")]
    pub lead_type: LeadType,
    pub assigned_to: Option<Uuid>,
    pub location: Option<String>,
    pub preferred_language: String,
    pub notes: Option<String>,
    pub value: f64,
    pub currency: Currency,
    pub tags: Vec<String>,
    pub scheduled_call_date: Option<DateTime<Utc>>,
    pub scheduled_call_type: Option<CallType>,
    pub scheduled_call_notes: Option<String>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub closed_date: Option<DateTime<Utc>>,
    pub last_contact: Option<DateTime<Utc>>,
    pub next_follow_up: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact lead view embedded in employee responses.
#[derive(Debug, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub status: LeadStatus,
    #[serde(rename = "type")]
    pub lead_type: LeadType,
    pub assigned_date: Option<DateTime<Utc>>,
}

pub fn lead_summaries_for(
    conn: &mut PgConnection,
    employee_id: Uuid,
) -> QueryResult<Vec<LeadSummary>> {
    leads::table
        .filter(leads::assigned_to.eq(employee_id))
        .order(leads::assigned_date.desc())
        .select((
            leads::id,
            leads::name,
            leads::email,
            leads::company,
            leads::status,
            leads::lead_type,
            leads::assigned_date,
        ))
        .load(conn)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerInfo {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadWithOwner {
    #[serde(flatten)]
    pub lead: Lead,
    pub assigned_employee: Option<OwnerInfo>,
}

fn owners_for(
    conn: &mut PgConnection,
    rows: &[Lead],
) -> QueryResult<HashMap<Uuid, OwnerInfo>> {
    let ids: Vec<Uuid> = rows.iter().filter_map(|l| l.assigned_to).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let owners: Vec<(Uuid, String, String, String)> = employees::table
        .filter(employees::id.eq_any(&ids))
        .select((
            employees::id,
            employees::first_name,
            employees::last_name,
            employees::email,
        ))
        .load(conn)?;
    Ok(owners
        .into_iter()
        .map(|(id, first_name, last_name, email)| {
            (
                id,
                OwnerInfo {
                    id,
                    first_name,
                    last_name,
                    email,
                },
            )
        })
        .collect())
}

fn with_owners(rows: Vec<Lead>, owners: HashMap<Uuid, OwnerInfo>) -> Vec<LeadWithOwner> {
    rows.into_iter()
        .map(|lead| {
            let assigned_employee = lead.assigned_to.and_then(|id| owners.get(&id).cloned());
            LeadWithOwner {
                lead,
                assigned_employee,
            }
        })
        .collect()
}

// ============================================================================
// Transitions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    NoChange,
    Moved,
    Terminal,
}

/// Apply a funnel transition, stamping `closed_date` exactly once when the
/// lead first enters a terminal stage.
pub fn apply_transition(
    lead: &mut Lead,
    to: LeadStatus,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, ApiError> {
    let from = lead.status;
    if !from.can_transition(to) {
        return Err(ApiError::IllegalTransition { from, to });
    }
    if from == to {
        return Ok(TransitionOutcome::NoChange);
    }
    lead.status = to;
    if to.is_terminal() {
        lead.closed_date = Some(now);
        Ok(TransitionOutcome::Terminal)
    } else {
        Ok(TransitionOutcome::Moved)
    }
}

fn find_lead(conn: &mut PgConnection, id: Uuid) -> Result<Lead, ApiError> {
    leads::table
        .filter(leads::id.eq(id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Lead"))
}

fn employee_exists(conn: &mut PgConnection, id: Uuid) -> Result<bool, ApiError> {
    let count: i64 = employees::table
        .filter(employees::id.eq(id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

fn lead_email_taken(conn: &mut PgConnection, email: &str) -> Result<bool, ApiError> {
    let count: i64 = leads::table
        .filter(leads::email.eq(email))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

fn require_lead_access(current: &CurrentEmployee, lead: &Lead) -> Result<(), ApiError> {
    if current.is_admin() || lead.assigned_to == Some(current.id) {
        Ok(())
    } else {
        Err(ApiError::AccessDenied)
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    #[serde(rename = "type")]
    pub lead_type: Option<LeadType>,
    pub assigned_to: Option<Uuid>,
    pub location: Option<String>,
    pub preferred_language: Option<String>,
    pub notes: Option<String>,
    pub value: Option<f64>,
    pub currency: Option<Currency>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    #[serde(rename = "type")]
    pub lead_type: Option<LeadType>,
    pub assigned_to: Option<Uuid>,
    pub location: Option<String>,
    pub preferred_language: Option<String>,
    pub notes: Option<String>,
    pub value: Option<f64>,
    pub currency: Option<Currency>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCallRequest {
    pub date: DateTime<Utc>,
    pub call_type: Option<CallType>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub source: Option<String>,
    pub location: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_filter<T: std::str::FromStr<Err = String>>(
    value: &Option<String>,
) -> Result<Option<T>, ApiError> {
    match non_empty(value) {
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: String| ApiError::Validation(vec![e])),
        None => Ok(None),
    }
}

// ============================================================================
// Handlers
// ============================================================================

struct LeadFilters<'a> {
    scope: Option<Uuid>,
    search: Option<&'a str>,
    status: Option<LeadStatus>,
    lead_type: Option<LeadType>,
    source: Option<LeadSource>,
    location: Option<&'a str>,
}

fn filtered_leads<'a>(f: &LeadFilters<'a>) -> leads::BoxedQuery<'a, Pg> {
    let mut q = leads::table.into_boxed();

    if let Some(owner) = f.scope {
        q = q.filter(leads::assigned_to.eq(owner));
    }
    if let Some(search) = f.search {
        let pattern = format!("%{search}%");
        q = q.filter(
            leads::name
                .ilike(pattern.clone())
                .or(leads::email.ilike(pattern.clone()))
                .or(leads::company.ilike(pattern.clone()))
                .or(leads::location.ilike(pattern.clone()))
                .or(leads::notes.ilike(pattern)),
        );
    }
    if let Some(status) = f.status {
        q = q.filter(leads::status.eq(status));
    }
    if let Some(lead_type) = f.lead_type {
        q = q.filter(leads::lead_type.eq(lead_type));
    }
    if let Some(source) = f.source {
        q = q.filter(leads::source.eq(source));
    }
    if let Some(location) = f.location {
        q = q.filter(leads::location.ilike(format!("%{location}%")));
    }
    q
}

fn order_leads<'a>(
    q: leads::BoxedQuery<'a, Pg>,
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> leads::BoxedQuery<'a, Pg> {
    let desc = !matches!(sort_order, Some("asc"));
    match sort_by.unwrap_or("createdAt") {
        "name" => {
            if desc {
                q.order(leads::name.desc())
            } else {
                q.order(leads::name.asc())
            }
        }
        "email" => {
            if desc {
                q.order(leads::email.desc())
            } else {
                q.order(leads::email.asc())
            }
        }
        "value" => {
            if desc {
                q.order(leads::value.desc())
            } else {
                q.order(leads::value.asc())
            }
        }
        "assignedDate" | "assigned_date" => {
            if desc {
                q.order(leads::assigned_date.desc())
            } else {
                q.order(leads::assigned_date.asc())
            }
        }
        _ => {
            if desc {
                q.order(leads::created_at.desc())
            } else {
                q.order(leads::created_at.asc())
            }
        }
    }
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Query(query): Query<LeadQuery>,
) -> Result<Json<ApiResponse<Vec<LeadWithOwner>>>, ApiError> {
    // Employees only see their own leads; admins may scope by assignee.
    let scope = if current.is_admin() {
        query.assigned_to
    } else {
        Some(current.id)
    };

    let filters = LeadFilters {
        scope,
        search: non_empty(&query.search),
        status: parse_filter(&query.status)?,
        lead_type: parse_filter(&query.lead_type)?,
        source: parse_filter(&query.source)?,
        location: non_empty(&query.location),
    };
    let (page, limit, offset) = page_window(query.page, query.limit);

    let mut conn = state.conn.get()?;

    let total: i64 = filtered_leads(&filters).count().get_result(&mut conn)?;

    let rows: Vec<Lead> = order_leads(
        filtered_leads(&filters),
        non_empty(&query.sort_by),
        non_empty(&query.sort_order),
    )
    .limit(limit)
    .offset(offset)
    .load(&mut conn)?;

    let owners = owners_for(&mut conn, &rows)?;

    Ok(Json(ApiResponse::paginated(
        with_owners(rows, owners),
        Pagination::new(page, limit, total),
    )))
}

pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LeadWithOwner>>, ApiError> {
    let mut conn = state.conn.get()?;
    let lead = find_lead(&mut conn, id)?;
    require_lead_access(&current, &lead)?;

    let owners = owners_for(&mut conn, std::slice::from_ref(&lead))?;
    let mut result = with_owners(vec![lead], owners);

    Ok(Json(ApiResponse::ok(result.remove(0))))
}

pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<Json<ApiResponse<Lead>>, ApiError> {
    current.require_admin()?;

    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_lowercase();
    if name.is_empty() || email.is_empty() {
        return Err(ApiError::BadRequest(
            "Name and email are required".to_string(),
        ));
    }

    let mut conn = state.conn.get()?;
    if lead_email_taken(&mut conn, &email)? {
        return Err(ApiError::Conflict(
            "Lead with this email already exists".to_string(),
        ));
    }

    if let Some(assignee) = req.assigned_to {
        if !employee_exists(&mut conn, assignee)? {
            return Err(ApiError::BadRequest(
                "Assigned employee not found".to_string(),
            ));
        }
    }

    let now = Utc::now();
    let status = req.status.unwrap_or_default();
    let lead = Lead {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email,
        phone: req.phone,
        company: req.company,
        source: req.source.unwrap_or_default(),
        status,
        lead_type: req.lead_type.unwrap_or_default(),
        assigned_to: req.assigned_to,
        location: req.location,
        preferred_language: req
            .preferred_language
            .unwrap_or_else(|| "English".to_string()),
        notes: req.notes,
        value: req.value.unwrap_or(0.0).max(0.0),
        currency: req.currency.unwrap_or_default(),
        tags: req.tags.unwrap_or_default(),
        scheduled_call_date: None,
        scheduled_call_type: None,
        scheduled_call_notes: None,
        assigned_date: req.assigned_to.map(|_| now),
        closed_date: status.is_terminal().then_some(now),
        last_contact: Some(now),
        next_follow_up: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(leads::table)
        .values(&lead)
        .execute(&mut conn)?;

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::LeadCreated,
            EntityType::Lead,
            format!("{} created new lead {}", current.full_name(), lead.name),
        )
        .entity(lead.id)
        .details(serde_json::json!({
            "status": lead.status,
            "type": lead.lead_type,
            "assignedTo": lead.assigned_to,
        })),
    );

    Ok(Json(ApiResponse::ok_with_message(
        lead,
        "Lead created successfully",
    )))
}

pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<ApiResponse<Lead>>, ApiError> {
    let mut conn = state.conn.get()?;
    let mut lead = find_lead(&mut conn, id)?;
    require_lead_access(&current, &lead)?;

    let now = Utc::now();
    let mut assignment_changed = false;
    let mut transition = TransitionOutcome::NoChange;

    // Assignment: validate the new owner and re-stamp the assignment date.
    if let Some(assignee) = req.assigned_to {
        if lead.assigned_to != Some(assignee) {
            if !employee_exists(&mut conn, assignee)? {
                return Err(ApiError::not_found("Assigned employee"));
            }
            lead.assigned_to = Some(assignee);
            lead.assigned_date = Some(now);
            assignment_changed = true;
        }
    }

    // Status moves through the funnel state machine.
    if let Some(status) = req.status {
        transition = apply_transition(&mut lead, status, now)?;
    }

    if let Some(name) = req.name {
        lead.name = name;
    }
    if let Some(email) = req.email {
        let email = email.trim().to_lowercase();
        if email != lead.email {
            if lead_email_taken(&mut conn, &email)? {
                return Err(ApiError::Conflict(
                    "Lead with this email already exists".to_string(),
                ));
            }
            lead.email = email;
        }
    }
    if let Some(phone) = req.phone {
        lead.phone = Some(phone);
    }
    if let Some(company) = req.company {
        lead.company = Some(company);
    }
    if let Some(source) = req.source {
        lead.source = source;
    }
    if let Some(lead_type) = req.lead_type {
        lead.lead_type = lead_type;
    }
    if let Some(location) = req.location {
        lead.location = Some(location);
    }
    if let Some(preferred_language) = req.preferred_language {
        lead.preferred_language = preferred_language;
    }
    if let Some(notes) = req.notes {
        lead.notes = Some(notes);
    }
    if let Some(value) = req.value {
        lead.value = value.max(0.0);
    }
    if let Some(currency) = req.currency {
        lead.currency = currency;
    }
    if let Some(tags) = req.tags {
        lead.tags = tags;
    }
    lead.updated_at = now;

    diesel::update(leads::table.filter(leads::id.eq(id)))
        .set(&lead)
        .execute(&mut conn)?;

    if assignment_changed {
        state.activity.record(
            ActivityEntry::new(
                current.id,
                ActivityAction::LeadAssigned,
                EntityType::Lead,
                format!("{} assigned lead {}", current.full_name(), lead.name),
            )
            .entity(lead.id)
            .details(serde_json::json!({ "assignedTo": lead.assigned_to })),
        );
    }
    match transition {
        TransitionOutcome::Terminal => {
            state.activity.record(
                ActivityEntry::new(
                    current.id,
                    ActivityAction::LeadClosed,
                    EntityType::Lead,
                    format!(
                        "{} closed lead {} as {}",
                        current.full_name(),
                        lead.name,
                        lead.status
                    ),
                )
                .entity(lead.id),
            );
        }
        TransitionOutcome::Moved => {
            state.activity.record(
                ActivityEntry::new(
                    current.id,
                    ActivityAction::StatusChanged,
                    EntityType::Lead,
                    format!(
                        "{} moved lead {} to {}",
                        current.full_name(),
                        lead.name,
                        lead.status
                    ),
                )
                .entity(lead.id),
            );
        }
        TransitionOutcome::NoChange => {}
    }
    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::LeadUpdated,
            EntityType::Lead,
            format!("{} updated lead {}", current.full_name(), lead.name),
        )
        .entity(lead.id),
    );

    Ok(Json(ApiResponse::ok_with_message(
        lead,
        "Lead updated successfully",
    )))
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    current.require_admin()?;

    let mut conn = state.conn.get()?;
    let lead = find_lead(&mut conn, id)?;

    diesel::delete(leads::table.filter(leads::id.eq(id))).execute(&mut conn)?;

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::LeadDeleted,
            EntityType::Lead,
            format!("{} deleted lead {}", current.full_name(), lead.name),
        )
        .details(serde_json::json!({ "deletedLeadId": id })),
    );

    Ok(Json(ApiResponse::message("Lead deleted successfully")))
}

pub async fn schedule_call(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
    Json(req): Json<ScheduleCallRequest>,
) -> Result<Json<ApiResponse<Lead>>, ApiError> {
    let mut conn = state.conn.get()?;
    let mut lead = find_lead(&mut conn, id)?;
    require_lead_access(&current, &lead)?;

    let call_type = req.call_type.unwrap_or(CallType::ColdCall);
    lead.scheduled_call_date = Some(req.date);
    lead.scheduled_call_type = Some(call_type);
    lead.scheduled_call_notes = req.notes;
    lead.next_follow_up = Some(req.date);
    lead.updated_at = Utc::now();

    diesel::update(leads::table.filter(leads::id.eq(id)))
        .set(&lead)
        .execute(&mut conn)?;

    let action = if call_type == CallType::FollowUp {
        ActivityAction::FollowUpScheduled
    } else {
        ActivityAction::CallScheduled
    };
    state.activity.record(
        ActivityEntry::new(
            current.id,
            action,
            EntityType::Lead,
            format!(
                "{} scheduled a call with lead {}",
                current.full_name(),
                lead.name
            ),
        )
        .entity(lead.id)
        .details(serde_json::json!({ "date": req.date, "callType": call_type })),
    );

    Ok(Json(ApiResponse::ok_with_message(
        lead,
        "Call scheduled successfully",
    )))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCount {
    pub source: LeadSource,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total_leads: i64,
    pub unassigned_leads: i64,
    pub open_leads: i64,
    pub closed_leads: i64,
    pub lost_leads: i64,
    pub hot_leads: i64,
    pub warm_leads: i64,
    pub cold_leads: i64,
    pub leads_this_week: i64,
    pub conversion_rate: String,
    pub source_stats: Vec<SourceCount>,
}

pub async fn lead_stats(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
) -> Result<Json<ApiResponse<LeadStats>>, ApiError> {
    current.require_admin()?;

    let mut conn = state.conn.get()?;

    let total_leads: i64 = leads::table.count().get_result(&mut conn)?;
    let unassigned_leads: i64 = leads::table
        .filter(leads::assigned_to.is_null())
        .count()
        .get_result(&mut conn)?;
    let open_leads: i64 = leads::table
        .filter(leads::status.eq_any(LeadStatus::OPEN_STAGES))
        .count()
        .get_result(&mut conn)?;
    let closed_leads: i64 = leads::table
        .filter(leads::status.eq(LeadStatus::Closed))
        .count()
        .get_result(&mut conn)?;
    let lost_leads: i64 = leads::table
        .filter(leads::status.eq(LeadStatus::Lost))
        .count()
        .get_result(&mut conn)?;
    let hot_leads: i64 = leads::table
        .filter(leads::lead_type.eq(LeadType::Hot))
        .count()
        .get_result(&mut conn)?;
    let warm_leads: i64 = leads::table
        .filter(leads::lead_type.eq(LeadType::Warm))
        .count()
        .get_result(&mut conn)?;
    let cold_leads: i64 = leads::table
        .filter(leads::lead_type.eq(LeadType::Cold))
        .count()
        .get_result(&mut conn)?;
    let leads_this_week: i64 = leads::table
        .filter(leads::assigned_date.ge(Utc::now() - Duration::days(7)))
        .count()
        .get_result(&mut conn)?;

    let source_stats: Vec<SourceCount> = leads::table
        .group_by(leads::source)
        .select((leads::source, diesel::dsl::count_star()))
        .order(diesel::dsl::count_star().desc())
        .load::<(LeadSource, i64)>(&mut conn)?
        .into_iter()
        .map(|(source, count)| SourceCount { source, count })
        .collect();

    Ok(Json(ApiResponse::ok(LeadStats {
        total_leads,
        unassigned_leads,
        open_leads,
        closed_leads,
        lost_leads,
        hot_leads,
        warm_leads,
        cold_leads,
        leads_this_week,
        conversion_rate: conversion_rate(closed_leads, total_leads),
        source_stats,
    })))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/stats", get(lead_stats))
        .route("/api/leads/upload", post(import::upload_leads))
        .route(
            "/api/leads/:id",
            get(get_lead).put(update_lead).delete(delete_lead),
        )
        .route("/api/leads/:id/schedule", post(schedule_call))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(status: LeadStatus) -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            email: "a@x.com".to_string(),
            phone: None,
            company: None,
            source: LeadSource::Website,
            status,
            lead_type: LeadType::Warm,
            assigned_to: None,
            location: None,
            preferred_language: "English".to_string(),
            notes: None,
            value: 0.0,
            currency: Currency::Usd,
            tags: vec![],
            scheduled_call_date: None,
            scheduled_call_type: None,
            scheduled_call_notes: None,
            assigned_date: None,
            closed_date: None,
            last_contact: None,
            next_follow_up: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn closing_stamps_closed_date_once() {
        let mut l = lead(LeadStatus::Negotiation);
        let t1 = Utc::now();
        let outcome = apply_transition(&mut l, LeadStatus::Closed, t1).unwrap();
        assert_eq!(outcome, TransitionOutcome::Terminal);
        assert_eq!(l.closed_date, Some(t1));

        // Repeating the close is a no-op and must not clobber the date.
        let t2 = t1 + Duration::hours(1);
        let outcome = apply_transition(&mut l, LeadStatus::Closed, t2).unwrap();
        assert_eq!(outcome, TransitionOutcome::NoChange);
        assert_eq!(l.closed_date, Some(t1));
    }

    #[test]
    fn skipping_stages_is_rejected() {
        let mut l = lead(LeadStatus::Open);
        let err = apply_transition(&mut l, LeadStatus::Negotiation, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            ApiError::IllegalTransition {
                from: LeadStatus::Open,
                to: LeadStatus::Negotiation
            }
        ));
        // The lead is untouched on rejection.
        assert_eq!(l.status, LeadStatus::Open);
        assert_eq!(l.closed_date, None);
    }

    #[test]
    fn losing_from_any_open_stage_is_terminal() {
        let mut l = lead(LeadStatus::Contacted);
        let outcome = apply_transition(&mut l, LeadStatus::Lost, Utc::now()).unwrap();
        assert_eq!(outcome, TransitionOutcome::Terminal);
        assert!(l.closed_date.is_some());

        let err = apply_transition(&mut l, LeadStatus::Open, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::IllegalTransition { .. }));
    }

    #[test]
    fn forward_step_is_not_terminal() {
        let mut l = lead(LeadStatus::Open);
        let outcome = apply_transition(&mut l, LeadStatus::Contacted, Utc::now()).unwrap();
        assert_eq!(outcome, TransitionOutcome::Moved);
        assert_eq!(l.status, LeadStatus::Contacted);
        assert_eq!(l.closed_date, None);
    }
}
