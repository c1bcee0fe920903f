//! Employee accounts: CRUD, per-employee stats, and owned-lead listings.
//!
//! The assigned-leads relation is derived: every read computes it from
//! `leads.assigned_to`, so there is no stored back-reference to keep in
//! sync.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::activity::{recent_activities, ActivityEntry, ActivityView};
use crate::core::error::ApiError;
use crate::core::middleware::CurrentEmployee;
use crate::core::shared::enums::{
    ActivityAction, EmployeeRole, EmployeeStatus, EntityType, LeadStatus, LeadType,
};
use crate::core::shared::schema::{employees, leads};
use crate::core::shared::state::AppState;
use crate::core::shared::{page_window, ApiResponse, Pagination};
use crate::dashboard::conversion_rate;
use crate::leads::{lead_summaries_for, Lead, LeadSummary};
use crate::security::password::{hash_password, MIN_PASSWORD_LENGTH};

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = employees)]
pub struct Employee {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: EmployeeRole,
    pub status: EmployeeStatus,
    pub location: Option<String>,
    pub preferred_language: String,
    pub phone: Option<String>,
    pub department: String,
    pub hire_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employee as serialized over the API; the password hash never leaves the
/// server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEmployee {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: EmployeeRole,
    pub status: EmployeeStatus,
    pub location: Option<String>,
    pub preferred_language: String,
    pub phone: Option<String>,
    pub department: String,
    pub hire_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Employee> for PublicEmployee {
    fn from(e: Employee) -> Self {
        Self {
            id: e.id,
            first_name: e.first_name,
            last_name: e.last_name,
            email: e.email,
            role: e.role,
            status: e.status,
            location: e.location,
            preferred_language: e.preferred_language,
            phone: e.phone,
            department: e.department,
            hire_date: e.hire_date,
            last_login: e.last_login,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListItem {
    #[serde(flatten)]
    pub employee: PublicEmployee,
    pub lead_count: i64,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub location: Option<String>,
    pub preferred_language: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Option<EmployeeRole>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub preferred_language: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub status: Option<EmployeeStatus>,
    pub role: Option<EmployeeRole>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeLeadsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
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

/// Validate a create request and insert the row. Shared by
/// POST /api/employees and POST /api/auth/register.
pub fn create_employee_record(
    conn: &mut PgConnection,
    req: CreateEmployeeRequest,
) -> Result<Employee, ApiError> {
    let mut errors = Vec::new();
    let first_name = req.first_name.as_deref().map(str::trim).unwrap_or_default();
    let last_name = req.last_name.as_deref().map(str::trim).unwrap_or_default();
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_lowercase();
    let password = req.password.as_deref().unwrap_or_default();

    if first_name.is_empty() {
        errors.push("First name is required".to_string());
    }
    if last_name.is_empty() {
        errors.push("Last name is required".to_string());
    }
    if email.is_empty() {
        errors.push("Email is required".to_string());
    } else if !email.contains('@') {
        errors.push("Please enter a valid email".to_string());
    }
    if password.is_empty() {
        errors.push("Password is required".to_string());
    } else if password.len() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let existing: i64 = employees::table
        .filter(employees::email.eq(&email))
        .count()
        .get_result(conn)?;
    if existing > 0 {
        return Err(ApiError::Conflict(
            "Employee with this email already exists".to_string(),
        ));
    }

    let password_hash =
        hash_password(password).map_err(|e| ApiError::Internal(e.to_string()))?;
    let now = Utc::now();
    let employee = Employee {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
        password_hash,
        role: req.role.unwrap_or_default(),
        status: EmployeeStatus::Active,
        location: req.location,
        preferred_language: req
            .preferred_language
            .unwrap_or_else(|| "English".to_string()),
        phone: req.phone,
        department: req.department.unwrap_or_else(|| "Sales".to_string()),
        hire_date: now,
        last_login: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(employees::table)
        .values(&employee)
        .execute(conn)?;

    Ok(employee)
}

fn find_employee(conn: &mut PgConnection, id: Uuid) -> Result<Employee, ApiError> {
    employees::table
        .filter(employees::id.eq(id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Employee"))
}

// ============================================================================
// Handlers
// ============================================================================

type BoxedEmployeeQuery<'a> = employees::BoxedQuery<'a, Pg>;

fn filtered_employees<'a>(
    search: Option<&'a str>,
    status: Option<EmployeeStatus>,
    role: Option<EmployeeRole>,
    location: Option<&'a str>,
) -> BoxedEmployeeQuery<'a> {
    let mut q = employees::table.into_boxed();

    if let Some(search) = search {
        let pattern = format!("%{search}%");
        q = q.filter(
            employees::first_name
                .ilike(pattern.clone())
                .or(employees::last_name.ilike(pattern.clone()))
                .or(employees::email.ilike(pattern.clone()))
                .or(employees::location.ilike(pattern.clone()))
                .or(employees::department.ilike(pattern)),
        );
    }
    if let Some(status) = status {
        q = q.filter(employees::status.eq(status));
    }
    if let Some(role) = role {
        q = q.filter(employees::role.eq(role));
    }
    if let Some(location) = location {
        q = q.filter(employees::location.ilike(format!("%{location}%")));
    }
    q
}

fn order_employees<'a>(
    q: BoxedEmployeeQuery<'a>,
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> BoxedEmployeeQuery<'a> {
    let desc = !matches!(sort_order, Some("asc"));
    match sort_by.unwrap_or("createdAt") {
        "firstName" | "first_name" => {
            if desc {
                q.order(employees::first_name.desc())
            } else {
                q.order(employees::first_name.asc())
            }
        }
        "lastName" | "last_name" => {
            if desc {
                q.order(employees::last_name.desc())
            } else {
                q.order(employees::last_name.asc())
            }
        }
        "email" => {
            if desc {
                q.order(employees::email.desc())
            } else {
                q.order(employees::email.asc())
            }
        }
        "hireDate" | "hire_date" => {
            if desc {
                q.order(employees::hire_date.desc())
            } else {
                q.order(employees::hire_date.asc())
            }
        }
        _ => {
            if desc {
                q.order(employees::created_at.desc())
            } else {
                q.order(employees::created_at.asc())
            }
        }
    }
}

pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Query(query): Query<EmployeeQuery>,
) -> Result<Json<ApiResponse<Vec<EmployeeListItem>>>, ApiError> {
    current.require_admin()?;

    let status = parse_filter::<EmployeeStatus>(&query.status)?;
    let role = parse_filter::<EmployeeRole>(&query.role)?;
    let search = non_empty(&query.search);
    let location = non_empty(&query.location);
    let (page, limit, offset) = page_window(query.page, query.limit);

    let mut conn = state.conn.get()?;

    let total: i64 = filtered_employees(search, status, role, location)
        .count()
        .get_result(&mut conn)?;

    let q = filtered_employees(search, status, role, location);
    let rows: Vec<Employee> = order_employees(
        q,
        non_empty(&query.sort_by),
        non_empty(&query.sort_order),
    )
    .limit(limit)
    .offset(offset)
    .load(&mut conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|e| e.id).collect();
    let counts: HashMap<Uuid, i64> = leads::table
        .filter(leads::assigned_to.eq_any(&ids))
        .group_by(leads::assigned_to)
        .select((leads::assigned_to, diesel::dsl::count_star()))
        .load::<(Option<Uuid>, i64)>(&mut conn)?
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count)))
        .collect();

    let data = rows
        .into_iter()
        .map(|e| {
            let lead_count = counts.get(&e.id).copied().unwrap_or(0);
            EmployeeListItem {
                employee: PublicEmployee::from(e),
                lead_count,
            }
        })
        .collect();

    Ok(Json(ApiResponse::paginated(
        data,
        Pagination::new(page, limit, total),
    )))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDetail {
    #[serde(flatten)]
    pub employee: PublicEmployee,
    pub assigned_leads: Vec<LeadSummary>,
}

pub async fn get_employee(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmployeeDetail>>, ApiError> {
    current.require_self_or_admin(id)?;

    let mut conn = state.conn.get()?;
    let employee = find_employee(&mut conn, id)?;
    let assigned_leads = lead_summaries_for(&mut conn, id)?;

    Ok(Json(ApiResponse::ok(EmployeeDetail {
        employee: PublicEmployee::from(employee),
        assigned_leads,
    })))
}

pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Json(req): Json<CreateEmployeeRequest>,
) -> Result<Json<ApiResponse<PublicEmployee>>, ApiError> {
    current.require_admin()?;

    let mut conn = state.conn.get()?;
    let employee = create_employee_record(&mut conn, req)?;

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::EmployeeCreated,
            EntityType::Employee,
            format!(
                "{} created new employee {} {}",
                current.full_name(),
                employee.first_name,
                employee.last_name
            ),
        )
        .entity(employee.id)
        .details(serde_json::json!({
            "role": employee.role,
            "department": employee.department,
        })),
    );

    Ok(Json(ApiResponse::ok_with_message(
        PublicEmployee::from(employee),
        "Employee created successfully",
    )))
}

pub async fn update_employee(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEmployeeRequest>,
) -> Result<Json<ApiResponse<PublicEmployee>>, ApiError> {
    current.require_self_or_admin(id)?;

    let mut conn = state.conn.get()?;
    let mut employee = find_employee(&mut conn, id)?;

    if let Some(first_name) = req.first_name {
        employee.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        employee.last_name = last_name;
    }
    if let Some(location) = req.location {
        employee.location = Some(location);
    }
    if let Some(preferred_language) = req.preferred_language {
        employee.preferred_language = preferred_language;
    }
    if let Some(phone) = req.phone {
        employee.phone = Some(phone);
    }
    if let Some(department) = req.department {
        employee.department = department;
    }

    // Role and status changes are admin-only.
    if current.is_admin() {
        if let Some(status) = req.status {
            employee.status = status;
        }
        if let Some(role) = req.role {
            employee.role = role;
        }
    }
    employee.updated_at = Utc::now();

    diesel::update(employees::table.filter(employees::id.eq(id)))
        .set(&employee)
        .execute(&mut conn)?;

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::EmployeeUpdated,
            EntityType::Employee,
            format!(
                "{} updated employee {} {}",
                current.full_name(),
                employee.first_name,
                employee.last_name
            ),
        )
        .entity(employee.id),
    );

    Ok(Json(ApiResponse::ok_with_message(
        PublicEmployee::from(employee),
        "Employee updated successfully",
    )))
}

pub async fn delete_employee(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    current.require_self_or_admin(id)?;

    let mut conn = state.conn.get()?;
    let employee = find_employee(&mut conn, id)?;

    let assigned: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .count()
        .get_result(&mut conn)?;
    if assigned > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete employee with {assigned} assigned leads. Please reassign leads first."
        )));
    }

    diesel::delete(employees::table.filter(employees::id.eq(id))).execute(&mut conn)?;

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::EmployeeDeleted,
            EntityType::Employee,
            format!(
                "{} deleted employee {} {}",
                current.full_name(),
                employee.first_name,
                employee.last_name
            ),
        )
        .details(serde_json::json!({ "deletedEmployeeId": id })),
    );

    Ok(Json(ApiResponse::message("Employee deleted successfully")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub total_leads: i64,
    pub open_leads: i64,
    pub closed_leads: i64,
    pub lost_leads: i64,
    pub leads_this_month: i64,
    pub closed_this_month: i64,
    pub conversion_rate: String,
    pub recent_activities: Vec<ActivityView>,
}

pub async fn employee_stats(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmployeeStats>>, ApiError> {
    current.require_self_or_admin(id)?;

    let mut conn = state.conn.get()?;
    find_employee(&mut conn, id)?;

    let total_leads: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .count()
        .get_result(&mut conn)?;
    let open_leads: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::status.eq_any(LeadStatus::OPEN_STAGES))
        .count()
        .get_result(&mut conn)?;
    let closed_leads: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::status.eq(LeadStatus::Closed))
        .count()
        .get_result(&mut conn)?;
    let lost_leads: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::status.eq(LeadStatus::Lost))
        .count()
        .get_result(&mut conn)?;

    let now = Utc::now();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let leads_this_month: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::assigned_date.ge(month_start))
        .count()
        .get_result(&mut conn)?;
    let closed_this_month: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::status.eq(LeadStatus::Closed))
        .filter(leads::closed_date.ge(month_start))
        .count()
        .get_result(&mut conn)?;

    let recent = recent_activities(&mut conn, 5, Some(id))?;

    Ok(Json(ApiResponse::ok(EmployeeStats {
        total_leads,
        open_leads,
        closed_leads,
        lost_leads,
        leads_this_month,
        closed_this_month,
        conversion_rate: conversion_rate(closed_leads, total_leads),
        recent_activities: recent,
    })))
}

pub async fn employee_leads(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Path(id): Path<Uuid>,
    Query(query): Query<EmployeeLeadsQuery>,
) -> Result<Json<ApiResponse<Vec<Lead>>>, ApiError> {
    current.require_self_or_admin(id)?;

    let status = parse_filter::<LeadStatus>(&query.status)?;
    let lead_type = parse_filter::<LeadType>(&query.lead_type)?;
    let (page, limit, offset) = page_window(query.page, query.limit);

    let mut conn = state.conn.get()?;

    let mut count_q = leads::table.filter(leads::assigned_to.eq(id)).into_boxed();
    let mut q = leads::table.filter(leads::assigned_to.eq(id)).into_boxed();
    if let Some(status) = status {
        count_q = count_q.filter(leads::status.eq(status));
        q = q.filter(leads::status.eq(status));
    }
    if let Some(lead_type) = lead_type {
        count_q = count_q.filter(leads::lead_type.eq(lead_type));
        q = q.filter(leads::lead_type.eq(lead_type));
    }

    let total: i64 = count_q.count().get_result(&mut conn)?;

    let desc = !matches!(non_empty(&query.sort_order), Some("asc"));
    q = match non_empty(&query.sort_by).unwrap_or("assignedDate") {
        "createdAt" | "created_at" => {
            if desc {
                q.order(leads::created_at.desc())
            } else {
                q.order(leads::created_at.asc())
            }
        }
        _ => {
            if desc {
                q.order(leads::assigned_date.desc())
            } else {
                q.order(leads::assigned_date.asc())
            }
        }
    };

    let rows: Vec<Lead> = q.limit(limit).offset(offset).load(&mut conn)?;

    Ok(Json(ApiResponse::paginated(
        rows,
        Pagination::new(page, limit, total),
    )))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/employees",
            get(list_employees).post(create_employee),
        )
        .route(
            "/api/employees/:id",
            get(get_employee)
                .put(update_employee)
                .delete(delete_employee),
        )
        .route("/api/employees/:id/stats", get(employee_stats))
        .route("/api/employees/:id/leads", get(employee_leads))
}
