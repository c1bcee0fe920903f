//! Read-only dashboard summaries. Everything here is derived from the
//! current lead/employee/activity tables and recomputed on each request.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::activity::{activity_summary, recent_activities, ActivityView, DailyActivitySummary};
use crate::core::error::ApiError;
use crate::core::middleware::CurrentEmployee;
use crate::core::shared::enums::{EmployeeStatus, LeadSource, LeadStatus, LeadType};
use crate::core::shared::schema::{employees, leads};
use crate::core::shared::state::AppState;
use crate::core::shared::ApiResponse;
use crate::leads::SourceCount;

/// Closed-over-total as a percentage with one decimal, `"0"` when there are
/// no leads at all.
pub fn conversion_rate(closed: i64, total: i64) -> String {
    if total > 0 {
        format!("{:.1}", (closed as f64 / total as f64) * 100.0)
    } else {
        "0".to_string()
    }
}

// ============================================================================
// /api/dashboard/stats
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub open: i64,
    pub closed: i64,
    pub lost: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeBreakdown {
    pub hot: i64,
    pub warm: i64,
    pub cold: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePerformance {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub total_leads: i64,
    pub open_leads: i64,
    pub closed_leads: i64,
    pub conversion_rate: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_leads: i64,
    pub unassigned_leads: i64,
    pub leads_assigned_this_week: i64,
    pub active_employees: i64,
    pub conversion_rate: String,
    pub status_breakdown: StatusBreakdown,
    pub type_breakdown: TypeBreakdown,
    pub source_stats: Vec<SourceCount>,
    pub employee_stats: Vec<EmployeePerformance>,
}

/// Fold per-employee lead totals out of one pass over (owner, status) pairs.
/// Sorted by lead count descending, truncated to `limit`.
pub fn employee_breakdown(
    staff: Vec<(Uuid, String, Option<String>)>,
    lead_rows: &[(Option<Uuid>, LeadStatus)],
    limit: usize,
) -> Vec<EmployeePerformance> {
    let mut totals: BTreeMap<Uuid, (i64, i64, i64)> = BTreeMap::new();
    for (owner, status) in lead_rows {
        let Some(owner) = owner else { continue };
        let entry = totals.entry(*owner).or_default();
        entry.0 += 1;
        if *status == LeadStatus::Closed {
            entry.1 += 1;
        } else if !status.is_terminal() {
            entry.2 += 1;
        }
    }

    let mut rows: Vec<EmployeePerformance> = staff
        .into_iter()
        .map(|(id, name, location)| {
            let (total, closed, open) = totals.get(&id).copied().unwrap_or_default();
            EmployeePerformance {
                id,
                name,
                location,
                total_leads: total,
                open_leads: open,
                closed_leads: closed,
                conversion_rate: conversion_rate(closed, total),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_leads.cmp(&a.total_leads));
    rows.truncate(limit);
    rows
}

fn active_staff(conn: &mut PgConnection) -> QueryResult<Vec<(Uuid, String, Option<String>)>> {
    let rows: Vec<(Uuid, String, String, Option<String>)> = employees::table
        .filter(employees::status.eq(EmployeeStatus::Active))
        .select((
            employees::id,
            employees::first_name,
            employees::last_name,
            employees::location,
        ))
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(id, first, last, location)| (id, format!("{first} {last}"), location))
        .collect())
}

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    current.require_admin()?;

    let mut conn = state.conn.get()?;

    let total_leads: i64 = leads::table.count().get_result(&mut conn)?;
    let unassigned_leads: i64 = leads::table
        .filter(leads::assigned_to.is_null())
        .count()
        .get_result(&mut conn)?;
    let active_employees: i64 = employees::table
        .filter(employees::status.eq(EmployeeStatus::Active))
        .count()
        .get_result(&mut conn)?;

    let open: i64 = leads::table
        .filter(leads::status.eq_any(LeadStatus::OPEN_STAGES))
        .count()
        .get_result(&mut conn)?;
    let closed: i64 = leads::table
        .filter(leads::status.eq(LeadStatus::Closed))
        .count()
        .get_result(&mut conn)?;
    let lost: i64 = leads::table
        .filter(leads::status.eq(LeadStatus::Lost))
        .count()
        .get_result(&mut conn)?;

    let hot: i64 = leads::table
        .filter(leads::lead_type.eq(LeadType::Hot))
        .count()
        .get_result(&mut conn)?;
    let warm: i64 = leads::table
        .filter(leads::lead_type.eq(LeadType::Warm))
        .count()
        .get_result(&mut conn)?;
    let cold: i64 = leads::table
        .filter(leads::lead_type.eq(LeadType::Cold))
        .count()
        .get_result(&mut conn)?;

    let leads_assigned_this_week: i64 = leads::table
        .filter(leads::assigned_date.ge(Utc::now() - Duration::days(7)))
        .count()
        .get_result(&mut conn)?;

    let source_stats: Vec<SourceCount> = leads::table
        .group_by(leads::source)
        .select((leads::source, diesel::dsl::count_star()))
        .order(diesel::dsl::count_star().desc())
        .limit(5)
        .load::<(LeadSource, i64)>(&mut conn)?
        .into_iter()
        .map(|(source, count)| SourceCount { source, count })
        .collect();

    let staff = active_staff(&mut conn)?;
    let lead_rows: Vec<(Option<Uuid>, LeadStatus)> = leads::table
        .select((leads::assigned_to, leads::status))
        .load(&mut conn)?;
    let employee_stats = employee_breakdown(staff, &lead_rows, 10);

    Ok(Json(ApiResponse::ok(DashboardStats {
        total_leads,
        unassigned_leads,
        leads_assigned_this_week,
        active_employees,
        conversion_rate: conversion_rate(closed, total_leads),
        status_breakdown: StatusBreakdown { open, closed, lost },
        type_breakdown: TypeBreakdown { hot, warm, cold },
        source_stats,
        employee_stats,
    })))
}

// ============================================================================
// /api/dashboard/analytics
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPoint {
    pub name: String,
    pub sales: i64,
    pub value: f64,
    pub cumulative_sales: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalytics {
    pub source: LeadSource,
    pub count: i64,
    pub closed_count: i64,
    pub conversion_rate: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalytics {
    pub sales_data: Vec<SalesPoint>,
    pub source_analytics: Vec<SourceAnalytics>,
    pub employee_analytics: Vec<EmployeePerformance>,
    pub period: String,
    pub total_sales: i64,
    pub total_value: f64,
}

fn period_window(period: &str) -> (DateTime<Utc>, bool) {
    let now = Utc::now();
    match period {
        "30d" => (now - Duration::days(30), false),
        "90d" => (now - Duration::days(90), false),
        "1y" => (now - Duration::days(365), true),
        _ => (now - Duration::days(7), false),
    }
}

/// Group closed leads into a date-keyed series with running totals.
/// Buckets are days, or whole months when `monthly` is set.
pub fn build_sales_series(
    rows: Vec<(DateTime<Utc>, f64)>,
    monthly: bool,
) -> Vec<SalesPoint> {
    // Date-keyed map keeps buckets chronological.
    let mut buckets: BTreeMap<String, (i64, f64)> = BTreeMap::new();
    for (at, value) in rows {
        let key = if monthly {
            at.format("%Y-%m").to_string()
        } else {
            at.format("%Y-%m-%d").to_string()
        };
        let entry = buckets.entry(key).or_default();
        entry.0 += 1;
        entry.1 += value;
    }

    let mut cumulative = 0;
    buckets
        .into_iter()
        .map(|(name, (sales, value))| {
            cumulative += sales;
            SalesPoint {
                name,
                sales,
                value,
                cumulative_sales: cumulative,
            }
        })
        .collect()
}

/// Per-source lead counts and conversion, sorted by volume.
pub fn source_breakdown(rows: &[(LeadSource, LeadStatus)]) -> Vec<SourceAnalytics> {
    let mut buckets: BTreeMap<LeadSource, (i64, i64)> = BTreeMap::new();
    for (source, status) in rows {
        let entry = buckets.entry(*source).or_default();
        entry.0 += 1;
        if *status == LeadStatus::Closed {
            entry.1 += 1;
        }
    }
    let mut out: Vec<SourceAnalytics> = buckets
        .into_iter()
        .map(|(source, (count, closed_count))| SourceAnalytics {
            source,
            count,
            closed_count,
            conversion_rate: conversion_rate(closed_count, count),
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

pub async fn sales_analytics(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<SalesAnalytics>>, ApiError> {
    current.require_admin()?;

    let period = query.period.unwrap_or_else(|| "7d".to_string());
    let (start, monthly) = period_window(&period);

    let mut conn = state.conn.get()?;

    let closed_rows: Vec<(Option<DateTime<Utc>>, f64)> = leads::table
        .filter(leads::status.eq(LeadStatus::Closed))
        .filter(leads::closed_date.ge(start))
        .select((leads::closed_date, leads::value))
        .load(&mut conn)?;
    let sales_data = build_sales_series(
        closed_rows
            .into_iter()
            .filter_map(|(at, value)| at.map(|at| (at, value)))
            .collect(),
        monthly,
    );

    let source_rows: Vec<(LeadSource, LeadStatus)> = leads::table
        .filter(leads::created_at.ge(start))
        .select((leads::source, leads::status))
        .load(&mut conn)?;
    let source_analytics = source_breakdown(&source_rows);

    let staff = active_staff(&mut conn)?;
    let lead_rows: Vec<(Option<Uuid>, LeadStatus)> = leads::table
        .select((leads::assigned_to, leads::status))
        .load(&mut conn)?;
    let employee_analytics = employee_breakdown(staff, &lead_rows, usize::MAX);

    let total_sales = sales_data.iter().map(|p| p.sales).sum();
    let total_value = sales_data.iter().map(|p| p.value).sum();

    Ok(Json(ApiResponse::ok(SalesAnalytics {
        sales_data,
        source_analytics,
        employee_analytics,
        period,
        total_sales,
        total_value,
    })))
}

// ============================================================================
// /api/dashboard/activities, /api/dashboard/activity-summary
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ActivitiesQuery {
    pub limit: Option<i64>,
}

pub async fn dashboard_activities(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<ApiResponse<Vec<ActivityView>>>, ApiError> {
    current.require_admin()?;

    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let mut conn = state.conn.get()?;
    let activities = recent_activities(&mut conn, limit, None)?;

    Ok(Json(ApiResponse::ok(activities)))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

pub async fn dashboard_activity_summary(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<Vec<DailyActivitySummary>>>, ApiError> {
    current.require_admin()?;

    let days = query.days.unwrap_or(7).clamp(1, 365);
    let mut conn = state.conn.get()?;
    let summary = activity_summary(&mut conn, days)?;

    Ok(Json(ApiResponse::ok(summary)))
}

// ============================================================================
// /api/dashboard/employee
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboardStats {
    pub total_leads: i64,
    pub open_leads: i64,
    pub closed_leads: i64,
    pub lost_leads: i64,
    pub hot_leads: i64,
    pub warm_leads: i64,
    pub cold_leads: i64,
    pub conversion_rate: String,
    pub leads_this_month: i64,
    pub closed_this_month: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboard {
    pub stats: EmployeeDashboardStats,
    pub recent_leads: Vec<crate::leads::LeadSummary>,
    pub overdue_follow_ups: Vec<crate::leads::LeadSummary>,
    pub todays_calls: Vec<crate::leads::LeadSummary>,
    pub recent_activities: Vec<ActivityView>,
}

pub async fn employee_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
) -> Result<Json<ApiResponse<EmployeeDashboard>>, ApiError> {
    let id = current.id;
    let mut conn = state.conn.get()?;

    let count_where = |conn: &mut PgConnection,
                       status: Option<LeadStatus>|
     -> QueryResult<i64> {
        let mut q = leads::table.filter(leads::assigned_to.eq(id)).into_boxed();
        if let Some(status) = status {
            q = q.filter(leads::status.eq(status));
        }
        q.count().get_result(conn)
    };

    let total_leads = count_where(&mut conn, None)?;
    let open_leads: i64 = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::status.eq_any(LeadStatus::OPEN_STAGES))
        .count()
        .get_result(&mut conn)?;
    let closed_leads = count_where(&mut conn, Some(LeadStatus::Closed))?;
    let lost_leads = count_where(&mut conn, Some(LeadStatus::Lost))?;

    let count_type = |conn: &mut PgConnection, t: LeadType| -> QueryResult<i64> {
        leads::table
            .filter(leads::assigned_to.eq(id))
            .filter(leads::lead_type.eq(t))
            .count()
            .get_result(conn)
    };
    let hot_leads = count_type(&mut conn, LeadType::Hot)?;
    let warm_leads = count_type(&mut conn, LeadType::Warm)?;
    let cold_leads = count_type(&mut conn, LeadType::Cold)?;

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

    let summary_cols = (
        leads::id,
        leads::name,
        leads::email,
        leads::company,
        leads::status,
        leads::lead_type,
        leads::assigned_date,
    );

    let recent_leads: Vec<crate::leads::LeadSummary> = leads::table
        .filter(leads::assigned_to.eq(id))
        .order(leads::assigned_date.desc())
        .limit(5)
        .select(summary_cols)
        .load(&mut conn)?;

    let overdue_follow_ups: Vec<crate::leads::LeadSummary> = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::next_follow_up.lt(now))
        .filter(leads::status.ne(LeadStatus::Closed))
        .order(leads::next_follow_up.asc())
        .select(summary_cols)
        .load(&mut conn)?;

    let day_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now);
    let day_end = day_start + Duration::days(1);
    let todays_calls: Vec<crate::leads::LeadSummary> = leads::table
        .filter(leads::assigned_to.eq(id))
        .filter(leads::scheduled_call_date.ge(day_start))
        .filter(leads::scheduled_call_date.lt(day_end))
        .order(leads::scheduled_call_date.asc())
        .select(summary_cols)
        .load(&mut conn)?;

    let recent = recent_activities(&mut conn, 5, Some(id))?;

    Ok(Json(ApiResponse::ok(EmployeeDashboard {
        stats: EmployeeDashboardStats {
            total_leads,
            open_leads,
            closed_leads,
            lost_leads,
            hot_leads,
            warm_leads,
            cold_leads,
            conversion_rate: conversion_rate(closed_leads, total_leads),
            leads_this_month,
            closed_this_month,
        },
        recent_leads,
        overdue_follow_ups,
        todays_calls,
        recent_activities: recent,
    })))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/dashboard/stats", get(dashboard_stats))
        .route("/api/dashboard/analytics", get(sales_analytics))
        .route("/api/dashboard/activities", get(dashboard_activities))
        .route(
            "/api/dashboard/activity-summary",
            get(dashboard_activity_summary),
        )
        .route("/api/dashboard/employee", get(employee_dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_rate_handles_zero_and_rounds() {
        assert_eq!(conversion_rate(0, 0), "0");
        assert_eq!(conversion_rate(2, 8), "25.0");
        assert_eq!(conversion_rate(1, 3), "33.3");
        assert_eq!(conversion_rate(8, 8), "100.0");
    }

    #[test]
    fn sales_series_accumulates_in_date_order() {
        let d1 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let series = build_sales_series(
            vec![(d2, 500.0), (d1, 100.0), (d1, 250.0)],
            false,
        );

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "2026-03-01");
        assert_eq!(series[0].sales, 2);
        assert_eq!(series[0].value, 350.0);
        assert_eq!(series[0].cumulative_sales, 2);
        assert_eq!(series[1].name, "2026-03-02");
        assert_eq!(series[1].cumulative_sales, 3);
    }

    #[test]
    fn sales_series_buckets_by_month_for_year_period() {
        let jan = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2026, 2, 3, 0, 0, 0).unwrap();
        let series = build_sales_series(vec![(jan, 10.0), (feb, 20.0)], true);
        assert_eq!(series[0].name, "2026-01");
        assert_eq!(series[1].name, "2026-02");
    }

    #[test]
    fn source_breakdown_counts_and_sorts() {
        let rows = vec![
            (LeadSource::Website, LeadStatus::Closed),
            (LeadSource::Website, LeadStatus::Open),
            (LeadSource::Website, LeadStatus::Open),
            (LeadSource::Referral, LeadStatus::Closed),
        ];
        let out = source_breakdown(&rows);
        assert_eq!(out[0].source, LeadSource::Website);
        assert_eq!(out[0].count, 3);
        assert_eq!(out[0].closed_count, 1);
        assert_eq!(out[0].conversion_rate, "33.3");
        assert_eq!(out[1].source, LeadSource::Referral);
        assert_eq!(out[1].conversion_rate, "100.0");
    }

    #[test]
    fn employee_breakdown_ranks_by_volume() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let staff = vec![
            (a, "Ada Lovelace".to_string(), None),
            (b, "Grace Hopper".to_string(), Some("NYC".to_string())),
        ];
        let lead_rows = vec![
            (Some(a), LeadStatus::Closed),
            (Some(a), LeadStatus::Open),
            (Some(b), LeadStatus::Closed),
            (Some(b), LeadStatus::Closed),
            (Some(b), LeadStatus::Lost),
            (None, LeadStatus::Open),
        ];

        let out = employee_breakdown(staff, &lead_rows, 10);
        assert_eq!(out[0].name, "Grace Hopper");
        assert_eq!(out[0].total_leads, 3);
        assert_eq!(out[0].closed_leads, 2);
        assert_eq!(out[0].open_leads, 0);
        assert_eq!(out[0].conversion_rate, "66.7");
        assert_eq!(out[1].name, "Ada Lovelace");
        assert_eq!(out[1].conversion_rate, "50.0");
    }

    #[test]
    fn employee_breakdown_includes_staff_with_no_leads() {
        let a = Uuid::new_v4();
        let out = employee_breakdown(vec![(a, "Ada".to_string(), None)], &[], 10);
        assert_eq!(out[0].total_leads, 0);
        assert_eq!(out[0].conversion_rate, "0");
    }
}
