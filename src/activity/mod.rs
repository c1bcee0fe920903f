//! Append-only audit trail of lifecycle events.
//!
//! Writes go through [`ActivityLogger`], a bounded queue drained by a
//! background task. Logging is best-effort: a full queue or a failed insert
//! never surfaces to the caller; dropped entries are counted and logged.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::shared::enums::{ActivityAction, EntityType, Severity};
use crate::core::shared::schema::{activities, employees};
use crate::core::shared::utils::DbPool;

const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Queryable, Insertable, Serialize)]
#[diesel(table_name = activities)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub actor: Uuid,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub details: serde_json::Value,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// One activity entry waiting to be written.
#[derive(Debug)]
pub struct ActivityEntry {
    pub actor: Uuid,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub details: serde_json::Value,
    pub severity: Severity,
}

impl ActivityEntry {
    pub fn new(
        actor: Uuid,
        action: ActivityAction,
        entity_type: EntityType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action,
            entity_type,
            entity_id: None,
            description: description.into(),
            details: serde_json::json!({}),
            severity: Severity::Low,
        }
    }

    pub fn entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Handle for enqueueing audit entries from request handlers.
#[derive(Clone)]
pub struct ActivityLogger {
    tx: mpsc::Sender<ActivityEntry>,
    dropped: Arc<AtomicU64>,
}

impl ActivityLogger {
    /// Spawn the background writer task and return the enqueue handle.
    pub fn spawn(pool: DbPool) -> Self {
        let (tx, mut rx) = mpsc::channel::<ActivityEntry>(QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                let pool = pool.clone();
                let result = tokio::task::spawn_blocking(move || write_entry(&pool, entry)).await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "activity write failed"),
                    Err(e) => tracing::warn!(error = %e, "activity writer panicked"),
                }
            }
        });
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue an entry; never blocks the caller.
    pub fn record(&self, entry: ActivityEntry) {
        if self.tx.try_send(entry).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped, "activity queue full, entry dropped");
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn write_entry(pool: &DbPool, entry: ActivityEntry) -> Result<(), String> {
    let mut conn = pool.get().map_err(|e| e.to_string())?;
    let row = Activity {
        id: Uuid::new_v4(),
        actor: entry.actor,
        action: entry.action,
        entity_type: entry.entity_type,
        entity_id: entry.entity_id,
        description: entry.description,
        details: entry.details,
        severity: entry.severity,
        created_at: Utc::now(),
    };
    diesel::insert_into(activities::table)
        .values(&row)
        .execute(&mut conn)
        .map_err(|e| e.to_string())?;
    Ok(())
}

// ============================================================================
// Read views
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub user: Option<ActorInfo>,
}

/// Most recent activities, newest first, optionally scoped to one actor.
pub fn recent_activities(
    conn: &mut PgConnection,
    limit: i64,
    actor_id: Option<Uuid>,
) -> QueryResult<Vec<ActivityView>> {
    let mut q = activities::table
        .left_join(employees::table)
        .select((
            activities::all_columns,
            (
                employees::first_name,
                employees::last_name,
                employees::email,
            )
                .nullable(),
        ))
        .order(activities::created_at.desc())
        .limit(limit)
        .into_boxed();

    if let Some(actor_id) = actor_id {
        q = q.filter(activities::actor.eq(actor_id));
    }

    let rows: Vec<(Activity, Option<(String, String, String)>)> = q.load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(activity, actor)| ActivityView {
            activity,
            user: actor.map(|(first_name, last_name, email)| ActorInfo {
                first_name,
                last_name,
                email,
            }),
        })
        .collect())
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCount {
    pub action: ActivityAction,
    pub count: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivitySummary {
    pub date: String,
    pub activities: Vec<ActionCount>,
    pub total_count: i64,
}

/// Per-day, per-action counts over the trailing `days`, newest day first.
pub fn activity_summary(
    conn: &mut PgConnection,
    days: i64,
) -> QueryResult<Vec<DailyActivitySummary>> {
    let start = Utc::now() - Duration::days(days);
    let rows: Vec<(ActivityAction, DateTime<Utc>)> = activities::table
        .filter(activities::created_at.ge(start))
        .select((activities::action, activities::created_at))
        .load(conn)?;
    Ok(summarize_by_day(rows))
}

fn summarize_by_day(rows: Vec<(ActivityAction, DateTime<Utc>)>) -> Vec<DailyActivitySummary> {
    let mut days: BTreeMap<String, BTreeMap<ActivityAction, i64>> = BTreeMap::new();
    for (action, at) in rows {
        *days
            .entry(at.format("%Y-%m-%d").to_string())
            .or_default()
            .entry(action)
            .or_default() += 1;
    }
    days.into_iter()
        .rev()
        .map(|(date, actions)| {
            let total_count = actions.values().sum();
            DailyActivitySummary {
                date,
                activities: actions
                    .into_iter()
                    .map(|(action, count)| ActionCount { action, count })
                    .collect(),
                total_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn summary_groups_by_day_and_action() {
        let rows = vec![
            (ActivityAction::Login, at(2, 9)),
            (ActivityAction::Login, at(2, 14)),
            (ActivityAction::LeadCreated, at(2, 10)),
            (ActivityAction::Login, at(3, 8)),
        ];
        let summary = summarize_by_day(rows);

        assert_eq!(summary.len(), 2);
        // Newest day first.
        assert_eq!(summary[0].date, "2026-03-03");
        assert_eq!(summary[0].total_count, 1);
        assert_eq!(summary[1].date, "2026-03-02");
        assert_eq!(summary[1].total_count, 3);
        assert!(summary[1]
            .activities
            .iter()
            .any(|a| a.action == ActivityAction::Login && a.count == 2));
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        assert!(summarize_by_day(vec![]).is_empty());
    }
}
